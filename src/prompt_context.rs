//! Prompt assembly under a character budget.
//!
//! Blocks are emitted in a fixed order, separated by a blank line:
//!   1. system base
//!   2. `<project_overview>` (truncated to fit)
//!   3. `<current_user_context>` (whole or omitted)
//!   4. `<referenced_documents>` with one `<document>` per mention (truncated to fit)
//!
//! Wrappers and separators count against the budget. Characters are Unicode
//! scalar values, so truncation never splits a character. The assembled prompt
//! never exceeds `max_chars`.
//!
//! This module performs no I/O. Mention documents must already have passed the
//! visibility gate.

use serde::{Deserialize, Serialize};

use crate::db::TranscriptBody;
use crate::models::max_chars_for;

const SECTION_SEPARATOR: &str = "\n\n";

pub const OVERVIEW_DOC_ID: &str = "overview";
pub const OVERVIEW_TITLE: &str = "Project Overview";

/// A transcript the user mentioned and is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMentionDocument {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl From<TranscriptBody> for PromptMentionDocument {
    fn from(body: TranscriptBody) -> Self {
        Self {
            id: body.id,
            title: body.title,
            content: body.content,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptContextInput<'a> {
    pub model: &'a str,
    pub system_base: &'a str,
    pub project_overview_markdown: Option<&'a str>,
    pub user_context: Option<&'a str>,
    pub mention_documents: &'a [PromptMentionDocument],
    /// Replaces the model-derived budget when set.
    pub max_chars_override: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Overview,
    Mention,
}

/// A retrievable document included in the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSource {
    pub doc_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
}

/// How much of an emitted block made it into the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationInfo {
    pub doc_id: String,
    pub title: String,
    pub truncated: bool,
    pub percent_included: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContextResult {
    pub prompt: String,
    pub total_chars: usize,
    pub max_chars: usize,
    pub sources: Vec<PromptSource>,
    pub truncation_info: Vec<TruncationInfo>,
}

impl PromptContextResult {
    pub fn has_referenced_documents(&self) -> bool {
        self.sources
            .iter()
            .any(|s| s.source_type == SourceType::Mention)
    }
}

/// Running state of one assembly.
struct Assembly {
    segments: Vec<String>,
    used: usize,
    max_chars: usize,
    sources: Vec<PromptSource>,
    truncation_info: Vec<TruncationInfo>,
}

impl Assembly {
    fn separator_cost(&self) -> usize {
        if self.segments.is_empty() {
            0
        } else {
            char_len(SECTION_SEPARATOR)
        }
    }

    /// Characters still available for content after paying `overhead`.
    fn available_after(&self, overhead: usize) -> usize {
        self.max_chars.saturating_sub(self.used + overhead)
    }

    fn push(&mut self, block: String) {
        self.used += self.separator_cost() + char_len(&block);
        self.segments.push(block);
    }

    fn record(&mut self, doc_id: &str, title: &str, source_type: SourceType, original: usize, included: usize) {
        self.sources.push(PromptSource {
            doc_id: doc_id.to_string(),
            title: title.to_string(),
            source_type,
        });
        self.truncation_info.push(TruncationInfo {
            doc_id: doc_id.to_string(),
            title: title.to_string(),
            truncated: included < original,
            percent_included: percent_included(original, included),
        });
    }
}

/// Assemble the prompt for one chat turn.
pub fn build_prompt_context(input: &PromptContextInput<'_>) -> PromptContextResult {
    let max_chars = input
        .max_chars_override
        .unwrap_or_else(|| max_chars_for(input.model));
    let mut asm = Assembly {
        segments: Vec::new(),
        used: 0,
        max_chars,
        sources: Vec::new(),
        truncation_info: Vec::new(),
    };

    // ---- System base ----
    let system_base = input.system_base.trim();
    if !system_base.is_empty() {
        let system_chars = char_len(system_base);
        if system_chars > max_chars {
            log::warn!(
                "System base ({} chars) exceeds the prompt budget ({} chars); clipping",
                system_chars,
                max_chars
            );
        }
        asm.push(take_chars(system_base, max_chars).to_string());
    }

    // ---- Project overview ----
    if let Some(overview) = input.project_overview_markdown.map(str::trim).filter(|s| !s.is_empty()) {
        append_overview(&mut asm, overview);
    }

    // ---- Current user context ----
    if let Some(user_context) = input.user_context.map(str::trim).filter(|s| !s.is_empty()) {
        let block = wrap("current_user_context", user_context);
        let cost = asm.separator_cost() + char_len(&block);
        if asm.used + cost <= max_chars {
            asm.push(block);
        } else {
            log::debug!("User context omitted: {} chars do not fit", cost);
        }
    }

    // ---- Referenced documents ----
    append_referenced_documents(&mut asm, input.mention_documents);

    let prompt = asm.segments.join(SECTION_SEPARATOR);
    let total_chars = char_len(&prompt);
    debug_assert!(total_chars <= max_chars);

    PromptContextResult {
        prompt,
        total_chars,
        max_chars,
        sources: asm.sources,
        truncation_info: asm.truncation_info,
    }
}

fn append_overview(asm: &mut Assembly, content: &str) {
    let prefix = "<project_overview>\n";
    let suffix = "\n</project_overview>";
    let overhead = asm.separator_cost() + char_len(prefix) + char_len(suffix);
    let available = asm.available_after(overhead);
    if available == 0 {
        log::debug!("Project overview omitted: budget exhausted");
        return;
    }

    let original = char_len(content);
    let included = take_chars(content, available);
    let included_chars = char_len(included);
    if included_chars < original {
        log::debug!("Project overview truncated to {}/{} chars", included_chars, original);
    }
    asm.push(format!("{}{}{}", prefix, included, suffix));
    asm.record(OVERVIEW_DOC_ID, OVERVIEW_TITLE, SourceType::Overview, original, included_chars);
}

fn append_referenced_documents(asm: &mut Assembly, documents: &[PromptMentionDocument]) {
    if documents.is_empty() {
        return;
    }
    let section_prefix = "<referenced_documents>\n";
    let section_suffix = "\n</referenced_documents>";
    let section_overhead =
        asm.separator_cost() + char_len(section_prefix) + char_len(section_suffix);

    let mut blocks: Vec<String> = Vec::new();
    let mut local_chars = 0usize;
    let mut included_docs: Vec<(&PromptMentionDocument, usize, usize)> = Vec::new();

    for doc in documents {
        let doc_prefix = format!(
            "<document id=\"{}\" title=\"{}\">\n",
            escape_attr(&doc.id),
            escape_attr(&doc.title)
        );
        let doc_suffix = "\n</document>";
        let intra = if blocks.is_empty() { 0 } else { char_len(SECTION_SEPARATOR) };
        let overhead = section_overhead + local_chars + intra + char_len(&doc_prefix) + char_len(doc_suffix);

        if asm.used + overhead > asm.max_chars {
            break;
        }
        let available = asm.available_after(overhead);
        let original = char_len(&doc.content);
        if available == 0 && original > 0 {
            break;
        }

        let included = take_chars(&doc.content, available);
        let included_chars = char_len(included);
        if included_chars < original {
            log::debug!("Mention {} truncated to {}/{} chars", doc.id, included_chars, original);
        }

        let block = format!("{}{}{}", doc_prefix, included, doc_suffix);
        local_chars += intra + char_len(&block);
        blocks.push(block);
        included_docs.push((doc, original, included_chars));
    }

    if blocks.len() < documents.len() {
        log::debug!(
            "{} of {} mentions omitted: budget exhausted",
            documents.len() - blocks.len(),
            documents.len()
        );
    }
    if blocks.is_empty() {
        return;
    }

    asm.push(format!(
        "{}{}{}",
        section_prefix,
        blocks.join(SECTION_SEPARATOR),
        section_suffix
    ));
    for (doc, original, included) in included_docs {
        asm.record(&doc.id, &doc.title, SourceType::Mention, original, included);
    }
}

fn wrap(tag: &str, content: &str) -> String {
    format!("<{tag}>\n{content}\n</{tag}>")
}

/// `round(included / original * 100)` in 0..=100. A truncated block never
/// reports 100.
fn percent_included(original: usize, included: usize) -> u8 {
    if original == 0 {
        return 100;
    }
    let included = included.min(original);
    let percent = ((included * 200 + original) / (original * 2)) as u8;
    if included < original && percent == 100 {
        99
    } else {
        percent
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The first `n` characters of `s`.
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM: &str = "<system>base</system>";

    fn doc(id: &str, title: &str, content: &str) -> PromptMentionDocument {
        PromptMentionDocument {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    fn build(
        overview: Option<&str>,
        user_context: Option<&str>,
        docs: &[PromptMentionDocument],
        max_chars: usize,
    ) -> PromptContextResult {
        build_prompt_context(&PromptContextInput {
            model: "claude-sonnet-4.5",
            system_base: SYSTEM,
            project_overview_markdown: overview,
            user_context,
            mention_documents: docs,
            max_chars_override: Some(max_chars),
        })
    }

    #[test]
    fn test_blocks_in_canonical_order() {
        let docs = [
            doc("m1", "Doc 1", "First doc content"),
            doc("m2", "Doc 2", "Second doc content"),
        ];
        let result = build(Some("Overview body"), Some("User context"), &docs, 10_000);

        let overview = result.prompt.find("<project_overview>").unwrap();
        let user = result.prompt.find("<current_user_context>").unwrap();
        let referenced = result.prompt.find("<referenced_documents>").unwrap();
        assert!(result.prompt.starts_with(SYSTEM));
        assert!(overview < user && user < referenced);

        let types: Vec<_> = result.sources.iter().map(|s| s.source_type).collect();
        assert_eq!(types, vec![SourceType::Overview, SourceType::Mention, SourceType::Mention]);
        assert!(result.truncation_info.iter().all(|t| !t.truncated && t.percent_included == 100));
        assert_eq!(result.total_chars, result.prompt.chars().count());
    }

    #[test]
    fn test_exact_layout() {
        let docs = [doc("m1", "Doc 1", "body")];
        let result = build(Some(" Overview "), Some("ctx"), &docs, 10_000);
        let expected = "<system>base</system>\n\n\
<project_overview>\nOverview\n</project_overview>\n\n\
<current_user_context>\nctx\n</current_user_context>\n\n\
<referenced_documents>\n<document id=\"m1\" title=\"Doc 1\">\nbody\n</document>\n</referenced_documents>";
        assert_eq!(result.prompt, expected);
    }

    #[test]
    fn test_mention_truncated_to_exactly_fill_budget() {
        let content = "a".repeat(200);
        let docs = [doc("m1", "Doc 1", &content)];
        let result = build(None, None, &docs, 120);

        assert_eq!(result.total_chars, 120);
        assert_eq!(result.truncation_info.len(), 1);
        let info = &result.truncation_info[0];
        assert_eq!(info.doc_id, "m1");
        assert!(info.truncated);
        assert!(info.percent_included < 100);
        // 21 system + 2 sep + 23 + 24 section wrappers + 33 doc prefix + 12 doc suffix = 115
        assert_eq!(info.percent_included, 3);
    }

    #[test]
    fn test_overview_truncation_is_recorded() {
        let overview = "o".repeat(400);
        let result = build(Some(&overview), None, &[], 140);
        assert!(result.total_chars <= 140);
        assert_eq!(
            result.sources,
            vec![PromptSource {
                doc_id: OVERVIEW_DOC_ID.to_string(),
                title: OVERVIEW_TITLE.to_string(),
                source_type: SourceType::Overview,
            }]
        );
        assert!(result.truncation_info[0].truncated);
    }

    #[test]
    fn test_user_context_is_whole_or_omitted() {
        let context = "c".repeat(50);
        // Fits: 21 + 2 + 23 + 50 + 24 = 120
        let result = build(None, Some(&context), &[], 120);
        assert!(result.prompt.contains(&context));
        assert_eq!(result.total_chars, 120);

        let result = build(None, Some(&context), &[], 119);
        assert!(!result.prompt.contains("<current_user_context>"));
        assert_eq!(result.prompt, SYSTEM);
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_exhausted_budget_omits_later_blocks() {
        let overview = "o".repeat(1_000);
        let docs = [doc("m1", "Doc 1", "body")];
        let result = build(Some(&overview), Some("ctx"), &docs, 200);
        assert_eq!(result.total_chars, 200);
        assert!(!result.prompt.contains("<current_user_context>"));
        assert!(!result.prompt.contains("<referenced_documents>"));
        assert_eq!(result.sources.len(), 1);
    }

    #[test]
    fn test_no_mentions_means_no_section() {
        let result = build(Some("Overview"), None, &[], 10_000);
        assert!(!result.prompt.contains("referenced_documents"));
        assert!(!result.has_referenced_documents());
    }

    #[test]
    fn test_later_mentions_dropped_when_budget_runs_out() {
        let docs = [
            doc("m1", "Doc 1", &"x".repeat(500)),
            doc("m2", "Doc 2", "tiny"),
        ];
        let result = build(None, None, &docs, 300);
        assert_eq!(result.total_chars, 300);
        let ids: Vec<_> = result.sources.iter().map(|s| s.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["m1"]);
        assert!(!result.prompt.contains("m2"));
    }

    #[test]
    fn test_attributes_are_escaped() {
        let docs = [doc("m\"1", "Q&A <draft>", "body")];
        let result = build(None, None, &docs, 10_000);
        assert!(result
            .prompt
            .contains("<document id=\"m&quot;1\" title=\"Q&amp;A &lt;draft&gt;\">"));
        assert_eq!(result.sources[0].title, "Q&A <draft>");
    }

    #[test]
    fn test_multibyte_truncation_counts_characters() {
        let content = "é".repeat(100);
        let docs = [doc("m1", "D", &content)];
        let result = build(None, None, &docs, 150);
        assert_eq!(result.total_chars, 150);
        assert!(result.prompt.is_char_boundary(result.prompt.len()));
        assert!(result.truncation_info[0].truncated);
    }

    #[test]
    fn test_oversized_system_base_is_clipped() {
        let base = "s".repeat(50);
        let result = build_prompt_context(&PromptContextInput {
            model: "gpt-5.2",
            system_base: &base,
            project_overview_markdown: Some("overview"),
            user_context: None,
            mention_documents: &[],
            max_chars_override: Some(10),
        });
        assert_eq!(result.prompt, "s".repeat(10));
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_budget_defaults_to_model_window() {
        let result = build_prompt_context(&PromptContextInput {
            model: "gpt-5.2",
            system_base: SYSTEM,
            project_overview_markdown: None,
            user_context: None,
            mention_documents: &[],
            max_chars_override: None,
        });
        assert_eq!(result.max_chars, 400_000);
    }

    #[test]
    fn test_percent_included_never_reports_100_when_truncated() {
        assert_eq!(percent_included(1_000, 999), 99);
        assert_eq!(percent_included(1_000, 1_000), 100);
        assert_eq!(percent_included(0, 0), 100);
        assert_eq!(percent_included(200, 1), 1);
        assert_eq!(percent_included(3, 1), 33);
    }

    #[test]
    fn test_budget_postcondition_over_many_inputs() {
        let long = "word ".repeat(200);
        let docs = [
            doc("m1", "First", &long),
            doc("m2", "Second", "short"),
            doc("m3", "Third", &long),
        ];
        for max_chars in (0..1_500).step_by(7) {
            for overview in [None, Some(long.as_str())] {
                for user_context in [None, Some("user")] {
                    let result = build(overview, user_context, &docs, max_chars);
                    assert!(result.total_chars <= max_chars, "max {}", max_chars);
                    assert_eq!(result.sources.len(), result.truncation_info.len());
                    for info in &result.truncation_info {
                        if info.truncated {
                            assert!(info.percent_included < 100);
                        } else {
                            assert_eq!(info.percent_included, 100);
                        }
                    }
                }
            }
        }
    }
}
