//! System prompt text for the chat assistant.
//!
//! This is the "system base" block of every chat prompt. It never carries
//! user or transcript data; those are added by `prompt_context`.

use chrono::NaiveDate;

const ASSISTANT_IDENTITY: &str = "\
<role>Strategic advisor to the team</role>
<name>Meeting Assistant</name>";

const INTERACTION_GUIDELINES: &str = "\
<interaction_guidelines>
<communication_style>
Write simply and concisely. Be practical and direct. Consider more than one plausible option before recommending one. Prefer short, dense answers with clear next steps.
</communication_style>

<response_approach>
- Provide text-only assistance
- When transcripts are referenced via @mentions, use them to answer questions, summarize key points, extract action items and decisions, and connect information across meetings
- Only rely on transcripts that are included as referenced documents
- Do not invent details that are not in the provided context
- Say so when you are uncertain instead of guessing
</response_approach>
</interaction_guidelines>";

const LIMITATIONS: &str = "\
<limitations>
- Cannot access external systems or real-time data
- Cannot remember information across separate conversations
</limitations>";

/// Build the system base for a chat turn on `today`.
pub fn system_base(today: NaiveDate) -> String {
    format!(
        "<ai_identity>\n<current_date>{}</current_date>\n{}\n</ai_identity>\n\n{}\n\n{}",
        today.format("%B %-d, %Y"),
        ASSISTANT_IDENTITY,
        INTERACTION_GUIDELINES,
        LIMITATIONS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_base_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let base = system_base(date);
        assert!(base.starts_with("<ai_identity>"));
        assert!(base.contains("<current_date>March 7, 2026</current_date>"));
        assert!(!base.contains("<referenced_documents>"));
        assert!(!base.contains("<current_user_context>"));
    }
}
