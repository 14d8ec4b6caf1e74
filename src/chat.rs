//! Chat turn driver.
//!
//! A turn runs in two phases. Mentions are loaded through the gate and the
//! prompt is assembled; only then is the completion provider asked for
//! tokens, which are forwarded to the caller over a bounded channel. Dropping
//! the receiving end cancels the stream.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{GateError, Result};
use crate::mentions::load_mention_documents;
use crate::models;
use crate::prompt_context::{build_prompt_context, PromptContextInput, PromptContextResult, PromptSource, TruncationInfo};
use crate::prompts::system_base;
use crate::store::{TranscriptContentStore, VisibilityStore};
use crate::types::UserIdentity;

/// Tokens buffered between the provider and the forwarding loop.
const TOKEN_BUFFER: usize = 32;

/// What a provider receives: the assembled system prompt and the user's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Provider-side model id.
    pub model: String,
    pub system_prompt: String,
    pub user_message: String,
}

/// A streaming text-completion backend.
///
/// Implementations push tokens into `tokens` until done. A failed send means
/// the turn was cancelled; the provider should stop and return `Ok(())`.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn stream_completion(
        &self,
        request: &CompletionRequest,
        tokens: mpsc::Sender<String>,
    ) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Sources {
        sources: Vec<PromptSource>,
        truncation_info: Vec<TruncationInfo>,
    },
    Token {
        text: String,
    },
    Done {
        tokens: usize,
    },
}

#[derive(Debug, Clone)]
pub struct ChatTurn<'a> {
    pub user: &'a UserIdentity,
    pub model: &'a str,
    pub message: &'a str,
    pub mention_ids: &'a [String],
    pub project_overview_markdown: Option<&'a str>,
    pub user_context: Option<&'a str>,
    pub max_chars_override: Option<usize>,
    pub today: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct ChatTurnSummary {
    pub context: PromptContextResult,
    pub tokens: usize,
    pub cancelled: bool,
}

/// Load mentions and assemble the prompt for `turn`. Performs no streaming.
pub fn prepare_chat_turn<S>(store: &S, turn: &ChatTurn<'_>) -> Result<(CompletionRequest, PromptContextResult)>
where
    S: VisibilityStore + TranscriptContentStore + ?Sized,
{
    let model = if turn.model.trim().is_empty() {
        models::DEFAULT_MODEL
    } else {
        turn.model
    };
    let documents = load_mention_documents(store, turn.user, model, turn.mention_ids)?;
    let base = system_base(turn.today);
    let context = build_prompt_context(&PromptContextInput {
        model,
        system_base: &base,
        project_overview_markdown: turn.project_overview_markdown,
        user_context: turn.user_context,
        mention_documents: &documents,
        max_chars_override: turn.max_chars_override,
    });

    let provider_model = models::model_spec(model)
        .map(|m| m.provider_model_id)
        .unwrap_or(model);
    let request = CompletionRequest {
        model: provider_model.to_string(),
        system_prompt: context.prompt.clone(),
        user_message: turn.message.to_string(),
    };
    Ok((request, context))
}

/// Run one chat turn end to end, emitting events on `events`.
pub async fn run_chat_turn<S, P>(
    store: &S,
    provider: &P,
    turn: ChatTurn<'_>,
    events: mpsc::Sender<ChatEvent>,
) -> Result<ChatTurnSummary>
where
    S: VisibilityStore + TranscriptContentStore + ?Sized,
    P: CompletionProvider + ?Sized,
{
    let (request, context) = prepare_chat_turn(store, &turn)?;
    log::info!(
        "Chat turn for user {}: {} chars, {} sources",
        turn.user.user_id,
        context.total_chars,
        context.sources.len()
    );

    let sources = ChatEvent::Sources {
        sources: context.sources.clone(),
        truncation_info: context.truncation_info.clone(),
    };
    if events.send(sources).await.is_err() {
        return Ok(ChatTurnSummary {
            context,
            tokens: 0,
            cancelled: true,
        });
    }

    let (tx, rx) = mpsc::channel::<String>(TOKEN_BUFFER);
    let produce = provider.stream_completion(&request, tx);
    let forward = async {
        let mut rx = rx;
        let mut forwarded = 0usize;
        while let Some(text) = rx.recv().await {
            if events.send(ChatEvent::Token { text }).await.is_err() {
                return (forwarded, true);
            }
            forwarded += 1;
        }
        (forwarded, false)
    };
    let (produced, (tokens, cancelled)) = tokio::join!(produce, forward);

    if cancelled {
        log::info!("Chat turn for user {} cancelled after {} tokens", turn.user.user_id, tokens);
        return Ok(ChatTurnSummary {
            context,
            tokens,
            cancelled: true,
        });
    }
    if let Err(e) = produced {
        log::warn!("Completion failed for user {}: {}", turn.user.user_id, e);
        return Err(match e {
            GateError::Completion(message) => GateError::Completion(message),
            other => GateError::Completion(other.to_string()),
        });
    }

    let cancelled = events.send(ChatEvent::Done { tokens }).await.is_err();
    Ok(ChatTurnSummary {
        context,
        tokens,
        cancelled,
    })
}
