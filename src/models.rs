//! Chat model registry: context windows and mention limits.

use serde::Serialize;

/// Budget conversion used for every model.
pub const CHARS_PER_TOKEN: usize = 4;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4.5";

/// Context window assumed for models missing from the registry.
pub const FALLBACK_CONTEXT_TOKENS: usize = 100_000;

/// Mention cap assumed for models missing from the registry.
pub const FALLBACK_MAX_MENTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub key: &'static str,
    pub provider: Provider,
    /// Identifier sent to the provider.
    pub provider_model_id: &'static str,
    pub context_tokens: usize,
    pub max_mentions: usize,
}

pub const MODELS: &[ModelSpec] = &[
    ModelSpec {
        key: "claude-opus-4.5",
        provider: Provider::Anthropic,
        provider_model_id: "claude-opus-4-5-20251101",
        context_tokens: 180_000,
        max_mentions: 10,
    },
    ModelSpec {
        key: "claude-sonnet-4.5",
        provider: Provider::Anthropic,
        provider_model_id: "claude-sonnet-4-5-20250929",
        context_tokens: 180_000,
        max_mentions: 10,
    },
    ModelSpec {
        key: "gpt-5.2",
        provider: Provider::OpenAi,
        provider_model_id: "gpt-5.2",
        context_tokens: 100_000,
        max_mentions: 5,
    },
    ModelSpec {
        key: "grok-4",
        provider: Provider::OpenAi,
        provider_model_id: "grok-4",
        context_tokens: 100_000,
        max_mentions: 5,
    },
];

pub fn model_spec(model: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.key == model)
}

pub fn context_limit(model: &str) -> usize {
    model_spec(model)
        .map(|m| m.context_tokens)
        .unwrap_or(FALLBACK_CONTEXT_TOKENS)
}

pub fn max_mentions(model: &str) -> usize {
    model_spec(model)
        .map(|m| m.max_mentions)
        .unwrap_or(FALLBACK_MAX_MENTIONS)
}

/// Character budget for one prompt sent to `model`.
pub fn max_chars_for(model: &str) -> usize {
    context_limit(model) * CHARS_PER_TOKEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_models() {
        assert_eq!(max_chars_for("claude-sonnet-4.5"), 720_000);
        assert_eq!(max_mentions("claude-opus-4.5"), 10);
        assert_eq!(max_mentions("gpt-5.2"), 5);
        assert_eq!(model_spec("grok-4").map(|m| m.provider), Some(Provider::OpenAi));
    }

    #[test]
    fn test_unknown_model_falls_back() {
        assert!(model_spec("mystery-1").is_none());
        assert_eq!(context_limit("mystery-1"), 100_000);
        assert_eq!(max_chars_for("mystery-1"), 400_000);
        assert_eq!(max_mentions("mystery-1"), 5);
    }

    #[test]
    fn test_default_model_is_registered() {
        assert!(model_spec(DEFAULT_MODEL).is_some());
    }
}
