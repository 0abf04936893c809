use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of third-party LLM vendors a user can store a key for.
/// Immutable once a credential exists; part of the uniqueness key together
/// with the owning user.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Anthropic,
    Gemini,
    Groq,
    Cohere,
    Huggingface,
    Replicate,
    Together,
    Ollama,
    Azure,
    Deepseek,
    Mistral,
    Perplexity,
    Openrouter,
    Google,
    Stability,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::Groq => "groq",
            Provider::Cohere => "cohere",
            Provider::Huggingface => "huggingface",
            Provider::Replicate => "replicate",
            Provider::Together => "together",
            Provider::Ollama => "ollama",
            Provider::Azure => "azure",
            Provider::Deepseek => "deepseek",
            Provider::Mistral => "mistral",
            Provider::Perplexity => "perplexity",
            Provider::Openrouter => "openrouter",
            Provider::Google => "google",
            Provider::Stability => "stability",
        }
    }

    /// Boundary validation: unknown names are rejected before any vault
    /// operation runs.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "openai" => Some(Provider::Openai),
            "anthropic" => Some(Provider::Anthropic),
            "gemini" => Some(Provider::Gemini),
            "groq" => Some(Provider::Groq),
            "cohere" => Some(Provider::Cohere),
            "huggingface" => Some(Provider::Huggingface),
            "replicate" => Some(Provider::Replicate),
            "together" => Some(Provider::Together),
            "ollama" => Some(Provider::Ollama),
            "azure" => Some(Provider::Azure),
            "deepseek" => Some(Provider::Deepseek),
            "mistral" => Some(Provider::Mistral),
            "perplexity" => Some(Provider::Perplexity),
            "openrouter" => Some(Provider::Openrouter),
            "google" => Some(Provider::Google),
            "stability" => Some(Provider::Stability),
            _ => None,
        }
    }

    /// Fixed model catalog per provider. Providers without a configured list
    /// yield an empty slice.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Provider::Openai => &["gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"],
            Provider::Anthropic => &["claude-3-opus", "claude-3-sonnet", "claude-3-haiku"],
            Provider::Gemini => &["gemini-pro", "gemini-ultra"],
            Provider::Groq => &["mixtral-8x7b", "llama-2-70b"],
            _ => &[],
        }
    }
}

/// One stored credential per (user, provider). `api_key` holds the ciphertext
/// text form (`ivHex:cipherHex`, or bare hex for pre-migration records) and is
/// never serialized into API responses.
#[derive(Clone, Debug)]
pub struct ProviderCredential {
    pub id: i32,
    pub user_id: i32,
    pub provider: Provider,
    pub api_key: String,
    pub is_enabled: bool,
    pub enabled_models: HashMap<String, bool>,
    pub last_tested: Option<DateTime<Utc>>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Report shape for a single credential: validity and enablement state only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub provider: Provider,
    pub is_valid: bool,
    pub is_enabled: bool,
    pub enabled_models: HashMap<String, bool>,
    pub last_tested: Option<DateTime<Utc>>,
}

impl From<&ProviderCredential> for CredentialSummary {
    fn from(record: &ProviderCredential) -> Self {
        Self {
            provider: record.provider,
            is_valid: record.is_valid,
            is_enabled: record.is_enabled,
            enabled_models: record.enabled_models.clone(),
            last_tested: record.last_tested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_provider() {
        for name in [
            "openai",
            "anthropic",
            "gemini",
            "groq",
            "cohere",
            "huggingface",
            "replicate",
            "together",
            "ollama",
            "azure",
            "deepseek",
            "mistral",
            "perplexity",
            "openrouter",
            "google",
            "stability",
        ] {
            let provider = Provider::parse(name).expect(name);
            assert_eq!(provider.as_str(), name);
        }
        assert!(Provider::parse("bedrock").is_none());
        assert!(Provider::parse("OpenAI").is_none());
    }

    #[test]
    fn model_catalog_known_and_empty_providers() {
        assert_eq!(
            Provider::Openai.models(),
            ["gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"]
        );
        assert!(Provider::Stability.models().is_empty());
    }

    #[test]
    fn summary_excludes_ciphertext() {
        let json = serde_json::to_value(CredentialSummary {
            provider: Provider::Openai,
            is_valid: true,
            is_enabled: true,
            enabled_models: HashMap::new(),
            last_tested: None,
        })
        .unwrap();
        assert!(json.get("api_key").is_none());
        assert_eq!(json["provider"], "openai");
    }
}
