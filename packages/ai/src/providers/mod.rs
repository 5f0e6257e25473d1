//! LLM provider abstraction and implementations.
//!
//! Supports `OpenAI` chat completions and Anthropic messages via a common
//! trait.

pub mod anthropic;
pub mod openai;

use serde::{Deserialize, Serialize};

use crate::AiError;

/// Sampling temperature used unless a provider is configured otherwise.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Sends one system + user exchange and returns the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails or the reply has no text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError>;
}

/// Which provider to talk to and with what credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderConfig {
    OpenAi {
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default = "default_temperature")]
        temperature: f64,
    },
    Anthropic {
        api_key: String,
        #[serde(default = "default_anthropic_model")]
        model: String,
        #[serde(default = "default_temperature")]
        temperature: f64,
    },
}

fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.to_string()
}

const fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// Builds the provider described by `config`.
#[must_use]
pub fn create_provider(config: ProviderConfig) -> Box<dyn LlmProvider> {
    match config {
        ProviderConfig::OpenAi {
            api_key,
            model,
            temperature,
        } => Box::new(openai::OpenAiProvider::new(api_key, model).with_temperature(temperature)),
        ProviderConfig::Anthropic {
            api_key,
            model,
            temperature,
        } => Box::new(
            anthropic::AnthropicProvider::new(api_key, model).with_temperature(temperature),
        ),
    }
}

pub(crate) fn provider_error(message: impl Into<String>) -> AiError {
    AiError::Provider {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_model_and_temperature() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"provider":"open_ai","api_key":"k"}"#).unwrap();

        assert_eq!(
            config,
            ProviderConfig::OpenAi {
                api_key: "k".to_string(),
                model: "gpt-4".to_string(),
                temperature: 0.7,
            }
        );
    }

    #[test]
    fn created_provider_matches_config() {
        let openai = create_provider(ProviderConfig::OpenAi {
            api_key: "k".to_string(),
            model: default_openai_model(),
            temperature: 0.2,
        });
        let anthropic = create_provider(ProviderConfig::Anthropic {
            api_key: "k".to_string(),
            model: default_anthropic_model(),
            temperature: 0.2,
        });

        assert_eq!(openai.name(), "openai");
        assert_eq!(anthropic.name(), "anthropic");
    }
}
