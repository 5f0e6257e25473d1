#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Narrative recommendations for a crime forecast.
//!
//! The historical and predicted series are serialized into a prompt and sent
//! to an LLM provider (`OpenAI` or Anthropic). The reply is opaque markdown.
//! Any failure degrades to a fixed placeholder so the caller always has
//! something to display.

pub mod prompt;
pub mod providers;

use crime_forecast_forecast_models::NarrativeSummary;
use thiserror::Error;

use crate::providers::LlmProvider;

/// Shown when the provider call fails for any reason.
pub const ERROR_PLACEHOLDER: &str = "Error generating recommendations.";

/// Shown when there is no forecast to talk about.
pub const NO_DATA_PLACEHOLDER: &str = "No sufficient data to generate recommendations.";

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request to LLM provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// The provider answered without any text.
    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// What to display in the recommendations panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recommendation {
    /// Provider reply, markdown formatted.
    Markdown(String),
    /// Fixed text used when no reply is available.
    Placeholder(String),
}

impl Recommendation {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Markdown(text) | Self::Placeholder(text) => text,
        }
    }

    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// Asks `provider` for recommendations, propagating failures.
///
/// # Errors
///
/// * [`AiError`] from prompt serialization or the provider call
pub async fn request_recommendations(
    provider: &dyn LlmProvider,
    summary: &NarrativeSummary,
) -> Result<String, AiError> {
    let user = prompt::user_prompt(summary)?;
    log::info!(
        "Requesting recommendations from {} ({} historical, {} predicted points)",
        provider.name(),
        summary.historical.len(),
        summary.predicted.len(),
    );
    provider.complete(prompt::SYSTEM_PROMPT, &user).await
}

/// Asks `provider` for recommendations, never failing.
///
/// An empty forecast short-circuits to [`NO_DATA_PLACEHOLDER`] without
/// calling the provider; any error becomes [`ERROR_PLACEHOLDER`].
pub async fn recommend(provider: &dyn LlmProvider, summary: &NarrativeSummary) -> Recommendation {
    if summary.predicted.is_empty() {
        log::warn!("No forecast available for recommendations");
        return Recommendation::Placeholder(NO_DATA_PLACEHOLDER.to_string());
    }

    match request_recommendations(provider, summary).await {
        Ok(text) => Recommendation::Markdown(text),
        Err(e) => {
            log::warn!("Error generating recommendations: {e}");
            Recommendation::Placeholder(ERROR_PLACEHOLDER.to_string())
        }
    }
}
