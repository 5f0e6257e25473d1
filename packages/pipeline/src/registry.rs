//! Built-in pipeline profiles, loaded from embedded TOML configs.
//!
//! Each `.toml` file in `packages/pipeline/profiles/` is baked in at compile
//! time via [`include_str!`].

use crate::PipelineError;
use crate::config::PipelineProfile;

const PROFILE_TOMLS: &[(&str, &str)] = &[
    ("seasonal", include_str!("../profiles/seasonal.toml")),
    ("trend", include_str!("../profiles/trend.toml")),
    (
        "autoregressive",
        include_str!("../profiles/autoregressive.toml"),
    ),
    ("per_type", include_str!("../profiles/per_type.toml")),
];

/// Parses a pipeline profile from TOML.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] if the TOML is malformed or missing
/// required fields.
pub fn parse_profile_toml(toml_str: &str) -> Result<PipelineProfile, PipelineError> {
    Ok(toml::from_str(toml_str)?)
}

/// Returns all built-in pipeline profiles.
///
/// # Panics
///
/// Panics if any embedded TOML config is malformed.
#[must_use]
pub fn all_profiles() -> Vec<PipelineProfile> {
    PROFILE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_profile_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up a built-in profile by id.
///
/// # Errors
///
/// Returns [`PipelineError::UnknownProfile`] if no built-in profile has
/// that id.
pub fn profile(id: &str) -> Result<PipelineProfile, PipelineError> {
    all_profiles()
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| PipelineError::UnknownProfile {
            kind: "pipeline",
            id: id.to_string(),
        })
}
