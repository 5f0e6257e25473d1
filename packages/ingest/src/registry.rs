//! Ingest profile registry, loaded from embedded TOML configs.
//!
//! Each `.toml` file in `packages/ingest/profiles/` is baked in at compile
//! time via [`include_str!`].

use crime_forecast_ingest_models::IngestProfile;

use crate::IngestError;

const PROFILE_TOMLS: &[(&str, &str)] = &[
    (
        "street_headered",
        include_str!("../profiles/street_headered.toml"),
    ),
    (
        "street_positional",
        include_str!("../profiles/street_positional.toml"),
    ),
    (
        "any_csv_positional",
        include_str!("../profiles/any_csv_positional.toml"),
    ),
];

/// Parses an ingest profile from TOML.
///
/// # Errors
///
/// Returns [`IngestError::Profile`] if the TOML is malformed or missing
/// required fields.
pub fn parse_profile_toml(toml_str: &str) -> Result<IngestProfile, IngestError> {
    Ok(toml::from_str(toml_str)?)
}

/// Returns all built-in ingest profiles.
///
/// # Panics
///
/// Panics if any embedded TOML config is malformed.
#[must_use]
pub fn all_profiles() -> Vec<IngestProfile> {
    PROFILE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_profile_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up a built-in profile by id.
#[must_use]
pub fn profile(id: &str) -> Option<IngestProfile> {
    all_profiles().into_iter().find(|p| p.id == id)
}
