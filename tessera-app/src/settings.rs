//! Layered run configuration.
//!
//! Defaults, then an optional TOML file, then `TESSERA_*` environment
//! variables, then explicit command-line flags. The merged result is
//! validated before a run starts.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::Serialize;
use std::path::Path;
use tessera_slam::{ConfigError, SlamConfig};
use thiserror::Error;

pub const ENV_PREFIX: &str = "TESSERA_";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_similarity_transform: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submap_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_loops_per_submap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_disparity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold_percentile: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyframe_gating: Option<bool>,
}

pub fn figment(config_file: Option<&Path>, overrides: &Overrides) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(SlamConfig::default()));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Env::prefixed(ENV_PREFIX))
        .merge(Serialized::defaults(overrides))
}

pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<SlamConfig, SettingsError> {
    let config: SlamConfig = figment(config_file, overrides).extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
