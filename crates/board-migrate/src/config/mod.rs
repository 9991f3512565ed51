//! Configuration loading and validation.
//!
//! A run is configured either from a YAML file ([`Config::load`]) or from one
//! or two `.env`-style files ([`DatabaseConfig::from_env_file`]).

mod env;
mod types;
mod validation;

pub use env::{load_env_file, parse_env, DEFAULT_ENV_FILE};
pub use types::*;
pub use validation::validate_options;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}
