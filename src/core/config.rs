//! Engine configuration with documented limits
//!
//! Every bound the mastering engine enforces lives here, with an explanation of
//! what it protects against. The configuration can be loaded from TOML; any
//! key left out keeps its default.

use serde::Deserialize;
use std::path::Path;

use super::error::ConfigError;
use super::types::Seed;

/// Longest Markov chain prefix supported by the name generator
pub const MAX_CHAIN_LENGTH: usize = 10;

/// Configuration for blueprint mastering
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// How many times one attribute may resolve to yet another field
    ///
    /// A field may legitimately return another field (an operator returning a
    /// dice roll, a pick returning a template). A chain longer than this is
    /// treated as runaway recursion and reported as an error.
    pub max_resolution_steps: usize,

    /// How deep blueprints may nest inside each other
    ///
    /// A class holding a nested instance of itself would otherwise recurse
    /// until the stack overflows.
    pub max_nesting_depth: usize,

    /// Default prefix length for Markov fields declared in TOML
    pub markov_chain_len: usize,

    /// Default maximum generated name length for Markov fields declared in TOML
    pub markov_max_length: usize,

    /// Seed used by the command line tool when none is given
    pub default_seed: Option<Seed>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            max_resolution_steps: 64,
            max_nesting_depth: 16,
            markov_chain_len: 2,
            markov_max_length: 10,
            default_seed: None,
        }
    }
}

impl ForgeConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ForgeConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resolution_steps == 0 {
            return Err(ConfigError::Invalid(
                "max_resolution_steps must be at least 1".to_string(),
            ));
        }
        if self.max_nesting_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_nesting_depth must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_CHAIN_LENGTH).contains(&self.markov_chain_len) {
            return Err(ConfigError::Invalid(format!(
                "markov_chain_len must be between 1 and {}",
                MAX_CHAIN_LENGTH
            )));
        }
        Ok(())
    }
}
