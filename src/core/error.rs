use thiserror::Error;

use crate::blueprints::dice::DiceError;
use crate::blueprints::registry::SchemaError;
use crate::blueprints::resolve::ResolveError;
use crate::tags::TagError;

/// Configuration errors, raised eagerly at definition or first use
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Factory {0} must declare a `product` field")]
    MissingProduct(String),

    #[error("Factory {factory} product must resolve to a single blueprint, got {got}")]
    ProductNotBlueprint { factory: String, got: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForgeError>;
