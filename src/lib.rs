//! Blueprint Forge - declarative procedural content generation
//!
//! Blueprint classes declare fields; mastering resolves them into concrete,
//! reproducible instances. Classes and other taggable objects can be queried
//! and selected by tag.

pub mod blueprints;
pub mod core;
pub mod tags;

pub use blueprints::{Blueprint, BlueprintClass, Field, Value};
pub use crate::core::error::{ForgeError, Result};
pub use crate::core::{ForgeConfig, Seed};
