//! Class library: loading blueprint classes declared in TOML.
//!
//! Classes are defined in load order, so a base must appear before (or in an
//! earlier file than) anything extending it.

use ahash::AHashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use super::class::BlueprintClass;
use super::instance::Blueprint;
use super::master::Master;
use super::schema::{toml_to_value, ClassDef, FieldEnv, LibraryFile};
use crate::core::config::ForgeConfig;
use crate::core::error::Result;
use crate::core::types::Seed;
use crate::tags::TagRepository;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(String),

    #[error("Class {class} extends unknown class {base}")]
    UnknownBase { class: String, base: String },

    #[error("Class {0} is declared twice")]
    DuplicateClass(String),

    #[error("Invalid field {class}.{field}: {reason}")]
    InvalidField {
        class: String,
        field: String,
        reason: String,
    },

    #[error("Unknown class: {0}")]
    UnknownClass(String),
}

/// Classes loaded from TOML, by name
pub struct ClassLibrary {
    classes: AHashMap<String, BlueprintClass>,
    order: Vec<String>,
    config: ForgeConfig,
}

impl ClassLibrary {
    pub fn new() -> Self {
        Self::with_config(ForgeConfig::default())
    }

    pub fn with_config(config: ForgeConfig) -> Self {
        Self {
            classes: AHashMap::new(),
            order: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Define every class in a TOML document, returning their names
    pub fn load_str(&mut self, text: &str) -> std::result::Result<Vec<String>, SchemaError> {
        let file: LibraryFile = toml::from_str(text).map_err(|e| SchemaError::Toml(e.to_string()))?;
        let mut names = Vec::with_capacity(file.blueprints.len());
        for def in file.blueprints {
            names.push(self.define(def)?.name().to_string());
        }
        Ok(names)
    }

    pub fn load_file(&mut self, path: &Path) -> std::result::Result<Vec<String>, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        let names = self.load_str(&content).map_err(|e| match e {
            SchemaError::Toml(msg) => SchemaError::Toml(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        info!("Loaded {} blueprint classes from {}", names.len(), path.display());
        Ok(names)
    }

    /// Load all .toml files under a directory, recursively, in name order
    pub fn load_directory(&mut self, path: &Path) -> std::result::Result<Vec<String>, SchemaError> {
        let mut names = Vec::new();
        self.load_directory_recursive(path, &mut names)?;
        Ok(names)
    }

    fn load_directory_recursive(
        &mut self,
        path: &Path,
        names: &mut Vec<String>,
    ) -> std::result::Result<(), SchemaError> {
        let mut entries = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        entries.sort();

        for entry_path in entries {
            if entry_path.is_dir() {
                self.load_directory_recursive(&entry_path, names)?;
            } else if entry_path.extension().map_or(false, |ext| ext == "toml") {
                names.extend(self.load_file(&entry_path)?);
            }
        }
        Ok(())
    }

    /// Register one class definition
    pub fn define(&mut self, def: ClassDef) -> std::result::Result<&BlueprintClass, SchemaError> {
        if self.classes.contains_key(&def.name) {
            return Err(SchemaError::DuplicateClass(def.name));
        }

        let mut builder = BlueprintClass::builder(&def.name);
        for base in &def.extends {
            let class = self.classes.get(base).ok_or_else(|| SchemaError::UnknownBase {
                class: def.name.clone(),
                base: base.clone(),
            })?;
            builder = builder.extends(class);
        }
        if let Some(tags) = &def.tags {
            builder = builder.tags(tags);
        }
        if def.is_abstract {
            builder = builder.abstract_class();
        }
        for (key, value) in &def.meta {
            builder = builder.option(key, toml_to_value(value));
        }

        let lookup = |name: &str| self.classes.get(name).cloned();
        let env = FieldEnv {
            config: &self.config,
            classes: &lookup,
        };
        for (name, value) in &def.fields {
            let field = env.field(value).map_err(|reason| SchemaError::InvalidField {
                class: def.name.clone(),
                field: name.clone(),
                reason,
            })?;
            builder = builder.field(name, field);
        }

        let class = builder.build();
        debug!("Defined {} from TOML", def.name);
        self.order.push(def.name.clone());
        Ok(self.classes.entry(def.name).or_insert(class))
    }

    pub fn get(&self, name: &str) -> Option<&BlueprintClass> {
        self.classes.get(name)
    }

    pub fn require(&self, name: &str) -> std::result::Result<&BlueprintClass, SchemaError> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownClass(name.to_string()))
    }

    /// Class names in definition order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The family repository `name` belongs to
    pub fn family(
        &self,
        name: &str,
    ) -> std::result::Result<&TagRepository<BlueprintClass>, SchemaError> {
        Ok(self.require(name)?.tag_repo())
    }

    /// Master a class by name with this library's configuration
    pub fn master(&self, name: &str, seed: Option<Seed>) -> Result<Blueprint> {
        let class = self.require(name)?;
        Ok(Master::new(class)
            .maybe_seed(seed)
            .config(&self.config)
            .run()?)
    }
}

impl Default for ClassLibrary {
    fn default() -> Self {
        Self::new()
    }
}
