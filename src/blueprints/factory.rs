//! Factories: a product blueprint plus an ordered list of mods.

use std::sync::Arc;

use tracing::debug;

use super::class::BlueprintClass;
use super::instance::Blueprint;
use super::master::Master;
use super::mods::{apply_mod, ModSpec};
use super::value::Value;
use crate::core::error::{ConfigError, Result};
use crate::core::types::Seed;

const PRODUCT: &str = "product";

/// Assembles a product by mastering a factory class and applying mods in order.
///
/// The factory class must declare a `product` field resolving to a blueprint
/// (typically a nested class or a `pick_from` over classes). Every other field
/// of the mastered factory is copied onto the finished product.
#[derive(Debug, Clone)]
pub struct Factory {
    class: BlueprintClass,
    mods: Vec<ModSpec>,
}

impl Factory {
    pub fn new<I, M>(class: &BlueprintClass, mods: I) -> std::result::Result<Self, ConfigError>
    where
        I: IntoIterator<Item = M>,
        M: Into<ModSpec>,
    {
        if !class.has_field(PRODUCT) {
            return Err(ConfigError::MissingProduct(class.name().to_string()));
        }
        Ok(Self {
            class: class.clone(),
            mods: mods.into_iter().map(Into::into).collect(),
        })
    }

    pub fn class(&self) -> &BlueprintClass {
        &self.class
    }

    pub fn mods(&self) -> &[ModSpec] {
        &self.mods
    }

    pub fn produce(&self, parent: Option<Arc<Blueprint>>, seed: Option<Seed>) -> Result<Blueprint> {
        let mut master = Master::new(&self.class).maybe_seed(seed);
        if let Some(parent) = parent {
            master = master.parent(parent);
        }
        let factory = master.run()?;

        let product = match factory.get(PRODUCT) {
            Some(Value::Blueprint(bp)) => Arc::clone(bp),
            other => {
                return Err(ConfigError::ProductNotBlueprint {
                    factory: self.class.name().to_string(),
                    got: other.map_or("nothing", Value::type_name).to_string(),
                }
                .into())
            }
        };

        let mut product = match self.mods.split_first() {
            None => product.derive_clone(),
            Some((first, rest)) => {
                let mut current = apply_mod(first.clone(), product, None)?;
                for m in rest {
                    current = apply_mod(m.clone(), current, None)?;
                }
                current
            }
        };

        for name in factory.fields() {
            if name == PRODUCT {
                continue;
            }
            if let Some(value) = factory.get(name) {
                product.set(name, value.clone());
            }
        }
        debug!(
            "Factory {} produced {} with {} mods",
            self.class.name(),
            product.class().name(),
            self.mods.len()
        );
        Ok(product)
    }
}
