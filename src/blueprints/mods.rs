//! Mods: stamping one blueprint's fields onto another.

use std::sync::Arc;

use tracing::debug;

use super::class::BlueprintClass;
use super::instance::Blueprint;
use super::master::Master;
use super::resolve::ResolveError;
use crate::core::types::Seed;

/// A blueprint to apply, either as a class still to master or as a mastered instance
#[derive(Debug, Clone)]
pub enum ModSpec {
    Class(BlueprintClass),
    Instance(Arc<Blueprint>),
}

impl From<BlueprintClass> for ModSpec {
    fn from(class: BlueprintClass) -> Self {
        ModSpec::Class(class)
    }
}

impl From<&BlueprintClass> for ModSpec {
    fn from(class: &BlueprintClass) -> Self {
        ModSpec::Class(class.clone())
    }
}

impl From<Blueprint> for ModSpec {
    fn from(bp: Blueprint) -> Self {
        ModSpec::Instance(Arc::new(bp))
    }
}

impl From<Arc<Blueprint>> for ModSpec {
    fn from(bp: Arc<Blueprint>) -> Self {
        ModSpec::Instance(bp)
    }
}

/// Apply `modifier` to `target`, returning a modified copy of the target.
///
/// A class target is mastered first (with `seed`, if given). The result is a
/// derived clone of the target with `meta.source` pointing at the unmodified
/// target. A class modifier is mastered with its own source bound to that
/// same target, so fields such as `{meta.source.damage}` read the value being
/// modified. Every field of the mastered modifier then overwrites the copy.
pub fn apply_mod(
    modifier: impl Into<ModSpec>,
    target: impl Into<ModSpec>,
    seed: Option<Seed>,
) -> Result<Blueprint, ResolveError> {
    let original = match target.into() {
        ModSpec::Class(class) => Arc::new(Master::new(&class).maybe_seed(seed).run()?),
        ModSpec::Instance(bp) => bp,
    };
    let mut result = original.derive_clone();
    result.meta_mut().source = Some(Arc::clone(&original));

    let modifier = match modifier.into() {
        ModSpec::Instance(bp) => bp,
        ModSpec::Class(class) => {
            let seed = original.meta().seed.derive(class.name());
            Arc::new(
                Master::new(&class)
                    .seed(seed)
                    .source(Arc::clone(&original))
                    .run()?,
            )
        }
    };

    for name in modifier.fields() {
        if let Some(value) = modifier.get(name) {
            result.set(name, value.clone());
        }
    }
    debug!(
        "Applied {} to {}",
        modifier.class().name(),
        original.class().name()
    );
    Ok(result)
}
