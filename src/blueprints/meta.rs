//! Per-instance metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;

use super::class::BlueprintClass;
use super::field::Field;
use super::instance::Blueprint;
use super::resolve::ResolveError;
use super::value::Value;
use crate::core::types::{InstanceId, Seed};

/// Metadata carried by every blueprint instance.
///
/// `source` and `parent` are shared snapshots of related blueprints and are
/// never deep-copied. The random source is private to the instance and seeded
/// from `seed`.
#[derive(Clone)]
pub struct Meta {
    pub fields: Vec<String>,
    pub mastered: bool,
    pub is_abstract: bool,
    /// The blueprint this one was derived from by a mod
    pub source: Option<Arc<Blueprint>>,
    /// The enclosing blueprint when this one is nested
    pub parent: Option<Arc<Blueprint>>,
    pub seed: Seed,
    /// Overrides passed at mastering time
    pub kwargs: BTreeMap<String, Field>,
    /// Arbitrary options declared on the class
    pub options: BTreeMap<String, Value>,
    pub instance_id: InstanceId,
    rng: ChaCha8Rng,
}

impl Meta {
    /// The unmastered template for `class`
    pub fn for_class(class: &BlueprintClass, seed: Seed) -> Self {
        Self {
            fields: class.field_names().to_vec(),
            mastered: false,
            is_abstract: class.is_abstract(),
            source: None,
            parent: None,
            rng: seed.rng(),
            seed,
            kwargs: BTreeMap::new(),
            options: class.options().clone(),
            instance_id: InstanceId::new(),
        }
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Copy for a derived instance: value fields are copied, the generator is
    /// re-seeded from `seed`, the instance gets a new identity and the
    /// source/parent references are shared.
    pub fn derive_clone(&self) -> Self {
        Self {
            rng: self.seed.rng(),
            instance_id: InstanceId::new(),
            ..self.clone()
        }
    }

    /// Read `meta.<path>`: `seed`, `mastered`, `abstract`, `instance_id`,
    /// `source[.x]`, `parent[.x]` or a class option.
    pub fn lookup(&self, path: &str) -> Result<Value, ResolveError> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let related = |bp: &Option<Arc<Blueprint>>, what: &str| match bp {
            None => Err(ResolveError::NoSource(what.to_string())),
            Some(bp) => match rest {
                Some(rest) => bp.lookup(rest),
                None => Ok(Value::Blueprint(Arc::clone(bp))),
            },
        };
        match head {
            "source" => related(&self.source, "source"),
            "parent" => related(&self.parent, "parent"),
            "seed" => Ok(seed_value(&self.seed)),
            "mastered" => Ok(Value::Bool(self.mastered)),
            "abstract" => Ok(Value::Bool(self.is_abstract)),
            "instance_id" => Ok(Value::Str(self.instance_id.to_string())),
            key => match self.options.get(key) {
                Some(value) => match rest {
                    Some(rest) => descend(value, rest),
                    None => Ok(value.clone()),
                },
                None => Err(ResolveError::UnknownAttribute(format!("meta.{}", path))),
            },
        }
    }
}

fn seed_value(seed: &Seed) -> Value {
    match seed {
        Seed::Int(n) => i64::try_from(*n)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Str(n.to_string())),
        Seed::Text(s) => Value::Str(s.clone()),
    }
}

/// Follow the rest of a dotted path into a blueprint or mapping value
pub(crate) fn descend(value: &Value, path: &str) -> Result<Value, ResolveError> {
    match value {
        Value::Blueprint(bp) => bp.lookup(path),
        Value::Map(map) => {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (path, None),
            };
            let inner = map
                .get(head)
                .ok_or_else(|| ResolveError::UnknownAttribute(head.to_string()))?;
            match rest {
                Some(rest) => descend(inner, rest),
                None => Ok(inner.clone()),
            }
        }
        other => Err(ResolveError::TypeMismatch(format!(
            "cannot read `{}` from {}",
            path,
            other.type_name()
        ))),
    }
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("fields", &self.fields)
            .field("mastered", &self.mastered)
            .field("abstract", &self.is_abstract)
            .field("seed", &self.seed)
            .field("source", &self.source.as_ref().map(|s| s.name()))
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("options", &self.options)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}
