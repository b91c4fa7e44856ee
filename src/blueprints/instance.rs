//! Mastered blueprint instances.
//!
//! A [`Blueprint`] is what mastering produces: one concrete [`Value`] per
//! declared field, plus the [`Meta`] that records how it was built. Instances
//! never hold unresolved fields.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::class::BlueprintClass;
use super::meta::{descend, Meta};
use super::resolve::ResolveError;
use super::value::Value;

#[derive(Debug, Clone)]
pub struct Blueprint {
    class: BlueprintClass,
    meta: Meta,
    values: BTreeMap<String, Value>,
}

impl Blueprint {
    pub(crate) fn from_parts(
        class: BlueprintClass,
        meta: Meta,
        values: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            class,
            meta,
            values,
        }
    }

    pub fn class(&self) -> &BlueprintClass {
        &self.class
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// Field names in resolution order
    pub fn fields(&self) -> &[String] {
        &self.meta.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The `name` field when present, otherwise the class label
    pub fn name(&self) -> String {
        match self.values.get("name") {
            Some(Value::Str(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.class.label().to_string(),
        }
    }

    /// Read a dotted path: `field`, `self.field`, `nested.field` or `meta.<...>`
    pub fn lookup(&self, path: &str) -> Result<Value, ResolveError> {
        let path = path.strip_prefix("self.").unwrap_or(path);
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        if head == "meta" {
            return match rest {
                Some(rest) => self.meta.lookup(rest),
                None => Err(ResolveError::TypeMismatch(
                    "`meta` is not a value".to_string(),
                )),
            };
        }
        let value = match self.values.get(head) {
            Some(value) => value.clone(),
            None if head == "name" => Value::Str(self.class.label().to_string()),
            None => return Err(ResolveError::UnknownAttribute(head.to_string())),
        };
        match rest {
            Some(rest) => descend(&value, rest),
            None => Ok(value),
        }
    }

    /// Snapshot of every resolved field
    pub fn to_mapping(&self) -> BTreeMap<String, Value> {
        self.values.clone()
    }

    /// Overwrite a field, adding it to the field set if new
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        if !self.meta.fields.iter().any(|f| f == name) {
            self.meta.fields.push(name.to_string());
        }
        self.values.insert(name.to_string(), value.into());
    }

    pub fn is_a(&self, class: &BlueprintClass) -> bool {
        self.class.is_subclass_of(class)
    }

    /// Invoke a generator method registered on the class
    pub fn call_generator(&self, name: &str) -> Result<Value, ResolveError> {
        let generator = self
            .class
            .generator(name)
            .ok_or_else(|| ResolveError::UnknownAttribute(name.to_string()))?;
        generator(self)
    }

    /// Copy with a re-seeded generator and a new identity; see [`Meta::derive_clone`]
    pub fn derive_clone(&self) -> Self {
        Self {
            class: self.class.clone(),
            meta: self.meta.derive_clone(),
            values: self.values.clone(),
        }
    }
}

impl fmt::Display for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.class.name())?;
        for (name, value) in &self.values {
            writeln!(f, "    {}: {}", name, value)?;
        }
        Ok(())
    }
}

impl Serialize for Blueprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for name in &self.meta.fields {
            if let Some(value) = self.values.get(name) {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprints::field::Field;

    fn sword() -> Blueprint {
        let class = BlueprintClass::builder("ShortSword")
            .field("damage", 4)
            .field("material", "iron")
            .generator("describe", |bp| {
                Ok(Value::Str(format!("{} ({})", bp.name(), bp.lookup("damage")?)))
            })
            .build();
        class.instantiate_with_seed(1).unwrap()
    }

    #[test]
    fn test_name_falls_back_to_label() {
        let bp = sword();
        assert_eq!(bp.name(), "Short Sword");
        assert_eq!(bp.lookup("name").unwrap(), Value::from("Short Sword"));
    }

    #[test]
    fn test_lookup_paths() {
        let bp = sword();
        assert_eq!(bp.lookup("damage").unwrap(), Value::Int(4));
        assert_eq!(bp.lookup("self.material").unwrap(), Value::from("iron"));
        assert_eq!(bp.lookup("meta.seed").unwrap(), Value::Int(1));
        assert!(matches!(
            bp.lookup("weight"),
            Err(ResolveError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_nested_lookup() {
        let blade = BlueprintClass::builder("Blade").field("edge", 3).build();
        let hilt = BlueprintClass::builder("Hilt")
            .field("blade", Field::nested(&blade))
            .build();
        let bp = hilt.instantiate_with_seed(2).unwrap();
        assert_eq!(bp.lookup("blade.edge").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_generator_is_not_a_field() {
        let bp = sword();
        assert!(!bp.fields().iter().any(|f| f == "describe"));
        assert_eq!(
            bp.call_generator("describe").unwrap(),
            Value::from("Short Sword (4)")
        );
        assert!(bp.call_generator("missing").is_err());
    }

    #[test]
    fn test_set_extends_field_set() {
        let mut bp = sword();
        bp.set("damage", 9);
        bp.set("enchanted", true);
        assert_eq!(bp.get("damage"), Some(&Value::Int(9)));
        assert_eq!(bp.fields().last().map(String::as_str), Some("enchanted"));
    }

    #[test]
    fn test_serializes_in_field_order() {
        let json = serde_json::to_string(&sword()).unwrap();
        assert_eq!(json, r#"{"damage":4,"material":"iron"}"#);
    }
}
