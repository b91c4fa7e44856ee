//! Schema types for declaring blueprint classes in TOML.
//!
//! A library file holds any number of `[[blueprint]]` tables:
//!
//! ```toml
//! [[blueprint]]
//! name = "Weapon"
//! extends = ["Item"]
//! tags = "armament"
//!
//! [blueprint.meta]
//! rarity = "common"
//!
//! [blueprint.fields]
//! damage = { random_int = [1, 5] }
//! title = { template = "{name} ({damage})" }
//! ```
//!
//! A field whose value is a table carrying one of the field keys becomes a
//! deferred field; every other value is static.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::class::BlueprintClass;
use super::field::Field;
use super::markov::MarkovChain;
use super::value::{BinOp, Value};
use crate::core::config::ForgeConfig;

/// Keys that turn a table into a field declaration
pub const FIELD_KEYS: &[&str] = &[
    "random_int",
    "dice",
    "dice_table",
    "pick_one",
    "pick_from",
    "with_tags",
    "template",
    "markov",
    "nested",
    "op",
    "all",
    "ref",
];

/// Contents of one library file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryFile {
    #[serde(default, rename = "blueprint")]
    pub blueprints: Vec<ClassDef>,
}

/// One declared class
#[derive(Debug, Clone, Deserialize)]
pub struct ClassDef {
    pub name: String,
    /// Base classes by name, which must already be loaded
    #[serde(default)]
    pub extends: Vec<String>,
    /// Space-separated tags
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Options copied onto every instance's meta
    #[serde(default)]
    pub meta: toml::Table,
    /// Fields in declaration order
    #[serde(default)]
    pub fields: toml::Table,
}

/// Convert a static TOML value
pub fn toml_to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(n) => Value::Int(*n),
        toml::Value::Float(x) => Value::Float(*x),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::Str(d.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_value(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

/// What field conversion needs from its surroundings
pub struct FieldEnv<'a> {
    pub config: &'a ForgeConfig,
    pub classes: &'a dyn Fn(&str) -> Option<BlueprintClass>,
}

impl FieldEnv<'_> {
    /// Convert one declared field. Errors are human-readable reasons.
    pub fn field(&self, value: &toml::Value) -> Result<Field, String> {
        let table = match value {
            toml::Value::Table(t) if FIELD_KEYS.iter().any(|k| t.contains_key(*k)) => t,
            other => return Ok(Field::value(toml_to_value(other))),
        };

        let mut field = self.kind(table)?;
        if let Some(deps) = table.get("depends_on") {
            field = field.depends_on(&string_list(deps, "depends_on")?.join(" "));
        }
        match table.get("defer_to_end") {
            Some(toml::Value::Boolean(true)) => field = field.defer_to_end(),
            Some(toml::Value::Boolean(false)) => field = field.resolve_early(),
            Some(_) => return Err("`defer_to_end` must be a boolean".to_string()),
            None => {}
        }
        Ok(field)
    }

    fn fields(&self, value: &toml::Value, key: &str) -> Result<Vec<Field>, String> {
        match value {
            toml::Value::Array(items) => items.iter().map(|v| self.field(v)).collect(),
            _ => Err(format!("`{}` must be an array", key)),
        }
    }

    fn class(&self, name: &str) -> Result<BlueprintClass, String> {
        (self.classes)(name).ok_or_else(|| format!("unknown class `{}`", name))
    }

    fn kind(&self, table: &toml::Table) -> Result<Field, String> {
        if let Some(v) = table.get("random_int") {
            let bounds = v
                .as_array()
                .filter(|a| a.len() == 2)
                .and_then(|a| Some((a[0].as_integer()?, a[1].as_integer()?)))
                .ok_or("`random_int` must be [start, end]")?;
            return Ok(Field::random_int(bounds.0, bounds.1));
        }
        if let Some(v) = table.get("dice") {
            return Field::dice(str_of(v, "dice")?).map_err(|e| e.to_string());
        }
        if let Some(v) = table.get("dice_table") {
            let entries = match table.get("table") {
                Some(toml::Value::Table(t)) => t
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.field(v)?)))
                    .collect::<Result<Vec<_>, String>>()?,
                _ => return Err("`dice_table` needs a `table` of entries".to_string()),
            };
            let default = table.get("default").map(|d| self.field(d)).transpose()?;
            return Field::dice_table(str_of(v, "dice_table")?, entries, default)
                .map_err(|e| e.to_string());
        }
        if let Some(v) = table.get("pick_one") {
            return Ok(Field::pick_one(self.fields(v, "pick_one")?));
        }
        if let Some(v) = table.get("pick_from") {
            return Ok(Field::pick_from(self.field(v)?));
        }
        if let Some(v) = table.get("all") {
            return Ok(Field::all(self.fields(v, "all")?));
        }
        if let Some(v) = table.get("with_tags") {
            return Ok(Field::with_tags(str_of(v, "with_tags")?));
        }
        if let Some(v) = table.get("template") {
            return Field::template(str_of(v, "template")?).map_err(|e| e.to_string());
        }
        if let Some(v) = table.get("markov") {
            let words = string_list(v, "markov")?;
            let chain_len = usize_of(table.get("chain_len"), self.config.markov_chain_len)?;
            let max_length = usize_of(table.get("max_length"), self.config.markov_max_length)?;
            let chain = MarkovChain::new(words, chain_len, max_length).map_err(|e| e.to_string())?;
            return Ok(Field::markov(chain));
        }
        if let Some(v) = table.get("nested") {
            return Ok(Field::nested(&self.class(str_of(v, "nested")?)?));
        }
        if let Some(v) = table.get("op") {
            let symbol = str_of(v, "op")?;
            let op = BinOp::from_symbol(symbol).ok_or_else(|| format!("unknown operator `{}`", symbol))?;
            let items = table
                .get("items")
                .ok_or("`op` needs `items`")
                .map_err(str::to_string)
                .and_then(|items| self.fields(items, "items"))?;
            return Ok(Field::op(op, items));
        }
        if let Some(v) = table.get("ref") {
            return Ok(Field::reference(str_of(v, "ref")?));
        }
        Err("no field kind".to_string())
    }
}

fn str_of<'v>(value: &'v toml::Value, key: &str) -> Result<&'v str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("`{}` must be a string", key))
}

fn usize_of(value: Option<&toml::Value>, default: usize) -> Result<usize, String> {
    match value {
        None => Ok(default),
        Some(v) => v
            .as_integer()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| "expected a non-negative integer".to_string()),
    }
}

/// A whitespace-separated string or an array of strings
fn string_list(value: &toml::Value, key: &str) -> Result<Vec<String>, String> {
    match value {
        toml::Value::String(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
        toml::Value::Array(items) => items
            .iter()
            .map(|i| str_of(i, key).map(str::to_string))
            .collect(),
        _ => Err(format!("`{}` must be a string or an array of strings", key)),
    }
}
