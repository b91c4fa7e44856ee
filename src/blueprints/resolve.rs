//! The resolution protocol: driving a field to a concrete value.

use thiserror::Error;

use super::dice::DiceError;
use super::field::Field;
use super::master::MasterContext;
use super::template::TemplateError;
use super::value::Value;
use crate::tags::TagError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Field `{field}` depends on `{dependency}`, which is not a field")]
    MissingDependency { field: String, dependency: String },

    #[error("Dependency cycle among fields: {}", fields.join(", "))]
    DependencyCycle { fields: Vec<String> },

    #[error("Field `{0}` was read before it was resolved; declare it in depends_on")]
    UnresolvedField(String),

    #[error("Unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow in {0}")]
    Overflow(String),

    #[error("Field kept producing fields after {0} steps")]
    ResolutionLimit(usize),

    #[error("Blueprints nested deeper than {0} levels")]
    NestingLimit(usize),

    #[error("No `{0}` blueprint to read from")]
    NoSource(String),

    #[error("Nothing to choose from in {0}")]
    EmptyChoice(String),

    #[error(transparent)]
    Dice(#[from] DiceError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("{0}")]
    Custom(String),
}

/// What evaluating a field once produces.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A concrete value. A class value is mastered as a nested child.
    Value(Value),
    /// Another field to evaluate in turn
    Field(Field),
    /// Items to resolve eagerly, each in turn, into a list
    Sequence(Vec<Field>),
}

impl From<Value> for Resolution {
    fn from(value: Value) -> Self {
        Resolution::Value(value)
    }
}

impl From<Field> for Resolution {
    fn from(field: Field) -> Self {
        Resolution::Field(field)
    }
}

/// Extension point for user-defined field kinds.
pub trait Resolvable: Send + Sync {
    fn resolve(&self, ctx: &mut MasterContext<'_>) -> Result<Resolution, ResolveError>;

    fn describe(&self) -> String {
        "custom".to_string()
    }
}

/// Drive `field` to a concrete value in the context of the blueprint being
/// mastered.
///
/// A field may produce further fields; these are evaluated in turn, up to the
/// configured step limit. Sequences are materialized element by element and a
/// class value is mastered as a child of the context.
pub fn resolve(ctx: &mut MasterContext<'_>, field: &Field) -> Result<Value, ResolveError> {
    let limit = ctx.config().max_resolution_steps;
    let mut step = field.kind().evaluate(ctx)?;
    for _ in 0..limit {
        step = match step {
            Resolution::Value(Value::Class(class)) => {
                return ctx.master_child(&class, None).map(Value::from);
            }
            Resolution::Value(value) => return Ok(value),
            Resolution::Sequence(items) => {
                return items
                    .iter()
                    .map(|item| resolve(ctx, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List);
            }
            Resolution::Field(next) => next.kind().evaluate(ctx)?,
        };
    }
    Err(ResolveError::ResolutionLimit(limit))
}
