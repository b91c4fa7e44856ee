//! Declarative blueprints and the mastering engine.
//!
//! A [`BlueprintClass`] declares attributes that are either static values or
//! deferred [`Field`]s. Mastering a class resolves every field, in dependency
//! order and from a seeded private random source, into a concrete
//! [`Blueprint`]. Classes register in a per-family tag repository so fields
//! and callers can query them by tag.

pub mod class;
pub mod collection;
pub mod dice;
pub mod factory;
pub mod field;
pub mod instance;
pub mod markov;
pub mod master;
pub mod meta;
pub mod mods;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod template;
pub mod value;

pub use class::{BlueprintClass, ClassBuilder};
pub use collection::BlueprintCollection;
pub use dice::{DiceError, DiceExpr, DiceTable};
pub use factory::Factory;
pub use field::{Callable, Field, FieldKind};
pub use instance::Blueprint;
pub use markov::MarkovChain;
pub use master::{Master, MasterContext};
pub use meta::Meta;
pub use mods::{apply_mod, ModSpec};
pub use registry::{ClassLibrary, SchemaError};
pub use resolve::{resolve, Resolution, Resolvable, ResolveError};
pub use template::{Template, TemplateError};
pub use value::{BinOp, Value};
