//! Fields: deferred computations attached to blueprint attributes.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::sync::Arc;

use rand::Rng;

use super::class::BlueprintClass;
use super::dice::{DiceError, DiceExpr, DiceTable};
use super::markov::MarkovChain;
use super::master::MasterContext;
use super::resolve::{resolve, Resolution, Resolvable, ResolveError};
use super::template::{Template, TemplateError};
use super::value::{BinOp, Value};
use crate::tags::{Selector, TagQuery, TagRepository};

pub type ThunkFn = dyn Fn() -> Result<Resolution, ResolveError> + Send + Sync;
pub type ContextFn = dyn Fn(&mut MasterContext<'_>) -> Result<Resolution, ResolveError> + Send + Sync;
pub type SeededFn =
    dyn Fn(&mut MasterContext<'_>, f64) -> Result<Resolution, ResolveError> + Send + Sync;

fn thunk_fn<F>(f: F) -> Arc<ThunkFn>
where
    F: Fn() -> Result<Resolution, ResolveError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn context_fn<F>(f: F) -> Arc<ContextFn>
where
    F: Fn(&mut MasterContext<'_>) -> Result<Resolution, ResolveError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn seeded_fn<F>(f: F) -> Arc<SeededFn>
where
    F: Fn(&mut MasterContext<'_>, f64) -> Result<Resolution, ResolveError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A closure field, in one of the three supported shapes
#[derive(Clone)]
pub enum Callable {
    /// Takes nothing
    Thunk(Arc<ThunkFn>),
    /// Takes the blueprint being mastered
    Context(Arc<ContextFn>),
    /// Takes the blueprint being mastered and a fresh float drawn from its generator
    Seeded(Arc<SeededFn>),
}

#[derive(Clone)]
pub enum FieldKind {
    Const(Value),
    /// Uniform integer in `start..=end`
    RandomInt { start: i64, end: i64 },
    Dice(Arc<DiceExpr>),
    DiceTable(Arc<DiceTable>),
    PickOne(Vec<Field>),
    PickFrom(Box<Field>),
    All(Vec<Field>),
    Template(Arc<Template>),
    /// Left fold of the resolved items with `op`
    Op { op: BinOp, items: Vec<Field> },
    /// Concrete classes matching the selector, in `repo` or the family repository
    WithTags {
        selector: Selector,
        repo: Option<TagRepository<BlueprintClass>>,
    },
    Markov(Arc<MarkovChain>),
    Nested(BlueprintClass),
    Computed(Callable),
    Custom(Arc<dyn Resolvable>),
}

/// A resolvable attribute with its ordering annotations.
#[derive(Clone)]
pub struct Field {
    kind: FieldKind,
    depends_on: BTreeSet<String>,
    defer_to_end: bool,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        let defer_to_end = matches!(kind, FieldKind::Template(_));
        Self {
            kind,
            depends_on: BTreeSet::new(),
            defer_to_end,
        }
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::new(FieldKind::Const(value.into()))
    }

    pub fn random_int(start: i64, end: i64) -> Self {
        Self::new(FieldKind::RandomInt { start, end })
    }

    pub fn dice(expr: &str) -> Result<Self, DiceError> {
        Ok(Self::new(FieldKind::Dice(Arc::new(DiceExpr::parse(expr)?))))
    }

    pub fn dice_table<K, I>(expr: &str, table: I, default: Option<Field>) -> Result<Self, DiceError>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Field)>,
    {
        let table = DiceTable::new(expr, table, default)?;
        Ok(Self::new(FieldKind::DiceTable(Arc::new(table))))
    }

    pub fn pick_one<I, F>(choices: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Self::new(FieldKind::PickOne(choices.into_iter().map(Into::into).collect()))
    }

    pub fn pick_from(collection: impl Into<Field>) -> Self {
        Self::new(FieldKind::PickFrom(Box::new(collection.into())))
    }

    pub fn all<I, F>(items: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Self::new(FieldKind::All(items.into_iter().map(Into::into).collect()))
    }

    pub fn template(text: &str) -> Result<Self, TemplateError> {
        Ok(Self::new(FieldKind::Template(Arc::new(Template::parse(text)?))))
    }

    pub fn op<I, F>(op: BinOp, items: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Self::new(FieldKind::Op {
            op,
            items: items.into_iter().map(Into::into).collect(),
        })
    }

    pub fn floor_div(self, rhs: impl Into<Field>) -> Self {
        Self::op(BinOp::FloorDiv, [self, rhs.into()])
    }

    pub fn rem(self, rhs: impl Into<Field>) -> Self {
        Self::op(BinOp::Mod, [self, rhs.into()])
    }

    /// Classes in the family repository matching a `"tag ?optional !excluded"` expression
    pub fn with_tags(expr: &str) -> Self {
        Self::with_selector(Selector::parse(expr), None)
    }

    pub fn with_selector(selector: Selector, repo: Option<TagRepository<BlueprintClass>>) -> Self {
        Self::new(FieldKind::WithTags { selector, repo })
    }

    pub fn markov(chain: MarkovChain) -> Self {
        Self::new(FieldKind::Markov(Arc::new(chain)))
    }

    pub fn nested(class: &BlueprintClass) -> Self {
        Self::new(FieldKind::Nested(class.clone()))
    }

    /// The value of a sibling field, which becomes a dependency
    pub fn reference(name: &str) -> Self {
        let owned = name.to_string();
        Self::computed(move |ctx| ctx.get(&owned)).depends_on(name)
    }

    pub fn thunk<F, R>(f: F) -> Self
    where
        F: Fn() -> Result<R, ResolveError> + Send + Sync + 'static,
        R: Into<Resolution>,
    {
        Self::new(FieldKind::Computed(Callable::Thunk(thunk_fn(move || {
            f().map(Into::into)
        }))))
    }

    pub fn computed<F, R>(f: F) -> Self
    where
        F: Fn(&mut MasterContext<'_>) -> Result<R, ResolveError> + Send + Sync + 'static,
        R: Into<Resolution>,
    {
        Self::new(FieldKind::Computed(Callable::Context(context_fn(
            move |ctx| f(ctx).map(Into::into),
        ))))
    }

    pub fn seeded<F, R>(f: F) -> Self
    where
        F: Fn(&mut MasterContext<'_>, f64) -> Result<R, ResolveError> + Send + Sync + 'static,
        R: Into<Resolution>,
    {
        Self::new(FieldKind::Computed(Callable::Seeded(seeded_fn(
            move |ctx, seed| f(ctx, seed).map(Into::into),
        ))))
    }

    pub fn custom(resolvable: impl Resolvable + 'static) -> Self {
        Self::new(FieldKind::Custom(Arc::new(resolvable)))
    }

    /// Declare sibling fields (whitespace separated) that must resolve first
    pub fn depends_on(mut self, names: &str) -> Self {
        self.depends_on
            .extend(names.split_whitespace().map(str::to_string));
        self
    }

    /// Resolve only after every field that is not deferred
    pub fn defer_to_end(mut self) -> Self {
        self.defer_to_end = true;
        self
    }

    /// Resolve in the ordinary passes even if the kind defers by default
    pub fn resolve_early(mut self) -> Self {
        self.defer_to_end = false;
        self
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    pub fn is_deferred_to_end(&self) -> bool {
        self.defer_to_end
    }

    /// Static values need no evaluation and no ordering
    pub fn is_static(&self) -> bool {
        matches!(&self.kind, FieldKind::Const(v) if !matches!(v, Value::Class(_)))
    }

    /// Declared dependencies, sibling names a template reads, and the
    /// dependencies of any fields nested inside this one
    pub fn implied_dependencies(&self) -> BTreeSet<String> {
        let mut deps = self.depends_on.clone();
        let nested: Vec<&Field> = match &self.kind {
            FieldKind::Template(t) => {
                deps.extend(t.field_refs());
                Vec::new()
            }
            FieldKind::PickOne(items) | FieldKind::All(items) => items.iter().collect(),
            FieldKind::Op { items, .. } => items.iter().collect(),
            FieldKind::PickFrom(inner) => vec![inner.as_ref()],
            FieldKind::DiceTable(table) => table.fields().collect(),
            _ => Vec::new(),
        };
        for field in nested {
            deps.extend(field.implied_dependencies());
        }
        deps
    }
}

impl FieldKind {
    /// Evaluate once. The result may be another field to evaluate in turn.
    pub fn evaluate(&self, ctx: &mut MasterContext<'_>) -> Result<Resolution, ResolveError> {
        match self {
            FieldKind::Const(v) => Ok(Resolution::Value(v.clone())),
            FieldKind::RandomInt { start, end } => {
                if start > end {
                    return Err(ResolveError::EmptyChoice(format!("{}...{}", start, end)));
                }
                Ok(Value::Int(ctx.rng().gen_range(*start..=*end)).into())
            }
            FieldKind::Dice(expr) => Ok(expr.roll(ctx.rng())?.into()),
            FieldKind::DiceTable(table) => {
                let rolled = table.dice().roll(ctx.rng())?;
                Ok(match table.lookup(&rolled) {
                    Some(entry) => Resolution::Field(entry.clone()),
                    None => Resolution::Value(Value::None),
                })
            }
            FieldKind::PickOne(choices) => {
                if choices.is_empty() {
                    return Err(ResolveError::EmptyChoice("pick_one".to_string()));
                }
                let idx = ctx.rng().gen_range(0..choices.len());
                Ok(Resolution::Field(choices[idx].clone()))
            }
            FieldKind::PickFrom(collection) => {
                let resolved = resolve(ctx, collection)?;
                let items = resolved.elements().ok_or_else(|| {
                    ResolveError::TypeMismatch(format!(
                        "cannot pick from {}",
                        resolved.type_name()
                    ))
                })?;
                if items.is_empty() {
                    return Err(ResolveError::EmptyChoice("pick_from".to_string()));
                }
                let idx = ctx.rng().gen_range(0..items.len());
                Ok(Resolution::Value(items[idx].clone()))
            }
            FieldKind::All(items) => Ok(Resolution::Sequence(items.clone())),
            FieldKind::Template(template) => {
                let text = template.render(|path| ctx.lookup(path))?;
                Ok(Value::Str(text).into())
            }
            FieldKind::Op { op, items } => {
                let mut acc = Value::None;
                for item in items {
                    let v = resolve(ctx, item)?;
                    acc = match acc {
                        Value::None => v,
                        a => a.binary(*op, &v)?,
                    };
                }
                Ok(acc.into())
            }
            FieldKind::WithTags { selector, repo } => {
                let repo = repo.clone().unwrap_or_else(|| ctx.class().tag_repo().clone());
                let classes = repo
                    .query(selector)
                    .into_iter()
                    .filter(|c| !c.is_abstract())
                    .map(Value::Class)
                    .collect();
                Ok(Value::List(classes).into())
            }
            FieldKind::Markov(chain) => Ok(Value::Str(chain.generate(ctx.rng())).into()),
            FieldKind::Nested(class) => Ok(Value::Class(class.clone()).into()),
            FieldKind::Computed(Callable::Thunk(f)) => f(),
            FieldKind::Computed(Callable::Context(f)) => f(ctx),
            FieldKind::Computed(Callable::Seeded(f)) => {
                let seed: f64 = ctx.rng().gen();
                f(ctx, seed)
            }
            FieldKind::Custom(r) => r.resolve(ctx),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Const(v) => write!(f, "{}", v),
            FieldKind::RandomInt { start, end } => write!(f, "{}...{}", start, end),
            FieldKind::Dice(expr) => write!(f, "{}", expr),
            FieldKind::DiceTable(table) => write!(f, "{} table", table.dice()),
            FieldKind::PickOne(choices) => {
                let parts: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
                write!(f, "one of ({})", parts.join(", "))
            }
            FieldKind::PickFrom(collection) => write!(f, "pick from {}", collection),
            FieldKind::All(items) => {
                let parts: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                write!(f, "all ({})", parts.join(", "))
            }
            FieldKind::Template(t) => write!(f, "{:?}", t.source()),
            FieldKind::Op { op, items } => {
                let parts: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(&format!(" {} ", op)))
            }
            FieldKind::WithTags { selector, .. } => write!(f, "with tags {}", selector),
            FieldKind::Markov(chain) => write!(f, "markov chain of {}", chain.chain_len()),
            FieldKind::Nested(class) => write!(f, "nested {}", class.name()),
            FieldKind::Computed(_) => write!(f, "<computed>"),
            FieldKind::Custom(r) => write!(f, "<{}>", r.describe()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("kind", &self.kind.to_string())
            .field("depends_on", &self.depends_on)
            .field("defer_to_end", &self.defer_to_end)
            .finish()
    }
}

macro_rules! field_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Field {
                fn from(v: $ty) -> Self {
                    Field::value(v)
                }
            }
        )*
    };
}

field_from!(Value, bool, i64, i32, u32, f64, String, &str, Vec<Value>);

impl From<BlueprintClass> for Field {
    fn from(class: BlueprintClass) -> Self {
        Field::new(FieldKind::Nested(class))
    }
}

impl From<&BlueprintClass> for Field {
    fn from(class: &BlueprintClass) -> Self {
        Field::nested(class)
    }
}

impl From<MarkovChain> for Field {
    fn from(chain: MarkovChain) -> Self {
        Field::markov(chain)
    }
}

macro_rules! field_operator {
    ($($trait:ident $method:ident $op:ident),* $(,)?) => {
        $(
            impl<T: Into<Field>> $trait<T> for Field {
                type Output = Field;

                fn $method(self, rhs: T) -> Field {
                    Field::op(BinOp::$op, [self, rhs.into()])
                }
            }

            impl $trait<Field> for i64 {
                type Output = Field;

                fn $method(self, rhs: Field) -> Field {
                    Field::op(BinOp::$op, [Field::from(self), rhs])
                }
            }

            impl $trait<Field> for f64 {
                type Output = Field;

                fn $method(self, rhs: Field) -> Field {
                    Field::op(BinOp::$op, [Field::from(self), rhs])
                }
            }
        )*
    };
}

field_operator! {
    Add add Add,
    Sub sub Sub,
    Mul mul Mul,
    Div div Div,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_defer_by_default() {
        let t = Field::template("{a}").unwrap();
        assert!(t.is_deferred_to_end());
        assert!(!t.clone().resolve_early().is_deferred_to_end());
        assert!(!Field::random_int(1, 2).is_deferred_to_end());
        assert!(Field::random_int(1, 2).defer_to_end().is_deferred_to_end());
    }

    #[test]
    fn test_depends_on_splits_names() {
        let f = Field::value(1).depends_on("a b").depends_on("c");
        let deps: Vec<&str> = f.dependencies().iter().map(String::as_str).collect();
        assert_eq!(deps, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reference_depends_on_target() {
        let f = Field::reference("value");
        assert!(f.dependencies().contains("value"));
    }

    #[test]
    fn test_operator_overloading_builds_op_fields() {
        let f = Field::random_int(1, 6) * 2 + 1;
        match f.kind() {
            FieldKind::Op { op, items } => {
                assert_eq!(*op, BinOp::Add);
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0].kind(), FieldKind::Op { op: BinOp::Mul, .. }));
            }
            _ => panic!("expected an operator field"),
        }
        assert_eq!(f.to_string(), "((1...6 * 2) + 1)");

        let g = 10i64 - Field::random_int(1, 2);
        assert_eq!(g.to_string(), "(10 - 1...2)");
    }

    #[test]
    fn test_static_detection() {
        assert!(Field::value(3).is_static());
        assert!(!Field::random_int(1, 3).is_static());
    }

    #[test]
    fn test_template_implied_dependencies() {
        let f = Field::template("{a} of {meta.source.name}").unwrap().depends_on("b");
        let deps: Vec<String> = f.implied_dependencies().into_iter().collect();
        assert_eq!(deps, vec!["a".to_string(), "b".to_string()]);
    }

    struct Always(i64);

    impl Resolvable for Always {
        fn resolve(&self, _ctx: &mut MasterContext<'_>) -> Result<Resolution, ResolveError> {
            Ok(Value::Int(self.0).into())
        }

        fn describe(&self) -> String {
            format!("always {}", self.0)
        }
    }

    #[test]
    fn test_callable_shapes_and_custom_fields() {
        let class = BlueprintClass::builder("Shapes")
            .field("thunk", Field::thunk(|| Ok(Value::from("plain"))))
            .field("seeded", Field::seeded(|_ctx, x| Ok(Value::Bool((0.0..1.0).contains(&x)))))
            .field("custom", Field::custom(Always(7)))
            .field("chained", Field::thunk(|| Ok(Field::random_int(3, 3))))
            .build();
        let bp = class.instantiate_with_seed(5).unwrap();
        assert_eq!(bp.get("thunk"), Some(&Value::from("plain")));
        assert_eq!(bp.get("seeded"), Some(&Value::Bool(true)));
        assert_eq!(bp.get("custom"), Some(&Value::Int(7)));
        assert_eq!(bp.get("chained"), Some(&Value::Int(3)));
        assert_eq!(Field::custom(Always(1)).to_string(), "<always 1>");
    }

    #[test]
    fn test_runaway_chain_hits_limit() {
        fn forever() -> Field {
            Field::thunk(|| Ok(forever()))
        }
        let class = BlueprintClass::builder("Runaway").field("x", forever()).build();
        assert_eq!(
            class.instantiate().unwrap_err(),
            ResolveError::ResolutionLimit(64)
        );
    }

    #[test]
    fn test_pick_from_empty_collection_fails() {
        let class = BlueprintClass::builder("Nothing")
            .field("x", Field::pick_from(Value::List(Vec::new())))
            .build();
        assert_eq!(
            class.instantiate().unwrap_err(),
            ResolveError::EmptyChoice("pick_from".into())
        );
    }

    #[test]
    fn test_nested_op_dependencies_propagate() {
        let f = Field::reference("a") + Field::pick_one([Field::reference("b"), Field::value(1)]);
        let deps: Vec<String> = f.implied_dependencies().into_iter().collect();
        assert_eq!(deps, vec!["a".to_string(), "b".to_string()]);
    }
}
