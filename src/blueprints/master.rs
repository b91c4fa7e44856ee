//! The mastering engine: turning a class into a concrete instance.
//!
//! Fields resolve in three phases. The first walks declaration order,
//! resolving every field whose dependencies are met and queueing the rest.
//! The second drains the queue to a fixed point. The third resolves the
//! end-deferred fields, last declared first, with the same fixed point. A pass
//! over the whole queue that makes no progress is a dependency cycle.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

use super::class::BlueprintClass;
use super::field::{Field, FieldKind};
use super::instance::Blueprint;
use super::meta::{descend, Meta};
use super::resolve::{resolve, ResolveError};
use super::value::Value;
use crate::core::config::ForgeConfig;
use crate::core::types::Seed;

/// Configures and runs one mastering of a class
pub struct Master {
    class: BlueprintClass,
    parent: Option<Arc<Blueprint>>,
    source: Option<Arc<Blueprint>>,
    seed: Option<Seed>,
    overrides: Vec<(String, Field)>,
    config: ForgeConfig,
    depth: usize,
}

impl Master {
    pub fn new(class: &BlueprintClass) -> Self {
        Self {
            class: class.clone(),
            parent: None,
            source: None,
            seed: None,
            overrides: Vec::new(),
            config: ForgeConfig::default(),
            depth: 0,
        }
    }

    /// Nest under `parent`; its seed is inherited unless one is given
    pub fn parent(mut self, parent: impl Into<Arc<Blueprint>>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn source(mut self, source: impl Into<Arc<Blueprint>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn seed(mut self, seed: impl Into<Seed>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn maybe_seed(mut self, seed: Option<Seed>) -> Self {
        self.seed = seed;
        self
    }

    /// Override a field. Static values apply before any resolution.
    pub fn set(mut self, name: &str, field: impl Into<Field>) -> Self {
        let field = field.into();
        match self.overrides.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = field,
            None => self.overrides.push((name.to_string(), field)),
        }
        self
    }

    pub fn config(mut self, config: &ForgeConfig) -> Self {
        self.config = config.clone();
        self
    }

    fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn run(self) -> Result<Blueprint, ResolveError> {
        let Master {
            class,
            parent,
            source,
            seed,
            overrides,
            config,
            depth,
        } = self;

        let seed = seed
            .or_else(|| parent.as_ref().map(|p| p.meta().seed.clone()))
            .unwrap_or_else(Seed::fresh);
        debug!("Mastering {} with seed {}", class.name(), seed);

        let mut meta = Meta::for_class(&class, seed);
        meta.parent = parent;
        meta.source = source;
        meta.mastered = true;
        for (name, field) in overrides {
            if !meta.fields.contains(&name) {
                meta.fields.push(name.clone());
            }
            meta.kwargs.insert(name, field);
        }

        let plan = Plan::build(&class, &meta)?;
        let mut ctx = MasterContext {
            class: &class,
            meta,
            values: BTreeMap::new(),
            config: &config,
            depth,
        };
        plan.execute(&mut ctx)?;

        let MasterContext { meta, values, .. } = ctx;
        debug!("Mastered {} ({} fields)", class.name(), values.len());
        Ok(Blueprint::from_parts(class, meta, values))
    }
}

/// The state visible to fields while an instance is being mastered
pub struct MasterContext<'a> {
    class: &'a BlueprintClass,
    meta: Meta,
    values: BTreeMap<String, Value>,
    config: &'a ForgeConfig,
    depth: usize,
}

impl<'a> MasterContext<'a> {
    pub fn class(&self) -> &BlueprintClass {
        self.class
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn config(&self) -> &ForgeConfig {
        self.config
    }

    /// Nesting depth; zero for a top-level blueprint
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The instance's private random source
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        self.meta.rng_mut()
    }

    /// Value of an already resolved sibling field
    pub fn get(&self, name: &str) -> Result<Value, ResolveError> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        if self.meta.fields.iter().any(|f| f == name) {
            return Err(ResolveError::UnresolvedField(name.to_string()));
        }
        if name == "name" {
            return Ok(Value::Str(self.class.label().to_string()));
        }
        Err(ResolveError::UnknownAttribute(name.to_string()))
    }

    /// Read a dotted path, as in templates
    pub fn lookup(&self, path: &str) -> Result<Value, ResolveError> {
        let path = path.strip_prefix("self.").unwrap_or(path);
        match path.split_once('.') {
            Some(("meta", rest)) => self.meta.lookup(rest),
            Some((head, rest)) => descend(&self.get(head)?, rest),
            None => self.get(path),
        }
    }

    /// A field of the blueprint this one derives from
    pub fn source_value(&self, name: &str) -> Result<Value, ResolveError> {
        match &self.meta.source {
            Some(source) => source.lookup(name),
            None => Err(ResolveError::NoSource("source".to_string())),
        }
    }

    /// A field of the enclosing blueprint
    pub fn parent_value(&self, name: &str) -> Result<Value, ResolveError> {
        match &self.meta.parent {
            Some(parent) => parent.lookup(name),
            None => Err(ResolveError::NoSource("parent".to_string())),
        }
    }

    /// Master `class` nested inside the instance being built.
    ///
    /// Without an explicit seed the child's seed is drawn from this instance's
    /// generator, so siblings differ yet the whole tree stays reproducible.
    pub fn master_child(
        &mut self,
        class: &BlueprintClass,
        seed: Option<Seed>,
    ) -> Result<Blueprint, ResolveError> {
        let depth = self.depth + 1;
        if depth > self.config.max_nesting_depth {
            return Err(ResolveError::NestingLimit(self.config.max_nesting_depth));
        }
        let seed = match seed {
            Some(seed) => seed,
            None => Seed::Int(self.rng().gen()),
        };
        let snapshot = Blueprint::from_parts(
            self.class.clone(),
            self.meta.clone(),
            self.values.clone(),
        );
        Master::new(class)
            .parent(snapshot)
            .seed(seed)
            .config(self.config)
            .depth(depth)
            .run()
    }

    fn is_resolved(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

struct Step {
    name: String,
    field: Field,
    deps: BTreeSet<String>,
}

/// Resolution order for one mastering
struct Plan {
    ordered: Vec<Step>,
    end: Vec<Step>,
}

impl Plan {
    fn build(class: &BlueprintClass, meta: &Meta) -> Result<Self, ResolveError> {
        let names: BTreeSet<&str> = meta.fields.iter().map(String::as_str).collect();
        let mut steps = Vec::with_capacity(meta.fields.len());
        for name in &meta.fields {
            let field = match meta.kwargs.get(name).or_else(|| class.attr(name)) {
                Some(field) => field.clone(),
                None => continue,
            };
            let deps = field.implied_dependencies();
            if let Some(missing) = deps
                .iter()
                .find(|d| !names.contains(d.as_str()) && d.as_str() != "name")
            {
                return Err(ResolveError::MissingDependency {
                    field: name.clone(),
                    dependency: missing.clone(),
                });
            }
            steps.push(Step {
                name: name.clone(),
                field,
                deps,
            });
        }

        let mut end_names: BTreeSet<String> = steps
            .iter()
            .filter(|s| s.field.is_deferred_to_end())
            .map(|s| s.name.clone())
            .collect();
        loop {
            let promoted: Vec<String> = steps
                .iter()
                .filter(|s| !end_names.contains(&s.name))
                .filter(|s| s.deps.iter().any(|d| end_names.contains(d)))
                .map(|s| s.name.clone())
                .collect();
            if promoted.is_empty() {
                break;
            }
            for name in promoted {
                warn!(
                    "Field `{}` of {} depends on an end-deferred field; resolving it at the end",
                    name,
                    class.name()
                );
                end_names.insert(name);
            }
        }

        let (end, ordered): (Vec<Step>, Vec<Step>) = steps
            .into_iter()
            .partition(|s| end_names.contains(&s.name));
        Ok(Self { ordered, end })
    }

    fn execute(self, ctx: &mut MasterContext<'_>) -> Result<(), ResolveError> {
        let mut queue = VecDeque::new();
        for step in self.ordered {
            if step.field.is_static() {
                if let Some(value) = static_value(&step.field) {
                    trace!("{}: static", step.name);
                    ctx.values.insert(step.name, value);
                }
            } else if has_unmet(ctx, &step) {
                trace!("{}: deferred until {:?}", step.name, step.deps);
                queue.push_front(step);
            } else {
                resolve_step(ctx, step)?;
            }
        }
        drain(ctx, queue)?;

        // pop_back takes the last declared end field first
        drain(ctx, self.end.into_iter().collect())
    }
}

fn static_value(field: &Field) -> Option<Value> {
    match field.kind() {
        FieldKind::Const(value) => Some(value.clone()),
        _ => None,
    }
}

fn has_unmet(ctx: &MasterContext<'_>, step: &Step) -> bool {
    step.deps
        .iter()
        .any(|d| !ctx.is_resolved(d) && ctx.meta.fields.contains(d))
}

fn resolve_step(ctx: &mut MasterContext<'_>, step: Step) -> Result<(), ResolveError> {
    let value = resolve(ctx, &step.field)?;
    trace!("{} = {}", step.name, value);
    ctx.values.insert(step.name, value);
    Ok(())
}

/// Fixed point over the queue; a full rotation without progress is a cycle
fn drain(ctx: &mut MasterContext<'_>, mut queue: VecDeque<Step>) -> Result<(), ResolveError> {
    let mut stalled = 0;
    while let Some(step) = queue.pop_back() {
        if has_unmet(ctx, &step) {
            queue.push_front(step);
            stalled += 1;
            if stalled >= queue.len() {
                let mut fields: Vec<String> = queue.into_iter().map(|s| s.name).collect();
                fields.sort();
                return Err(ResolveError::DependencyCycle { fields });
            }
        } else {
            resolve_step(ctx, step)?;
            stalled = 0;
        }
    }
    Ok(())
}
