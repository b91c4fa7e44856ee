//! Blueprint class registration.
//!
//! A class is declared once through [`ClassBuilder`]. Building it computes the
//! ordered field set (own fields first, then inherited ones), derives tags from
//! the class name, joins the family tag repository of its first base (or
//! roots a new family) and, unless abstract, registers itself there under
//! every tag.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use super::field::Field;
use super::instance::Blueprint;
use super::master::Master;
use super::resolve::ResolveError;
use super::value::Value;
use crate::core::types::{ObjectId, Seed};
use crate::tags::{resolve_tags, TagCell, TagRepository, Tagged};

/// A non-field method callable on mastered instances
pub type Generator = Arc<dyn Fn(&Blueprint) -> Result<Value, ResolveError> + Send + Sync>;

struct ClassInner {
    id: ObjectId,
    name: String,
    label: String,
    bases: Vec<BlueprintClass>,
    field_names: Vec<String>,
    attrs: AHashMap<String, Field>,
    generators: AHashMap<String, Generator>,
    is_abstract: bool,
    options: BTreeMap<String, Value>,
    tag_cell: TagCell,
    repo: TagRepository<BlueprintClass>,
}

/// A registered blueprint class. Cloning yields another handle to the same class.
///
/// A concrete class and its family repository refer to each other, so neither
/// is ever freed; classes live for the whole process.
#[derive(Clone)]
pub struct BlueprintClass {
    inner: Arc<ClassInner>,
}

/// Split a CamelCase name into its capitalized segments.
///
/// A segment is an uppercase letter followed by one or more non-uppercase
/// characters, so `CaveMan` gives `Cave` and `Man` while runs of capitals
/// such as `DOOM` contribute nothing.
pub fn camel_segments(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_uppercase() {
            let mut j = i + 1;
            while j < chars.len() && !chars[j].is_uppercase() {
                j += 1;
            }
            if j > i + 1 {
                segments.push(chars[i..j].iter().collect());
                i = j;
                continue;
            }
        }
        i += 1;
    }
    segments
}

pub struct ClassBuilder {
    name: String,
    bases: Vec<BlueprintClass>,
    tags: Vec<String>,
    fields: Vec<(String, Field)>,
    generators: Vec<(String, Generator)>,
    is_abstract: bool,
    options: BTreeMap<String, Value>,
    family: Option<TagRepository<BlueprintClass>>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bases: Vec::new(),
            tags: Vec::new(),
            fields: Vec::new(),
            generators: Vec::new(),
            is_abstract: false,
            options: BTreeMap::new(),
            family: None,
        }
    }

    pub fn extends(mut self, base: &BlueprintClass) -> Self {
        self.bases.push(base.clone());
        self
    }

    /// Space-separated explicit tags
    pub fn tags(mut self, tags: &str) -> Self {
        self.tags.push(tags.to_string());
        self
    }

    /// Declare an attribute. Names starting with `_` are private and ignored.
    pub fn field(mut self, name: &str, field: impl Into<Field>) -> Self {
        let field = field.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name.to_string(), field)),
        }
        self
    }

    /// A method kept callable on mastered instances rather than resolved
    pub fn generator<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Blueprint) -> Result<Value, ResolveError> + Send + Sync + 'static,
    {
        self.generators.push((name.to_string(), Arc::new(f)));
        self
    }

    /// Exclude the class from its family repository
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// A meta option, readable by templates as `{meta.<key>}`
    pub fn option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// Root the family in an existing repository instead of a new one.
    /// Ignored when the class has bases, which always share their family's.
    pub fn family(mut self, repo: &TagRepository<BlueprintClass>) -> Self {
        self.family = Some(repo.clone());
        self
    }

    pub fn build(self) -> BlueprintClass {
        let segments = camel_segments(&self.name);
        let label = segments.join(" ");

        let mut field_names: Vec<String> = Vec::new();
        let mut attrs: AHashMap<String, Field> = AHashMap::new();
        for (name, field) in self.fields {
            if name.starts_with('_') {
                continue;
            }
            field_names.push(name.clone());
            attrs.insert(name, field);
        }
        let declares_name = attrs.contains_key("name");
        for base in &self.bases {
            for name in base.field_names() {
                if attrs.contains_key(name) {
                    continue;
                }
                if let Some(field) = base.attr(name) {
                    field_names.push(name.clone());
                    attrs.insert(name.clone(), field.clone());
                }
            }
        }
        // An inherited `name` gives way to this class's own label
        if !declares_name && attrs.contains_key("name") {
            attrs.insert("name".to_string(), Field::value(label.clone()));
        }

        let mut generators: AHashMap<String, Generator> = AHashMap::new();
        for base in self.bases.iter().rev() {
            for (name, g) in &base.inner.generators {
                generators.insert(name.clone(), Arc::clone(g));
            }
        }
        generators.extend(self.generators);

        let mut options = BTreeMap::new();
        for base in self.bases.iter().rev() {
            options.extend(base.inner.options.clone());
        }
        options.extend(self.options);

        let mut tags: BTreeSet<String> = resolve_tags(&self.tags);
        tags.insert(self.name.clone());
        tags.extend(segments.iter().map(|s| s.to_lowercase()));
        for base in &self.bases {
            tags.extend(base.tags());
        }

        let repo = match self.bases.first() {
            Some(base) => base.tag_repo().clone(),
            None => self.family.unwrap_or_default(),
        };

        let class = BlueprintClass {
            inner: Arc::new(ClassInner {
                id: ObjectId::next(),
                name: self.name,
                label,
                bases: self.bases,
                field_names,
                attrs,
                generators,
                is_abstract: self.is_abstract,
                options,
                tag_cell: TagCell::new(tags),
                repo,
            }),
        };

        if !class.is_abstract() {
            class.inner.repo.add_object(&class);
        }
        debug!(
            "Registered blueprint class {} (abstract: {}, tags: {:?})",
            class.name(),
            class.is_abstract(),
            class.tags()
        );
        class
    }
}

impl BlueprintClass {
    pub fn builder(name: &str) -> ClassBuilder {
        ClassBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Human-readable name derived from the class name, e.g. `Cave Man`
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn bases(&self) -> &[BlueprintClass] {
        &self.inner.bases
    }

    /// Declared field names in resolution order
    pub fn field_names(&self) -> &[String] {
        &self.inner.field_names
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.inner.attrs.contains_key(name)
    }

    pub fn attr(&self, name: &str) -> Option<&Field> {
        self.inner.attrs.get(name)
    }

    pub fn generator(&self, name: &str) -> Option<&Generator> {
        self.inner.generators.get(name)
    }

    pub fn generator_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.generators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_abstract(&self) -> bool {
        self.inner.is_abstract
    }

    pub fn options(&self) -> &BTreeMap<String, Value> {
        &self.inner.options
    }

    /// The repository shared by every class descending from the same root
    pub fn tag_repo(&self) -> &TagRepository<BlueprintClass> {
        &self.inner.repo
    }

    /// Tag the class through its family repository. Abstract classes are not
    /// indexed, so only their own tag set changes.
    pub fn add_tag<S: AsRef<str>>(&self, tags: &[S]) {
        if self.is_abstract() {
            self.inner.tag_cell.insert_tags(resolve_tags(tags));
        } else {
            self.tag_repo().tag_object(self, tags);
        }
    }

    pub fn remove_tag<S: AsRef<str>>(&self, tags: &[S]) {
        if self.is_abstract() {
            self.inner.tag_cell.remove_tags(&resolve_tags(tags));
        } else {
            self.tag_repo().untag_object(self, tags);
        }
    }

    /// True for the class itself and every class deriving from it
    pub fn is_subclass_of(&self, other: &BlueprintClass) -> bool {
        self == other || self.bases().iter().any(|b| b.is_subclass_of(other))
    }

    /// Start configuring a mastering of this class
    pub fn master(&self) -> Master {
        Master::new(self)
    }

    /// Master with a fresh seed and no parent
    pub fn instantiate(&self) -> Result<Blueprint, ResolveError> {
        Master::new(self).run()
    }

    pub fn instantiate_with_seed(&self, seed: impl Into<Seed>) -> Result<Blueprint, ResolveError> {
        Master::new(self).seed(seed).run()
    }
}

impl Tagged for BlueprintClass {
    fn object_id(&self) -> ObjectId {
        self.inner.id
    }

    fn tag_cell(&self) -> &TagCell {
        &self.inner.tag_cell
    }
}

impl PartialEq for BlueprintClass {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for BlueprintClass {}

impl std::hash::Hash for BlueprintClass {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for BlueprintClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueprintClass")
            .field("name", &self.inner.name)
            .field("fields", &self.inner.field_names)
            .field("abstract", &self.inner.is_abstract)
            .finish()
    }
}

impl fmt::Display for BlueprintClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<{}:", self.inner.name)?;
        let mut names: Vec<&String> = self.inner.field_names.iter().collect();
        names.sort();
        for name in names {
            if let Some(field) = self.attr(name) {
                writeln!(f, "    {} -- {}", name, field)?;
            }
        }
        write!(f, "    >")
    }
}
