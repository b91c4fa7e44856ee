//! Taggable objects and the shared tag state they carry.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::repository::{TagRepository, WeakTagRepository};
use super::resolve_tags;
use crate::core::types::ObjectId;

/// Mutable tag state of one object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagState {
    pub tags: BTreeSet<String>,
    /// Seconds since the epoch of the last `select` that picked this object
    pub last_picked: f64,
}

/// Interior-mutable tag state shared between an object and the repositories
/// that index it.
#[derive(Debug, Default)]
pub struct TagCell {
    state: RwLock<TagState>,
}

impl TagCell {
    pub fn new(tags: BTreeSet<String>) -> Self {
        Self {
            state: RwLock::new(TagState {
                tags,
                last_picked: 0.0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TagState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TagState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> TagState {
        self.read().clone()
    }

    pub fn tags(&self) -> BTreeSet<String> {
        self.read().tags.clone()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.read().tags.contains(tag)
    }

    pub fn last_picked(&self) -> f64 {
        self.read().last_picked
    }

    pub fn set_last_picked(&self, stamp: f64) {
        self.write().last_picked = stamp;
    }

    pub fn insert_tags<I: IntoIterator<Item = String>>(&self, tags: I) {
        self.write().tags.extend(tags);
    }

    pub fn remove_tags<'a, I: IntoIterator<Item = &'a String>>(&self, tags: I) {
        let mut state = self.write();
        for tag in tags {
            state.tags.remove(tag);
        }
    }
}

/// Anything a [`TagRepository`] can index.
///
/// Implementors are cheap handles: cloning one yields the same object, and
/// [`Tagged::object_id`] is its identity.
pub trait Tagged: Clone + Send + Sync + 'static {
    fn object_id(&self) -> ObjectId;

    fn tag_cell(&self) -> &TagCell;

    /// Repository the object currently calls home, if it tracks one
    fn home(&self) -> Option<TagRepository<Self>> {
        None
    }

    fn set_home(&self, _repo: Option<&TagRepository<Self>>) {}

    fn tags(&self) -> BTreeSet<String> {
        self.tag_cell().tags()
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.tag_cell().has_tag(tag)
    }

    fn last_picked(&self) -> f64 {
        self.tag_cell().last_picked()
    }
}

/// Repository holding generic taggables
pub type TaggableRepository<T> = TagRepository<Taggable<T>>;

struct TaggableInner<T> {
    id: ObjectId,
    value: T,
    cell: TagCell,
    home: RwLock<Option<WeakTagRepository<Taggable<T>>>>,
}

/// A tagged payload that lives in at most one repository at a time.
pub struct Taggable<T> {
    inner: Arc<TaggableInner<T>>,
}

impl<T> Clone for Taggable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Taggable<T> {
    /// Create a taggable and register it in `repo`, if given
    pub fn new<S: AsRef<str>>(repo: Option<&TaggableRepository<T>>, value: T, tags: &[S]) -> Self {
        let taggable = Self::detached(value, tags);
        taggable.set_repository(repo);
        taggable
    }

    pub fn detached<S: AsRef<str>>(value: T, tags: &[S]) -> Self {
        Self {
            inner: Arc::new(TaggableInner {
                id: ObjectId::next(),
                value,
                cell: TagCell::new(resolve_tags(tags)),
                home: RwLock::new(None),
            }),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn value(&self) -> &T {
        &self.inner.value
    }

    pub fn repository(&self) -> Option<TaggableRepository<T>> {
        self.home()
    }

    /// Move the object to `repo`, deregistering it from its previous home
    pub fn set_repository(&self, repo: Option<&TaggableRepository<T>>) {
        match repo {
            Some(repo) => repo.add_object(self),
            None => {
                if let Some(previous) = self.home() {
                    previous.remove_object(self);
                }
            }
        }
    }

    pub fn add_tag<S: AsRef<str>>(&self, tags: &[S]) {
        match self.home() {
            Some(repo) => repo.tag_object(self, tags),
            None => self.inner.cell.insert_tags(resolve_tags(tags)),
        }
    }

    pub fn remove_tag<S: AsRef<str>>(&self, tags: &[S]) {
        match self.home() {
            Some(repo) => repo.untag_object(self, tags),
            None => self.inner.cell.remove_tags(&resolve_tags(tags)),
        }
    }
}

impl<T: Send + Sync + 'static> Tagged for Taggable<T> {
    fn object_id(&self) -> ObjectId {
        self.inner.id
    }

    fn tag_cell(&self) -> &TagCell {
        &self.inner.cell
    }

    fn home(&self) -> Option<TagRepository<Self>> {
        self.inner
            .home
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(WeakTagRepository::upgrade)
    }

    fn set_home(&self, repo: Option<&TagRepository<Self>>) {
        *self.inner.home.write().unwrap_or_else(|e| e.into_inner()) =
            repo.map(TagRepository::downgrade);
    }
}

impl<T> PartialEq for Taggable<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Eq for Taggable<T> {}

impl<T> std::hash::Hash for Taggable<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Taggable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Taggable")
            .field("id", &self.inner.id)
            .field("value", &self.inner.value)
            .field("tags", &self.inner.cell.tags())
            .finish()
    }
}

impl<T> fmt::Display for Taggable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = self.inner.cell.tags().into_iter().collect();
        write!(f, "<Taggable: {}>", tags.join(" "))
    }
}
