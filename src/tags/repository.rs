//! The shared tag index for one family of objects.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use ahash::AHashMap;
use tracing::{debug, trace};

use super::query::{select_in, TagQuery};
use super::set::TagSet;
use super::taggable::Tagged;
use super::{resolve_tags, Selector, TagError};

struct RepoInner<T> {
    index: RwLock<AHashMap<String, TagSet<T>>>,
    /// Serializes `select`, whose read-modify-write of `last_picked` must not interleave
    pick_lock: Mutex<()>,
}

/// Mapping from tag to the objects bearing it.
///
/// Cloning yields another handle to the same repository. Locks are always
/// taken repository first, object tag cell second.
pub struct TagRepository<T> {
    inner: Arc<RepoInner<T>>,
}

/// Non-owning handle, held by objects that point back at their repository
pub struct WeakTagRepository<T> {
    inner: Weak<RepoInner<T>>,
}

impl<T> Clone for TagRepository<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Clone for WeakTagRepository<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakTagRepository<T> {
    pub fn upgrade(&self) -> Option<TagRepository<T>> {
        self.inner.upgrade().map(|inner| TagRepository { inner })
    }
}

impl<T: Tagged> Default for TagRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tagged> TagRepository<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RepoInner {
                index: RwLock::new(AHashMap::new()),
                pick_lock: Mutex::new(()),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AHashMap<String, TagSet<T>>> {
        self.inner.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AHashMap<String, TagSet<T>>> {
        self.inner.index.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn downgrade(&self) -> WeakTagRepository<T> {
        WeakTagRepository {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True when both handles point at the same repository
    pub fn ptr_eq(&self, other: &TagRepository<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register `obj` under each of its current tags.
    ///
    /// An object tracking a different home repository is removed from it first.
    pub fn add_object(&self, obj: &T) {
        if let Some(previous) = obj.home() {
            if !previous.ptr_eq(self) {
                previous.unindex(obj);
            }
        }
        obj.set_home(Some(self));

        let tags = obj.tags();
        let mut index = self.write();
        for tag in &tags {
            index.entry(tag.clone()).or_default().insert(obj.clone());
        }
        trace!("Indexed {} under {} tags", obj.object_id(), tags.len());
    }

    /// Drop `obj` from every tag entry
    pub fn remove_object(&self, obj: &T) {
        self.unindex(obj);
        if obj.home().map_or(false, |home| home.ptr_eq(self)) {
            obj.set_home(None);
        }
    }

    fn unindex(&self, obj: &T) {
        let mut index = self.write();
        for set in index.values_mut() {
            set.remove(obj);
        }
    }

    /// Make tags known to the repository without attaching any object
    pub fn add_tags<S: AsRef<str>>(&self, tags: &[S]) {
        let mut index = self.write();
        for tag in resolve_tags(tags) {
            index.entry(tag).or_default();
        }
    }

    /// Add tags to `obj`, updating both the index and the object
    pub fn tag_object<S: AsRef<str>>(&self, obj: &T, tags: &[S]) {
        let tags = resolve_tags(tags);
        let mut index = self.write();
        for tag in &tags {
            index.entry(tag.clone()).or_default().insert(obj.clone());
        }
        debug!("Tagged {} with {:?}", obj.object_id(), tags);
        obj.tag_cell().insert_tags(tags);
    }

    /// Remove tags from `obj`, updating both the index and the object
    pub fn untag_object<S: AsRef<str>>(&self, obj: &T, tags: &[S]) {
        let tags = resolve_tags(tags);
        let mut index = self.write();
        for tag in &tags {
            if let Some(set) = index.get_mut(tag) {
                set.remove(obj);
            }
        }
        debug!("Untagged {} from {:?}", obj.object_id(), tags);
        obj.tag_cell().remove_tags(&tags);
    }

    /// Every tag the repository has seen, including ones with no objects left
    pub fn tags(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }

    pub fn contains(&self, obj: &T) -> bool {
        self.read().values().any(|set| set.contains(obj))
    }

    /// Number of distinct indexed objects
    pub fn len(&self) -> usize {
        let index = self.read();
        index
            .values()
            .flat_map(|set| set.ids())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().values().all(|set| set.is_empty())
    }
}

impl<T: Tagged> TagQuery<T> for TagRepository<T> {
    fn all(&self) -> TagSet<T> {
        let index = self.read();
        let mut result = TagSet::new();
        for set in index.values() {
            result.extend(set.iter().cloned());
        }
        result
    }

    fn query_tag(&self, tag: &str) -> TagSet<T> {
        self.read().get(tag).cloned().unwrap_or_default()
    }

    fn select(&self, selector: &Selector) -> Result<T, TagError> {
        let _guard = self.inner.pick_lock.lock().unwrap_or_else(|e| e.into_inner());
        select_in(self, selector)
    }
}

impl<T> fmt::Debug for TagRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags = self
            .inner
            .index
            .read()
            .map(|index| index.len())
            .unwrap_or(0);
        f.debug_struct("TagRepository").field("tags", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{Taggable, TaggableRepository};

    type Repo = TaggableRepository<&'static str>;

    fn populated() -> (Repo, Vec<Taggable<&'static str>>) {
        let repo = Repo::new();
        let objs = vec![
            Taggable::new(Some(&repo), "t1", &["foo"]),
            Taggable::new(Some(&repo), "t2", &["foo", "bar"]),
            Taggable::new(Some(&repo), "t3", &["foo", "bar", "baz"]),
            Taggable::new(Some(&repo), "t4", &["boo"]),
        ];
        (repo, objs)
    }

    #[test]
    fn test_intersection_and_difference() {
        let (repo, objs) = populated();
        let both = repo.query_tags_intersection(&["foo", "bar"]);
        assert_eq!(both.into_vec(), vec![objs[1].clone(), objs[2].clone()]);

        let rest = repo.query_tags_difference(&["foo"]);
        assert_eq!(rest.into_vec(), vec![objs[3].clone()]);
    }

    #[test]
    fn test_index_matches_object_tags() {
        let (repo, objs) = populated();
        for tag in repo.tags() {
            for obj in repo.query_tag(&tag).iter() {
                assert!(obj.has_tag(&tag));
            }
        }
        for obj in &objs {
            for tag in obj.tags() {
                assert!(repo.query_tag(&tag).contains(obj));
            }
        }
    }

    #[test]
    fn test_add_tags_without_objects() {
        let repo = Repo::new();
        repo.add_tags(&["empty lonely"]);
        assert_eq!(repo.tags().len(), 2);
        assert!(repo.is_empty());
        assert!(repo.query_tag("empty").is_empty());
    }

    #[test]
    fn test_remove_object() {
        let (repo, objs) = populated();
        assert_eq!(repo.len(), 4);
        repo.remove_object(&objs[0]);
        assert_eq!(repo.len(), 3);
        assert!(!repo.contains(&objs[0]));
        assert!(objs[0].repository().is_none());
        // the object keeps its own tags
        assert!(objs[0].has_tag("foo"));
    }

    #[test]
    fn test_select_round_robin_over_ties() {
        let repo = Repo::new();
        let objs: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|v| Taggable::new(Some(&repo), v, &["coin"]))
            .collect();

        let selector = Selector::new().require("coin");
        let picks: Vec<_> = (0..6).map(|_| repo.select(&selector).unwrap()).collect();
        assert_eq!(&picks[..3], &objs[..]);
        assert_eq!(&picks[3..], &objs[..]);
    }

    #[test]
    fn test_select_empty_repository() {
        let repo = Repo::new();
        assert!(matches!(
            repo.select(&Selector::new()),
            Err(TagError::NoCandidates(_))
        ));
    }

    #[test]
    fn test_concurrent_selects_visit_each_once() {
        let repo = Repo::new();
        for v in ["a", "b", "c", "d", "e", "f", "g", "h"] {
            Taggable::new(Some(&repo), v, &["slot"]);
        }
        let selector = Selector::new().require("slot");
        let picks: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| repo.select(&selector).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let distinct: BTreeSet<_> = picks.iter().map(|t| t.id()).collect();
        assert_eq!(distinct.len(), 8);
    }
}
