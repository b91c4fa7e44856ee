//! Ordered snapshot sets of tagged objects.

use std::collections::btree_map::{self, BTreeMap};

use super::query::TagQuery;
use super::taggable::Tagged;
use crate::core::types::ObjectId;

/// A set of tagged objects, ordered by [`ObjectId`].
///
/// Query results are `TagSet`s, and a `TagSet` can itself be queried further.
/// Not as efficient as querying a repository's index, but useful for
/// refining a result.
#[derive(Debug, Clone)]
pub struct TagSet<T> {
    objects: BTreeMap<ObjectId, T>,
}

impl<T> Default for TagSet<T> {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
        }
    }
}

impl<T: Tagged> TagSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, obj: T) -> bool {
        self.objects.insert(obj.object_id(), obj).is_none()
    }

    pub fn remove(&mut self, obj: &T) -> bool {
        self.objects.remove(&obj.object_id()).is_some()
    }

    pub fn contains(&self, obj: &T) -> bool {
        self.objects.contains_key(&obj.object_id())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, ObjectId, T> {
        self.objects.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    /// Keep only the objects also present in `other`
    pub fn intersection_update(&mut self, other: &TagSet<T>) {
        self.objects.retain(|id, _| other.objects.contains_key(id));
    }

    pub fn union_update(&mut self, other: TagSet<T>) {
        self.objects.extend(other.objects);
    }

    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut keep: F) {
        self.objects.retain(|_, obj| keep(obj));
    }

    pub fn is_subset(&self, other: &TagSet<T>) -> bool {
        self.objects.keys().all(|id| other.objects.contains_key(id))
    }

    pub fn into_vec(self) -> Vec<T> {
        self.objects.into_values().collect()
    }
}

impl<T: Tagged> PartialEq for TagSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.objects.len() == other.objects.len() && self.is_subset(other)
    }
}

impl<T: Tagged> FromIterator<T> for TagSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for obj in iter {
            set.insert(obj);
        }
        set
    }
}

impl<T: Tagged> Extend<T> for TagSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for obj in iter {
            self.insert(obj);
        }
    }
}

impl<T> IntoIterator for TagSet<T> {
    type Item = T;
    type IntoIter = btree_map::IntoValues<ObjectId, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_values()
    }
}

impl<'a, T> IntoIterator for &'a TagSet<T> {
    type Item = &'a T;
    type IntoIter = btree_map::Values<'a, ObjectId, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.values()
    }
}

impl<T: Tagged> TagQuery<T> for TagSet<T> {
    fn all(&self) -> TagSet<T> {
        self.clone()
    }

    fn query_tag(&self, tag: &str) -> TagSet<T> {
        self.iter().filter(|obj| obj.has_tag(tag)).cloned().collect()
    }
}
