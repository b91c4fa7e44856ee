//! Set algebra over tagged objects and the ranked selection algorithm.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use tracing::trace;

use super::set::TagSet;
use super::taggable::Tagged;
use super::{resolve_tags, Selector, TagError};
use crate::core::types::pick_stamp;

/// Queries shared by tag repositories and snapshot tag sets.
pub trait TagQuery<T: Tagged> {
    /// Every object known to this source
    fn all(&self) -> TagSet<T>;

    /// Every object bearing `tag`
    fn query_tag(&self, tag: &str) -> TagSet<T>;

    /// Objects bearing every listed tag. Arguments are split on whitespace;
    /// an empty tag list yields an empty set.
    fn query_tags_intersection<S: AsRef<str>>(&self, tags: &[S]) -> TagSet<T> {
        let resolved = resolve_tags(tags);
        let mut iter = resolved.iter();
        let Some(first) = iter.next() else {
            return TagSet::new();
        };
        let mut result = self.query_tag(first);
        for tag in iter {
            if result.is_empty() {
                break;
            }
            result.intersection_update(&self.query_tag(tag));
        }
        result
    }

    /// Objects bearing any listed tag
    fn query_tags_union<S: AsRef<str>>(&self, tags: &[S]) -> TagSet<T> {
        let mut result = TagSet::new();
        for tag in resolve_tags(tags) {
            result.union_update(self.query_tag(&tag));
        }
        result
    }

    /// Every object except those bearing any listed tag
    fn query_tags_difference<S: AsRef<str>>(&self, tags: &[S]) -> TagSet<T> {
        let resolved = resolve_tags(tags);
        let mut result = self.all();
        result.retain(|obj| !resolved.iter().any(|t| obj.has_tag(t)));
        result
    }

    /// Required tags intersected, narrowed to objects bearing at least one
    /// optional tag (when any are given), minus objects bearing an excluded tag.
    ///
    /// With no required tags the query starts from [`TagQuery::all`].
    fn query(&self, selector: &Selector) -> TagSet<T> {
        let with: Vec<&String> = selector.with_tags.iter().collect();
        let mut result = if with.is_empty() {
            self.all()
        } else {
            self.query_tags_intersection(&with)
        };
        if !selector.or_tags.is_empty() {
            result.retain(|obj| selector.or_tags.iter().any(|t| obj.has_tag(t)));
        }
        if !selector.not_tags.is_empty() {
            result.retain(|obj| !selector.not_tags.iter().any(|t| obj.has_tag(t)));
        }
        result
    }

    /// Pick the best match for `selector` and stamp it as just picked.
    fn select(&self, selector: &Selector) -> Result<T, TagError> {
        select_in(self, selector)
    }
}

/// Rank of one candidate: +1 per optional tag it bears, -1 per tag the
/// selector does not mention at all. Required tags score nothing.
fn rank<T: Tagged>(obj: &T, selector: &Selector) -> i64 {
    obj.tags()
        .iter()
        .map(|tag| {
            if selector.or_tags.contains(tag) {
                1
            } else if selector.with_tags.contains(tag) {
                0
            } else {
                -1
            }
        })
        .sum()
}

/// The selection algorithm behind [`TagQuery::select`].
///
/// The pool is the intersection of the required tags (everything when none
/// are given) minus objects bearing an excluded tag. The highest rank wins;
/// ties go to the least recently picked object, then to the lowest
/// [`ObjectId`](crate::core::types::ObjectId). The winner's `last_picked` is
/// updated before it is returned, so repeated selections rotate through
/// equally ranked candidates.
pub fn select_in<T, Q>(source: &Q, selector: &Selector) -> Result<T, TagError>
where
    T: Tagged,
    Q: TagQuery<T> + ?Sized,
{
    let with: Vec<&String> = selector.with_tags.iter().collect();
    let mut pool = if with.is_empty() {
        source.all()
    } else {
        source.query_tags_intersection(&with)
    };
    pool.retain(|obj| !selector.not_tags.iter().any(|t| obj.has_tag(t)));

    let winner = pool
        .iter()
        .min_by_key(|obj| {
            (
                Reverse(rank(*obj, selector)),
                OrderedFloat(obj.last_picked()),
                obj.object_id(),
            )
        })
        .cloned()
        .ok_or_else(|| TagError::NoCandidates(selector.clone()))?;

    winner.tag_cell().set_last_picked(pick_stamp());
    trace!(
        "Selected {} from {} candidates for {}",
        winner.object_id(),
        pool.len(),
        selector
    );
    Ok(winner)
}
