//! Tag repositories and the set algebra used to query and select from them.
//!
//! Every independent blueprint family shares one [`TagRepository`]; objects
//! are indexed under each of their tags, and the repository index and each
//! object's own tag set are kept consistent by every mutating operation.

pub mod query;
pub mod repository;
pub mod set;
pub mod taggable;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use query::{select_in, TagQuery};
pub use repository::{TagRepository, WeakTagRepository};
pub use set::TagSet;
pub use taggable::{TagCell, TagState, Taggable, TaggableRepository, Tagged};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TagError {
    #[error("No candidates match {0}")]
    NoCandidates(Selector),

    #[error("Tag repository was dropped")]
    RepositoryGone,
}

/// Split every tag argument on whitespace and collect the tokens.
pub fn resolve_tags<S: AsRef<str>>(tags: &[S]) -> BTreeSet<String> {
    tags.iter()
        .flat_map(|t| t.as_ref().split_whitespace())
        .map(str::to_string)
        .collect()
}

/// A tag-boolean expression: required, optional and excluded tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default, rename = "with")]
    pub with_tags: BTreeSet<String>,
    #[serde(default, rename = "or")]
    pub or_tags: BTreeSet<String>,
    #[serde(default, rename = "not")]
    pub not_tags: BTreeSet<String>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require<S: AsRef<str>>(mut self, tags: S) -> Self {
        self.with_tags.extend(resolve_tags(&[tags]));
        self
    }

    pub fn prefer<S: AsRef<str>>(mut self, tags: S) -> Self {
        self.or_tags.extend(resolve_tags(&[tags]));
        self
    }

    pub fn exclude<S: AsRef<str>>(mut self, tags: S) -> Self {
        self.not_tags.extend(resolve_tags(&[tags]));
        self
    }

    /// Parse the compact form used by `WithTags` fields.
    ///
    /// A bare tag is required, `!tag` is excluded and `?tag` or `tag?` is
    /// optional. Markers are stripped from the stored tag.
    pub fn parse(text: &str) -> Self {
        let mut selector = Selector::new();
        for token in text.split_whitespace() {
            if let Some(tag) = token.strip_prefix('!') {
                if !tag.is_empty() {
                    selector.not_tags.insert(tag.to_string());
                }
            } else if let Some(tag) = token
                .strip_prefix('?')
                .or_else(|| token.strip_suffix('?'))
            {
                if !tag.is_empty() {
                    selector.or_tags.insert(tag.to_string());
                }
            } else {
                selector.with_tags.insert(token.to_string());
            }
        }
        selector
    }

    pub fn is_empty(&self) -> bool {
        self.with_tags.is_empty() && self.or_tags.is_empty() && self.not_tags.is_empty()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .with_tags
            .iter()
            .cloned()
            .chain(self.or_tags.iter().map(|t| format!("?{}", t)))
            .chain(self.not_tags.iter().map(|t| format!("!{}", t)))
            .collect();
        if parts.is_empty() {
            write!(f, "<any>")
        } else {
            write!(f, "[{}]", parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tags_splits_whitespace() {
        let tags = resolve_tags(&["a b", "  c\td ", ""]);
        let expected: BTreeSet<String> =
            ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn test_selector_parse_markers() {
        let selector = Selector::parse("weapon !cursed ?sharp heavy? ! ?");
        assert!(selector.with_tags.contains("weapon"));
        assert!(selector.not_tags.contains("cursed"));
        assert!(selector.or_tags.contains("sharp"));
        assert!(selector.or_tags.contains("heavy"));
        assert_eq!(selector.with_tags.len(), 1);
        assert_eq!(selector.or_tags.len(), 2);
        assert_eq!(selector.not_tags.len(), 1);
    }

    #[test]
    fn test_selector_builder_and_display() {
        let selector = Selector::new().require("a").prefer("b").exclude("c");
        assert_eq!(selector.to_string(), "[a ?b !c]");
        assert_eq!(Selector::new().to_string(), "<any>");
        assert_eq!(selector, Selector::parse("a ?b !c"));
    }
}
