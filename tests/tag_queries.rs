//! Tag set algebra laws and selection behavior

use blueprint_forge::tags::{
    Selector, TagError, TagQuery, TagSet, Taggable, TaggableRepository, Tagged,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const ALPHABET: &[&str] = &["red", "green", "blue", "big", "small"];

type Repo = TaggableRepository<usize>;

fn build(assignments: &[Vec<usize>]) -> (Repo, Vec<Taggable<usize>>) {
    let repo = Repo::new();
    let objs = assignments
        .iter()
        .enumerate()
        .map(|(i, tags)| {
            let tags: Vec<&str> = tags.iter().map(|t| ALPHABET[*t]).collect();
            Taggable::new(Some(&repo), i, &tags)
        })
        .collect();
    (repo, objs)
}

fn values(set: TagSet<Taggable<usize>>) -> BTreeSet<usize> {
    set.into_iter().map(|t| *t.value()).collect()
}

fn assignment() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0..ALPHABET.len(), 0..4), 0..12)
}

proptest! {
    #[test]
    fn prop_intersection_within_union(objs in assignment(), a in 0..5usize, b in 0..5usize) {
        let (repo, _objs) = build(&objs);
        let tags = [ALPHABET[a], ALPHABET[b]];
        let inter = repo.query_tags_intersection(&tags);
        let union = repo.query_tags_union(&tags);
        prop_assert!(inter.is_subset(&union));
    }

    #[test]
    fn prop_union_and_intersection_commute(objs in assignment(), a in 0..5usize, b in 0..5usize) {
        let (repo, _objs) = build(&objs);
        let (x, y) = (ALPHABET[a], ALPHABET[b]);
        prop_assert_eq!(
            values(repo.query_tags_union(&[x, y])),
            values(repo.query_tags_union(&[y, x]))
        );
        prop_assert_eq!(
            values(repo.query_tags_intersection(&[x, y])),
            values(repo.query_tags_intersection(&[y, x]))
        );
    }

    #[test]
    fn prop_difference_is_complement(objs in assignment(), a in 0..5usize) {
        let (repo, _objs) = build(&objs);
        let tag = ALPHABET[a];
        let all = values(repo.all());
        let tagged = values(repo.query_tag(tag));
        let expected: BTreeSet<usize> = all.difference(&tagged).copied().collect();
        prop_assert_eq!(values(repo.query_tags_difference(&[tag])), expected);
    }

    #[test]
    fn prop_index_consistent_after_edits(
        objs in assignment(),
        edits in prop::collection::vec((0..12usize, 0..5usize, any::<bool>()), 0..20),
    ) {
        let (repo, objs) = build(&objs);
        for (idx, tag, add) in edits {
            if let Some(obj) = objs.get(idx) {
                if add {
                    obj.add_tag(&[ALPHABET[tag]]);
                } else {
                    obj.remove_tag(&[ALPHABET[tag]]);
                }
            }
        }
        for tag in ALPHABET {
            for obj in &objs {
                prop_assert_eq!(obj.has_tag(tag), repo.query_tag(tag).contains(obj));
            }
        }
    }

    #[test]
    fn prop_ties_visit_each_candidate_once(n in 1..10usize) {
        let (repo, _objs) = build(&vec![vec![0]; n]);
        let selector = Selector::new().require("red");
        let mut seen = BTreeSet::new();
        for _ in 0..n {
            let pick = repo.select(&selector).unwrap();
            prop_assert!(seen.insert(*pick.value()));
        }
        prop_assert_eq!(seen.len(), n);
    }
}

#[test]
fn test_four_object_scenario() {
    let repo = TaggableRepository::new();
    let _t1 = Taggable::new(Some(&repo), "t1", &["foo"]);
    let t2 = Taggable::new(Some(&repo), "t2", &["foo", "bar"]);
    let t3 = Taggable::new(Some(&repo), "t3", &["foo", "bar", "baz"]);
    let t4 = Taggable::new(Some(&repo), "t4", &["boo"]);

    let both = repo.query_tags_intersection(&["foo", "bar"]);
    assert_eq!(both.into_vec(), vec![t2.clone(), t3.clone()]);
    assert_eq!(repo.query_tags_difference(&["foo"]).into_vec(), vec![t4]);

    let best = repo.select(&Selector::new().require("foo").prefer("bar baz")).unwrap();
    assert_eq!(best, t3);
}

#[test]
fn test_space_separated_tag_arguments() {
    let repo = TaggableRepository::new();
    let _t1 = Taggable::new(Some(&repo), "t1", &["foo"]);
    let t2 = Taggable::new(Some(&repo), "t2", &["foo", "bar"]);
    let t3 = Taggable::new(Some(&repo), "t3", &["foo", "bar", "baz"]);
    let t4 = Taggable::new(Some(&repo), "t4", &["boo"]);

    let both = repo.query_tags_intersection(&["foo bar"]);
    assert_eq!(both.into_vec(), vec![t2.clone(), t3.clone()]);
    let either = repo.query_tags_union(&["bar boo"]);
    assert_eq!(either.into_vec(), vec![t2, t3, t4]);
    assert!(repo.query_tags_difference(&["foo boo"]).is_empty());
    assert!(repo.query_tags_intersection(&["   "]).is_empty());
}

#[test]
fn test_query_order_with_or_not() {
    let repo = TaggableRepository::new();
    let a = Taggable::new(Some(&repo), "a", &["beast", "fur"]);
    let _b = Taggable::new(Some(&repo), "b", &["beast", "scales"]);
    let _c = Taggable::new(Some(&repo), "c", &["beast", "fur", "undead"]);

    let found = repo.query(&Selector::parse("beast ?fur !undead"));
    assert_eq!(found.into_vec(), vec![a]);
}

#[test]
fn test_select_with_no_match() {
    let repo: TaggableRepository<&str> = TaggableRepository::new();
    let _x = Taggable::new(Some(&repo), "x", &["one"]);
    let err = repo.select(&Selector::new().require("two")).unwrap_err();
    assert!(matches!(err, TagError::NoCandidates(_)));
}
