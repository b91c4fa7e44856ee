//! Blueprint integration tests
//!
//! Class registration, mastering, determinism and nested blueprints through
//! the public API.

use blueprint_forge::blueprints::*;
use blueprint_forge::core::Seed;
use blueprint_forge::tags::{Selector, TagQuery, Tagged};

struct Armory {
    item: BlueprintClass,
    weapon: BlueprintClass,
    club: BlueprintClass,
}

fn armory() -> Armory {
    let item = BlueprintClass::builder("Item").field("value", 1).build();
    let weapon = BlueprintClass::builder("Weapon")
        .extends(&item)
        .field("damage", Field::random_int(1, 5))
        .build();
    let club = BlueprintClass::builder("Club")
        .extends(&weapon)
        .tags("primitive crushing")
        .build();
    Armory { item, weapon, club }
}

#[test]
fn test_club_scenario() {
    let Armory { item, weapon, club } = armory();

    assert!(club.has_tag("Item"));
    assert!(club.has_tag("Weapon"));
    assert!(club.has_tag("primitive"));
    assert!(club.tag_repo().ptr_eq(item.tag_repo()));
    assert!(weapon.tag_repo().ptr_eq(item.tag_repo()));

    for seed in 0..50u64 {
        let bp = club.instantiate_with_seed(seed).unwrap();
        let damage = bp.get("damage").and_then(Value::as_i64).unwrap();
        assert!((1..=5).contains(&damage));
        assert_eq!(bp.get("value"), Some(&Value::Int(1)));
        assert!(bp.meta().mastered);
    }
}

#[test]
fn test_tag_closure_down_the_chain() {
    let Armory { item, weapon, club } = armory();
    assert!(item.tags().is_subset(&weapon.tags()));
    assert!(weapon.tags().is_subset(&club.tags()));
    assert!(club.tags().contains("club"));
}

#[test]
fn test_field_sets_accumulate() {
    let Armory { item, club, .. } = armory();
    for name in item.field_names() {
        assert!(club.field_names().contains(name));
    }
}

#[test]
fn test_same_seed_same_blueprint() {
    let names = MarkovChain::new(["thorin", "balin", "dwalin", "gloin"], 2, 8).unwrap();
    let class = BlueprintClass::builder("Dwarf")
        .field("name", Field::markov(names))
        .field("strength", Field::dice("3d6").unwrap())
        .field("trade", Field::pick_one(["smith", "miner", "merchant"]))
        .field("title", Field::template("{name} the {trade}").unwrap())
        .build();

    for seed in ["a", "b", "c"] {
        let a = class.instantiate_with_seed(seed).unwrap();
        let b = class.instantiate_with_seed(seed).unwrap();
        assert_eq!(a.to_mapping(), b.to_mapping());
        assert_ne!(a.meta().instance_id, b.meta().instance_id);
    }
}

#[test]
fn test_parent_seed_inherited() {
    let Armory { club, item, .. } = armory();
    let parent = club.instantiate_with_seed("dungeon-1").unwrap();
    let child = item.master().parent(parent.clone()).run().unwrap();
    assert_eq!(child.meta().seed, parent.meta().seed);

    let explicit = item.master().parent(parent.clone()).seed(9).run().unwrap();
    assert_eq!(explicit.meta().seed, Seed::Int(9));
}

#[test]
fn test_dependency_ordering_either_way() {
    let doubled = || {
        Field::computed(|ctx| ctx.get("a")?.binary(BinOp::Mul, &Value::Int(2))).depends_on("a")
    };
    let a_first = BlueprintClass::builder("AFirst")
        .field("a", 5)
        .field("b", doubled())
        .build();
    let b_first = BlueprintClass::builder("BFirst")
        .field("b", doubled())
        .field("a", 5)
        .build();
    for class in [a_first, b_first] {
        let bp = class.instantiate().unwrap();
        assert_eq!(bp.get("b"), Some(&Value::Int(10)));
    }
}

#[test]
fn test_cycle_reports_fields() {
    let class = BlueprintClass::builder("Ouroboros")
        .field("head", Field::reference("tail"))
        .field("tail", Field::reference("head"))
        .field("body", 3)
        .build();
    match class.instantiate() {
        Err(ResolveError::DependencyCycle { fields }) => {
            assert_eq!(fields, vec!["head".to_string(), "tail".to_string()]);
        }
        other => panic!("expected a cycle, got {:?}", other.map(|bp| bp.to_mapping())),
    }
}

#[test]
fn test_every_field_is_concrete() {
    let Armory { weapon, .. } = armory();
    let chest = BlueprintClass::builder("Chest")
        .field("loot", Field::nested(&weapon))
        .field("gold", Field::dice("2d10*10").unwrap())
        .field("contents", Field::all([Field::nested(&weapon), Field::random_int(1, 3)]))
        .build();
    let bp = chest.instantiate_with_seed(11).unwrap();
    for name in bp.fields() {
        let value = bp.get(name).unwrap();
        assert!(!matches!(value, Value::Class(_)), "{name} left unresolved");
    }
    let loot = bp.get("loot").and_then(Value::as_blueprint).unwrap();
    assert!(loot.is_a(&weapon));
    assert!(loot.meta().parent.is_some());
    match bp.get("contents") {
        Some(Value::List(items)) => {
            assert_eq!(items.len(), 2);
            assert!(matches!(items[0], Value::Blueprint(_)));
        }
        other => panic!("unexpected contents {:?}", other),
    }
}

#[test]
fn test_pick_from_tagged_family() {
    let monster = BlueprintClass::builder("Monster").abstract_class().build();
    let goblin = BlueprintClass::builder("Goblin")
        .extends(&monster)
        .tags("small")
        .field("hp", Field::dice("1d6").unwrap())
        .build();
    let _troll = BlueprintClass::builder("Troll")
        .extends(&monster)
        .tags("large")
        .field("hp", Field::dice("6d8").unwrap())
        .build();
    let lair = BlueprintClass::builder("GoblinLair")
        .field("boss", Field::pick_from(Field::with_selector(
            Selector::parse("small"),
            Some(monster.tag_repo().clone()),
        )))
        .build();

    let bp = lair.instantiate_with_seed(2).unwrap();
    let boss = bp.get("boss").and_then(Value::as_blueprint).unwrap();
    assert!(boss.is_a(&goblin));

    let all = monster.tag_repo().query(&Selector::new());
    assert_eq!(all.len(), 2);
}

#[test]
fn test_options_reach_templates() {
    let class = BlueprintClass::builder("Banner")
        .option("house", "Stark")
        .field("motto", Field::template("House {meta.house} ({meta.seed})").unwrap())
        .build();
    let bp = class.instantiate_with_seed(12).unwrap();
    assert_eq!(bp.get("motto"), Some(&Value::from("House Stark (12)")));
}

#[test]
fn test_collections_regenerate_members() {
    let Armory { club, .. } = armory();
    let rack = BlueprintCollection::new(&club, "rack-");
    let fifth = rack.get(5).unwrap();
    let again = rack.range(0..8).unwrap();
    assert_eq!(again[5].to_mapping(), fifth.to_mapping());
}
