//! Loading class libraries from TOML files

use std::fs;
use std::path::PathBuf;

use blueprint_forge::blueprints::{ClassLibrary, SchemaError, Value};
use blueprint_forge::core::{ForgeConfig, Seed};
use blueprint_forge::tags::{Selector, TagQuery, Tagged};

const BASES: &str = r#"
[[blueprint]]
name = "Creature"
abstract = true

[blueprint.fields]
hp = { dice = "2d6" }
"#;

const BEASTS: &str = r#"
[[blueprint]]
name = "CaveBear"
extends = ["Creature"]
tags = "beast large"

[blueprint.meta]
habitat = "caves"

[blueprint.fields]
hp = { dice = "4d10+10" }
mood = { pick_one = ["grumpy", "sleepy", "hungry"] }
loot = { dice_table = "1d6", table = { "1..3" = "nothing", "4,5" = "pelt", "6" = { random_int = [1, 5] } } }
description = { template = "A {mood} bear from the {meta.habitat}" }

[[blueprint]]
name = "CaveRat"
extends = ["Creature"]
tags = "beast small"

[blueprint.fields]
name = { markov = ["squeak", "nibbles", "whisker"], chain_len = 1, max_length = 8 }
bite = { op = "+", items = [{ dice = "1d4" }, 1] }
twice_bite = { op = "*", items = [{ ref = "bite" }, 2] }
"#;

fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "blueprint-forge-{}-{}",
        label,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("nested")).unwrap();
    dir
}

#[test]
fn test_load_directory_in_name_order() {
    let dir = scratch_dir("dir");
    fs::write(dir.join("a_bases.toml"), BASES).unwrap();
    fs::write(dir.join("nested").join("beasts.toml"), BEASTS).unwrap();
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let mut library = ClassLibrary::new();
    let names = library.load_directory(&dir).unwrap();
    assert_eq!(names, vec!["Creature", "CaveBear", "CaveRat"]);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_master_from_toml() {
    let mut library = ClassLibrary::new();
    library.load_str(BASES).unwrap();
    library.load_str(BEASTS).unwrap();

    for seed in 0..20u64 {
        let bear = library.master("CaveBear", Some(Seed::Int(seed))).unwrap();
        let hp = bear.get("hp").and_then(Value::as_i64).unwrap();
        assert!((14..=50).contains(&hp));
        let mood = bear.get("mood").and_then(Value::as_str).unwrap().to_string();
        assert_eq!(
            bear.get("description"),
            Some(&Value::Str(format!("A {} bear from the caves", mood)))
        );
        match bear.get("loot") {
            Some(Value::Str(s)) => assert!(s == "nothing" || s == "pelt"),
            Some(Value::Int(n)) => assert!((1..=5).contains(n)),
            other => panic!("unexpected loot {:?}", other),
        }

        let rat = library.master("CaveRat", Some(Seed::Int(seed))).unwrap();
        let bite = rat.get("bite").and_then(Value::as_i64).unwrap();
        assert!((2..=5).contains(&bite));
        assert_eq!(rat.get("twice_bite").and_then(Value::as_i64), Some(bite * 2));
        let name = rat.get("name").and_then(Value::as_str).unwrap();
        assert!(name.chars().count() <= 8);
    }
}

#[test]
fn test_library_family_queries() {
    let mut library = ClassLibrary::new();
    library.load_str(BASES).unwrap();
    library.load_str(BEASTS).unwrap();

    let family = library.family("Creature").unwrap();
    let cave = family.query(&Selector::parse("cave"));
    assert_eq!(cave.len(), 2);

    let picked = family.select(&Selector::parse("beast ?small")).unwrap();
    assert_eq!(picked.name(), "CaveRat");
    assert!(picked.has_tag("rat"));
}

#[test]
fn test_config_defaults_apply_to_markov() {
    let config = ForgeConfig::from_toml_str("markov_chain_len = 11");
    assert!(config.is_err());

    let config = ForgeConfig::from_toml_str("markov_max_length = 3").unwrap();
    let mut library = ClassLibrary::with_config(config);
    library
        .load_str(
            r#"
[[blueprint]]
name = "Shortname"
[blueprint.fields]
name = { markov = ["abcdefghij"] }
"#,
        )
        .unwrap();
    let bp = library.master("Shortname", Some(Seed::Int(1))).unwrap();
    assert_eq!(bp.get("name"), Some(&Value::from("abc")));
}

#[test]
fn test_unknown_class_and_base() {
    let mut library = ClassLibrary::new();
    assert!(matches!(
        library.load_str(BEASTS),
        Err(SchemaError::UnknownBase { .. })
    ));
    assert!(library.master("Nope", None).is_err());
}
