//! Mastering throughput

use blueprint_forge::blueprints::{BinOp, BlueprintClass, BlueprintCollection, Field, Value};
use blueprint_forge::tags::{Selector, TagQuery};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn hero() -> BlueprintClass {
    let sword = BlueprintClass::builder("Sword")
        .field("damage", Field::dice("2d6+1").unwrap())
        .build();
    BlueprintClass::builder("Hero")
        .field("strength", Field::dice("4d6").unwrap())
        .field(
            "attack",
            Field::computed(|ctx| ctx.get("strength")?.binary(BinOp::Add, &Value::Int(2)))
                .depends_on("strength"),
        )
        .field("weapon", Field::nested(&sword))
        .field("class", Field::pick_one(["fighter", "rogue", "cleric"]))
        .field("title", Field::template("{class} with {attack} attack").unwrap())
        .build()
}

fn bench_master(c: &mut Criterion) {
    let class = hero();
    c.bench_function("master_hero", |b| {
        let mut seed = 0u64;
        b.iter(|| {
            seed += 1;
            black_box(class.instantiate_with_seed(seed).unwrap())
        })
    });

    let collection = BlueprintCollection::new(&class, "party");
    c.bench_function("par_range_256", |b| {
        b.iter(|| black_box(collection.par_range(0..256).unwrap()))
    });
}

fn bench_select(c: &mut Criterion) {
    let root = BlueprintClass::builder("Beast").abstract_class().build();
    let sizes = ["tiny", "small", "large", "huge"];
    let habitats = ["forest", "cave", "swamp", "desert"];
    for (i, size) in sizes.iter().enumerate() {
        for (j, habitat) in habitats.iter().enumerate() {
            BlueprintClass::builder(&format!("Beast{}x{}", i, j))
                .extends(&root)
                .tags(&format!("{} {}", size, habitat))
                .build();
        }
    }
    let selector = Selector::parse("cave ?large !tiny");
    c.bench_function("select_beast", |b| {
        b.iter(|| black_box(root.tag_repo().select(&selector).unwrap()))
    });
}

criterion_group!(benches, bench_master, bench_select);
criterion_main!(benches);
