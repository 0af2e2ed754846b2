//! Dense-rank pagination stays stable when joins multiply root rows.

#[path = "../common/mod.rs"]
mod common;

use common::{school_schema, school_storage};
use dotquery::prelude::*;
use serde_json::{json, Value};

fn names(docs: &[Value]) -> Vec<&str> {
    docs.iter().filter_map(|d| d["name"].as_str()).collect()
}

fn assert_pages_match(engine: &Engine, storage: &SqliteStorage, entity: &str, opts: SerializeOptions) {
    let full = engine.serialize(storage, entity, &opts).unwrap();
    for (k, expected) in full.iter().enumerate() {
        let page = engine
            .serialize(storage, entity, &opts.clone().limit(1).offset(k as u64))
            .unwrap();
        assert_eq!(page, vec![expected.clone()], "page at offset {}", k);
    }
    let past_end = engine
        .serialize(storage, entity, &opts.limit(1).offset(full.len() as u64))
        .unwrap();
    assert!(past_end.is_empty());
}

#[test]
fn test_limit_offset_by_primary_key() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let opts = SerializeOptions::new().to_return(&["name"]).limit(2).offset(1);
    let docs = engine.serialize(&storage, "Student", &opts).unwrap();
    assert_eq!(names(&docs), vec!["Wanda", "Carlos"]);
}

#[test]
fn test_to_many_filter_does_not_duplicate_roots() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let opts = SerializeOptions::new()
        .to_return(&["name"])
        .filter_by(path("students.email").like("%@school.test"));

    let docs = engine.serialize(&storage, "Teacher", &opts).unwrap();
    assert_eq!(names(&docs), vec!["Ms. Frizzle", "Mr. Ruhle", "Ms. Bleach"]);
    assert_pages_match(&engine, &storage, "Teacher", opts);
}

#[test]
fn test_order_by_to_many_path() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    // each teacher ranks by its best (latest-sorting) student name
    let opts = SerializeOptions::new()
        .to_return(&["name"])
        .order_by(vec![OrderByExpr::desc(path("students.name"))]);

    let docs = engine.serialize(&storage, "Teacher", &opts).unwrap();
    assert_eq!(names(&docs), vec!["Ms. Frizzle", "Ms. Bleach", "Mr. Ruhle"]);
    assert_pages_match(&engine, &storage, "Teacher", opts);
}

#[test]
fn test_order_by_column_with_eager_loads() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let opts = SerializeOptions::new()
        .to_return(&["name", "teachers(name)"])
        .order_by(vec![OrderByExpr::asc(path("name"))]);

    let docs = engine.serialize(&storage, "Student", &opts).unwrap();
    assert_eq!(names(&docs), vec!["Arnold", "Carlos", "Phoebe", "Wanda"]);
    assert_eq!(
        docs[0],
        json!({"name": "Arnold", "teachers": [{"name": "Ms. Frizzle"}, {"name": "Mr. Ruhle"}]})
    );
    assert_pages_match(&engine, &storage, "Student", opts);
}

#[test]
fn test_grouped_filter_pages() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let opts = SerializeOptions::new()
        .to_return(&["name"])
        .filter_by(FilterSpec::map(vec![("teachers.id", json!([1, 3]))]));

    // only Wanda has both Ms. Frizzle and Ms. Bleach
    let docs = engine.serialize(&storage, "Student", &opts).unwrap();
    assert_eq!(names(&docs), vec!["Wanda"]);
    assert_pages_match(&engine, &storage, "Student", opts);
}

#[test]
fn test_prepared_sql_is_inspectable() {
    let engine = Engine::new(school_schema());
    let prepared = engine
        .prepare(
            "Teacher",
            &SerializeOptions::new()
                .to_return(&["name"])
                .limit(5)
                .offset(10),
        )
        .unwrap();
    let sql = prepared.sql(Dialect::Sqlite);
    assert!(sql.contains("DENSE_RANK() OVER (ORDER BY \"teacher\".\"id\" ASC)"), "{}", sql);
    assert!(sql.ends_with("LIMIT 5 OFFSET 10"), "{}", sql);
    assert_eq!(prepared.plan.root().columns, vec!["id", "classroom_id", "name"]);
}
