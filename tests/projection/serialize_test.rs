//! End-to-end serialization against an in-memory school database.

#[path = "../common/mod.rs"]
mod common;

use common::{init_tracing, school_schema, school_storage};
use dotquery::error::{Error, SpecError};
use dotquery::prelude::*;
use serde_json::{json, Value};

fn serialize(entity: &str, opts: SerializeOptions) -> Vec<Value> {
    init_tracing();
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    engine.serialize(&storage, entity, &opts).unwrap()
}

fn student(id: i64) -> FilterSpec {
    FilterSpec::map(vec![("id", json!(id))])
}

#[test]
fn test_default_projection() {
    let docs = serialize("Teacher", SerializeOptions::new());
    assert_eq!(
        docs,
        vec![
            json!({
                "name": "Ms. Frizzle",
                "students": [{"name": "Arnold"}, {"name": "Wanda"}, {"name": "Carlos"}]
            }),
            json!({"name": "Mr. Ruhle", "students": [{"name": "Arnold"}]}),
            json!({"name": "Ms. Bleach", "students": [{"name": "Wanda"}, {"name": "Phoebe"}]}),
        ]
    );
}

#[test]
fn test_star_matches_default_projection() {
    let default = serialize("Classroom", SerializeOptions::new());
    let star = serialize("Classroom", SerializeOptions::new().to_return(&["*"]));
    assert_eq!(default, star);
    assert_eq!(
        star[0],
        json!({
            "name": "4B",
            "teacher": {
                "name": "Ms. Frizzle",
                "students": [{"name": "Arnold"}, {"name": "Wanda"}, {"name": "Carlos"}]
            }
        })
    );
    // classroom 6C has no teacher
    assert_eq!(star[2], json!({"name": "6C", "teacher": null}));
}

#[test]
fn test_bracket_shorthand() {
    let docs = serialize(
        "School",
        SerializeOptions::new().to_return(&["name", "classrooms(name,teacher(name))"]),
    );
    assert_eq!(
        docs,
        vec![
            json!({
                "name": "Walkerville Elementary",
                "classrooms": [
                    {"name": "4B", "teacher": {"name": "Ms. Frizzle"}},
                    {"name": "5A", "teacher": {"name": "Mr. Ruhle"}}
                ]
            }),
            json!({"name": "Eastside", "classrooms": [{"name": "6C", "teacher": null}]}),
        ]
    );
}

#[test]
fn test_remap_by_keys_children() {
    let docs = serialize(
        "School",
        SerializeOptions::new()
            .to_return(&["classrooms_by_name.school_id"])
            .filter_by(FilterSpec::map(vec![("id", json!(1))])),
    );
    assert_eq!(
        docs,
        vec![json!({
            "classrooms_by_name": {"4B": {"school_id": 1}, "5A": {"school_id": 1}}
        })]
    );
}

// =============================================================================
// Mapped attributes
// =============================================================================

#[test]
fn test_dict_subset() {
    let docs = serialize(
        "Student",
        SerializeOptions::new()
            .to_return(&["contact_info.phone"])
            .filter_by(student(1)),
    );
    assert_eq!(docs, vec![json!({"contact_info": {"phone": "555-0101"}})]);
}

#[test]
fn test_whole_dict_list_and_alias() {
    let docs = serialize(
        "Student",
        SerializeOptions::new()
            .to_return(&["contact_info", "phone_numbers", "guardian_number"])
            .filter_by(student(3)),
    );
    assert_eq!(
        docs,
        vec![json!({
            "contact_info": {
                "phone": "555-0103",
                "home_phone": null,
                "email": "carlos@school.test"
            },
            "phone_numbers": ["555-0103", null],
            "guardian_number": null
        })]
    );
}

#[test]
fn test_mapped_alias_through_relationship() {
    let docs = serialize("Classroom", SerializeOptions::new().to_return(&["name", "teacher_name"]));
    let names: Vec<&Value> = docs.iter().map(|d| &d["teacher_name"]).collect();
    assert_eq!(names, vec![&json!("Ms. Frizzle"), &json!("Mr. Ruhle"), &Value::Null]);
}

// =============================================================================
// Exposure
// =============================================================================

#[test]
fn test_hidden_keys_need_expose_all() {
    let opts = SerializeOptions::new()
        .to_return(&["id", "name", "classroom_id"])
        .filter_by(FilterSpec::map(vec![("id", json!(1))]));

    let docs = serialize("Teacher", opts.clone());
    assert_eq!(docs, vec![json!({"name": "Ms. Frizzle"})]);

    let docs = serialize("Teacher", opts.expose_all(true));
    assert_eq!(docs, vec![json!({"id": 1, "name": "Ms. Frizzle", "classroom_id": 1})]);
}

#[test]
fn test_foreign_key_to_exposed_key_is_visible() {
    let docs = serialize(
        "Classroom",
        SerializeOptions::new().to_return(&["name", "school_id"]),
    );
    assert_eq!(docs[0], json!({"name": "4B", "school_id": 1}));
}

#[test]
fn test_hidden_column_dropped() {
    let docs = serialize(
        "Student",
        SerializeOptions::new()
            .to_return(&["name", "address"])
            .filter_by(student(2)),
    );
    assert_eq!(docs, vec![json!({"name": "Wanda"})]);
}

// =============================================================================
// Shape and errors
// =============================================================================

#[test]
fn test_keys_follow_projection_order() {
    let docs = serialize(
        "Teacher",
        SerializeOptions::new()
            .to_return(&["students(name)", "name"])
            .limit(1),
    );
    let keys: Vec<&String> = docs[0].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["students", "name"]);
}

#[test]
fn test_filtered_serialize() {
    let docs = serialize(
        "Teacher",
        SerializeOptions::new()
            .to_return(&["name"])
            .filter_by(FilterSpec::map(vec![("students.id", json!([1, 2]))])),
    );
    assert_eq!(docs, vec![json!({"name": "Ms. Frizzle"})]);
}

#[test]
fn test_duplicate_projection_rejected() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let err = engine
        .serialize(
            &storage,
            "Teacher",
            &SerializeOptions::new().to_return(&["name", "students(name)", "name"]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Spec(SpecError::DuplicateProjection(_))));
    assert_eq!(err.to_string(), "Duplicate projection entries: name, name");
}

#[test]
fn test_empty_result() {
    let docs = serialize(
        "Teacher",
        SerializeOptions::new().filter_by(FilterSpec::map(vec![("name", json!("Nobody"))])),
    );
    assert!(docs.is_empty());
}

#[test]
fn test_serialize_existing_session() {
    init_tracing();
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let session = engine
        .filter("Teacher", path("students.name").eq("Wanda"), false)
        .unwrap();

    let opts = engine
        .options()
        .to_return(&["name"])
        .filter_by(FilterSpec::map(vec![("classroom_id", json!(null))]));
    let docs = engine.serialize_session(&storage, session, &opts).unwrap();
    assert_eq!(docs, vec![json!({"name": "Ms. Bleach"})]);
}

#[test]
fn test_engine_dialect_must_match_storage() {
    let mut settings = dotquery::config::Settings::default();
    settings.engine.dialect = "duckdb".into();
    let engine = Engine::new(school_schema()).with_settings(settings).unwrap();

    let err = engine
        .serialize(&school_storage(), "Teacher", &engine.options())
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(
        err.to_string(),
        "Engine renders duckdb SQL but the storage expects sqlite"
    );
}
