//! Entity definitions loaded from TOML and JSON.

#[path = "../common/mod.rs"]
mod common;

use common::school_storage;
use dotquery::config::Settings;
use dotquery::error::SchemaError;
use dotquery::prelude::*;
use serde_json::json;

const SCHOOL_TOML: &str = r#"
[[entity]]
name = "Classroom"
columns = ["name", { name = "school_id" }]

[[entity.relationship]]
name = "teacher"
target = "Teacher"
cardinality = "one"
local_key = "id"
remote_key = "classroom_id"

[[entity]]
name = "Teacher"
columns = ["name", { name = "classroom_id", references = "Classroom.id" }]
default_projection = ["name", "students(name)"]

[[entity.relationship]]
name = "classroom"
target = "Classroom"
cardinality = "one"
local_key = "classroom_id"
remote_key = "id"

[[entity.relationship]]
name = "students"
target = "Student"
cardinality = "many"
local_key = "id"
remote_key = "id"
through = { table = "teacher_student", local_column = "teacher_id", remote_column = "student_id" }

[[entity]]
name = "Student"
columns = ["name", "phone", "home_phone", "email", { name = "address", exposed = false }]
default_projection = ["name", "contact"]

[entity.mapped]
contact = { phone = "phone", email = "email" }
numbers = ["phone", "home_phone"]
"#;

#[test]
fn test_toml_schema_serializes() {
    let schema = Schema::from_toml_str(SCHOOL_TOML).unwrap();
    let engine = Engine::new(schema);
    let storage = school_storage();

    let docs = engine
        .serialize(
            &storage,
            "Student",
            &SerializeOptions::new().filter_by(FilterSpec::map(vec![("teachers_missing", json!(1))])),
        )
        .unwrap_err();
    assert!(matches!(
        docs,
        dotquery::Error::Schema(SchemaError::UnknownAttribute { .. })
    ));

    let docs = engine
        .serialize(
            &storage,
            "Student",
            &SerializeOptions::new().filter_by(FilterSpec::map(vec![("id", json!(1))])),
        )
        .unwrap();
    assert_eq!(
        docs,
        vec![json!({
            "name": "Arnold",
            "contact": {"phone": "555-0101", "email": "arnold@school.test"}
        })]
    );

    let docs = engine
        .serialize(&storage, "Teacher", &SerializeOptions::new().limit(1))
        .unwrap();
    assert_eq!(
        docs,
        vec![json!({
            "name": "Ms. Frizzle",
            "students": [{"name": "Arnold"}, {"name": "Wanda"}, {"name": "Carlos"}]
        })]
    );
}

#[test]
fn test_toml_defaults() {
    let schema = Schema::from_toml_str(SCHOOL_TOML).unwrap();
    let student = schema.entity("Student").unwrap();
    assert_eq!(student.table, "student");
    assert_eq!(student.primary_key(), "id");
    assert!(!schema.column_exposed(student, student.get_column("address").unwrap()));

    let teacher = schema.entity("Teacher").unwrap();
    let students = teacher.get_relationship("students").unwrap();
    assert!(students.is_many());
    assert_eq!(students.association.as_ref().unwrap().table, "teacher_student");
}

#[test]
fn test_json_schema() {
    let schema = Schema::from_json_str(
        r#"{"entity": [
            {"name": "Student", "columns": ["name", "email"],
             "mapped": {"contact": {"email": "email"}},
             "default_projection": ["contact"]}
        ]}"#,
    )
    .unwrap();
    let engine = Engine::new(schema);
    let docs = engine
        .serialize(&school_storage(), "Student", &SerializeOptions::new().limit(1))
        .unwrap();
    assert_eq!(docs, vec![json!({"contact": {"email": "arnold@school.test"}})]);
}

#[test]
fn test_invalid_definitions() {
    let err = Schema::from_toml_str(
        r#"
[[entity]]
name = "Teacher"

[[entity.relationship]]
name = "students"
target = "Student"
cardinality = "many"
local_key = "id"
remote_key = "teacher_id"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidRelationship { .. }), "{:?}", err);

    let err = Schema::from_toml_str(
        r#"
[[entity]]
name = "Student"
columns = ["name"]

[entity.mapped]
loop_a = "loop_b"
loop_b = "loop_a"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::MalformedMapped { .. }), "{:?}", err);

    let err = Schema::from_toml_str("[[entity]]\nname = 3\n").unwrap_err();
    assert!(matches!(err, SchemaError::Parse(_)), "{:?}", err);
}

#[test]
fn test_engine_from_settings() {
    let dir = std::env::temp_dir().join(format!("dotquery-settings-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let schema_path = dir.join("schema.toml");
    std::fs::write(&schema_path, SCHOOL_TOML).unwrap();

    let config_path = dir.join("dotquery.toml");
    std::fs::write(
        &config_path,
        format!(
            "[engine]\nexpose_all = true\n\n[schema]\npath = \"{}\"\n",
            schema_path.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    let settings = Settings::from_file(&config_path).unwrap();
    let engine = Engine::from_settings(settings).unwrap();
    assert!(engine.options().expose_all);
    assert!(engine.schema().entity("Teacher").is_ok());

    let missing = Engine::from_settings(Settings::default()).unwrap_err();
    assert!(matches!(missing, dotquery::Error::Settings(_)));

    std::fs::remove_dir_all(&dir).unwrap();
}
