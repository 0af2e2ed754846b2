//! Filter compilation against an in-memory school database.

#[path = "../common/mod.rs"]
mod common;

use common::{matched_ids, school_schema, school_storage};
use dotquery::error::{Error, SpecError};
use dotquery::prelude::*;
use dotquery::sql::{coalesce, col, lower, max, raw_sql, TableRef};
use serde_json::json;

fn ids(entity: &str, spec: serde_json::Value) -> Vec<i64> {
    ids_with(entity, spec, false)
}

fn ids_with(entity: &str, spec: serde_json::Value, skip_nones: bool) -> Vec<i64> {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let spec = FilterSpec::try_from(spec).unwrap();
    let session = engine.filter(entity, spec, skip_nones).unwrap();
    matched_ids(&storage, &session)
}

// =============================================================================
// Map form
// =============================================================================

#[test]
fn test_filter_by_primary_key() {
    assert_eq!(ids("Teacher", json!({"id": 1})), vec![1]);
}

#[test]
fn test_filter_by_scalar_column() {
    assert_eq!(ids("Teacher", json!({"name": "Mr. Ruhle"})), vec![2]);
}

#[test]
fn test_filter_by_foreign_key() {
    assert_eq!(ids("Teacher", json!({"classroom_id": 2})), vec![2]);
}

#[test]
fn test_filter_many_to_many() {
    assert_eq!(ids("Teacher", json!({"students.id": 2})), vec![1, 3]);
    assert_eq!(ids("Student", json!({"teachers.name": "Ms. Bleach"})), vec![2, 4]);
}

#[test]
fn test_filter_to_one() {
    assert_eq!(ids("Teacher", json!({"classroom.name": "4B"})), vec![1]);
}

#[test]
fn test_filter_nested_path() {
    assert_eq!(
        ids("Student", json!({"teachers.classroom.school.name": "Walkerville Elementary"})),
        vec![1, 2, 3]
    );
}

#[test]
fn test_filter_null_matches_missing() {
    assert_eq!(ids("Teacher", json!({"classroom_id": null})), vec![3]);
}

#[test]
fn test_skip_nones_drops_null_entries() {
    let spec = json!({"classroom_id": null, "name": "Mr. Ruhle"});
    assert_eq!(ids_with("Teacher", spec.clone(), false), Vec::<i64>::new());
    assert_eq!(ids_with("Teacher", spec, true), vec![2]);
}

#[test]
fn test_list_on_to_one_is_membership() {
    assert_eq!(ids("Teacher", json!({"classroom.id": [1, 2]})), vec![1, 2]);
    assert_eq!(ids("Teacher", json!({"name": ["Ms. Bleach", "Mr. Ruhle"]})), vec![2, 3]);
}

#[test]
fn test_list_on_to_many_requires_every_value() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let spec = || FilterSpec::try_from(json!({"students.id": [1, 2]})).unwrap();

    // teacher 2 only has student 1, teacher 3 has 2 and 4
    let session = engine.filter("Teacher", spec(), false).unwrap();
    assert_eq!(matched_ids(&storage, &session), vec![1]);

    storage
        .execute_batch("DELETE FROM teacher_student WHERE teacher_id = 1 AND student_id = 2")
        .unwrap();
    let session = engine.filter("Teacher", spec(), false).unwrap();
    assert_eq!(matched_ids(&storage, &session), Vec::<i64>::new());
}

#[test]
fn test_duplicate_list_values_count_once() {
    assert_eq!(ids("Teacher", json!({"students.id": [2, 4, 2]})), vec![3]);
}

#[test]
fn test_empty_lists() {
    assert_eq!(ids("Teacher", json!({"classroom.id": []})), Vec::<i64>::new());
    // no constraint on a to-many relationship
    assert_eq!(ids("Teacher", json!({"students.id": []})), vec![1, 2, 3]);
}

#[test]
fn test_mapped_alias_filters_like_its_target() {
    assert_eq!(ids("Student", json!({"guardian_number": "555-0202"})), vec![2]);
    assert_eq!(ids("Student", json!({"contact_info.email": "phoebe@school.test"})), vec![4]);
}

#[test]
fn test_filter_existing_session() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();

    let mut session = engine
        .filter("Teacher", FilterSpec::map(vec![("students.id", json!(2))]), false)
        .unwrap();
    session
        .filter(FilterSpec::map(vec![("classroom_id", json!(1))]), false)
        .unwrap();
    assert_eq!(matched_ids(&storage, &session), vec![1]);
}

// =============================================================================
// Tree form
// =============================================================================

#[test]
fn test_or_tree() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let session = engine
        .filter(
            "Teacher",
            or_any(vec![
                path("name").eq("Ms. Frizzle"),
                path("students.name").eq("Phoebe"),
            ]),
            false,
        )
        .unwrap();
    assert_eq!(matched_ids(&storage, &session), vec![1, 3]);
}

#[test]
fn test_tree_comparison_operators() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let session = engine
        .filter(
            "Student",
            path("teachers.id").gt(lit_int(1)).and(path("home_phone").is_not_null()),
            false,
        )
        .unwrap();
    assert_eq!(matched_ids(&storage, &session), vec![1, 2, 4]);
}

fn tree_ids(entity: &str, expr: Expr) -> Vec<i64> {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let session = engine.filter(entity, expr, false).unwrap();
    matched_ids(&storage, &session)
}

#[test]
fn test_tree_functions_over_paths() {
    assert_eq!(tree_ids("Student", lower(path("name")).eq("wanda")), vec![2]);
    assert_eq!(
        tree_ids(
            "Student",
            coalesce(vec![path("phone"), path("home_phone")]).eq("555-0204")
        ),
        vec![4]
    );
    assert_eq!(tree_ids("Student", path("id").gt(raw_sql("2"))), vec![3, 4]);
}

#[test]
fn test_tree_in_subquery() {
    let phoebes_teachers = Query::new()
        .select(vec![col("teacher_id")])
        .from(TableRef::new("teacher_student"))
        .filter(col("student_id").eq(lit_int(4)));
    assert_eq!(tree_ids("Teacher", path("id").in_subquery(phoebes_teachers)), vec![3]);

    let busiest = Query::new()
        .select(vec![max(col("teacher_id"))])
        .from(TableRef::new("teacher_student"));
    assert_eq!(tree_ids("Teacher", path("id").eq(Expr::from(busiest))), vec![3]);
}

#[test]
fn test_tree_correlated_subquery_joins_outer_path() {
    // the subquery reads the outer classroom join
    let room = Query::new().select(vec![path("classroom.name")]);
    assert_eq!(tree_ids("Teacher", Expr::from(room).eq("5A")), vec![2]);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_malformed_values_are_echoed() {
    let engine = Engine::new(school_schema());
    let err = engine
        .filter("Teacher", FilterSpec::map(vec![("students.id", json!([1, {"x": 2}]))]), false)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Malformed filter value for 'students.id': [1,{\"x\":2}]"
    );
}

#[test]
fn test_shaped_mapped_not_filterable() {
    let engine = Engine::new(school_schema());
    let err = engine
        .filter("Student", FilterSpec::map(vec![("phone_numbers", json!("555-0101"))]), false)
        .unwrap_err();
    assert!(matches!(err, Error::Spec(SpecError::FilterOnShapedMapped(_))));
}

#[test]
fn test_unknown_path_is_schema_error() {
    let engine = Engine::new(school_schema());
    let err = engine
        .filter("Teacher", FilterSpec::map(vec![("students.nope", json!(1))]), false)
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));

    let err = engine
        .filter("Teacher", FilterSpec::map(vec![("students", json!(1))]), false)
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn test_skip_nones_rejected_for_trees() {
    let engine = Engine::new(school_schema());
    let err = engine.filter("Teacher", path("name").eq("x"), true).unwrap_err();
    assert!(matches!(err, Error::Spec(SpecError::SkipNonesOnTree)));
}

#[test]
fn test_failed_filter_keeps_session_usable() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let mut session = engine
        .filter("Teacher", FilterSpec::map(vec![("classroom.id", json!([1, 2]))]), false)
        .unwrap();

    let err = session
        .filter(
            FilterSpec::map(vec![("students.id", json!([1, 2])), ("name", json!({"x": 1}))]),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Spec(SpecError::MalformedFilterValue { .. })));
    assert_eq!(session.scope().depth(), None);
    assert_eq!(matched_ids(&storage, &session), vec![1, 2]);

    session
        .filter(FilterSpec::map(vec![("students.id", json!([1, 3]))]), false)
        .unwrap();
    assert_eq!(matched_ids(&storage, &session), vec![1]);
}
