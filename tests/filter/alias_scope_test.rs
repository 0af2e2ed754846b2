//! AND/OR scoping of joins over to-many relationships.

#[path = "../common/mod.rs"]
mod common;

use common::{init_tracing, matched_ids, school_schema, school_storage};
use dotquery::prelude::*;
use serde_json::json;

#[test]
fn test_and_siblings_match_different_rows() {
    init_tracing();
    let engine = Engine::new(school_schema());
    let storage = school_storage();

    // a shared join would need one student named both Arnold and Wanda
    let session = engine
        .filter(
            "Teacher",
            and_all(vec![
                path("students.name").eq("Arnold"),
                path("students.name").eq("Wanda"),
            ]),
            false,
        )
        .unwrap();
    assert_eq!(session.aliases().len(), 2);
    assert_eq!(matched_ids(&storage, &session), vec![1]);
}

#[test]
fn test_or_siblings_share_a_join() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let session = engine
        .filter(
            "Teacher",
            or_any(vec![
                path("students.name").eq("Carlos"),
                path("students.name").eq("Phoebe"),
            ]),
            false,
        )
        .unwrap();
    assert_eq!(session.aliases().keys(), vec!["teacher.students"]);
    assert_eq!(matched_ids(&storage, &session), vec![1, 3]);
}

#[test]
fn test_and_groups_nested_in_or() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();
    let session = engine
        .filter(
            "Teacher",
            or_any(vec![
                and_all(vec![
                    path("students.name").eq("Arnold"),
                    path("students.name").eq("Carlos"),
                ]),
                and_all(vec![
                    path("students.name").eq("Wanda"),
                    path("students.name").eq("Phoebe"),
                ]),
            ]),
            false,
        )
        .unwrap();
    assert_eq!(matched_ids(&storage, &session), vec![1, 3]);
}

#[test]
fn test_map_entries_on_one_chain_share_a_row() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();

    let session = engine
        .filter(
            "Teacher",
            FilterSpec::map(vec![
                ("students.name", json!("Arnold")),
                ("students.email", json!("arnold@school.test")),
            ]),
            false,
        )
        .unwrap();
    assert_eq!(matched_ids(&storage, &session), vec![1, 2]);

    let session = engine
        .filter(
            "Teacher",
            FilterSpec::map(vec![
                ("students.name", json!("Arnold")),
                ("students.email", json!("wanda@school.test")),
            ]),
            false,
        )
        .unwrap();
    assert_eq!(matched_ids(&storage, &session), Vec::<i64>::new());
}

#[test]
fn test_separate_filter_calls_join_independently() {
    let engine = Engine::new(school_schema());
    let storage = school_storage();

    let mut session = engine
        .filter("Teacher", FilterSpec::map(vec![("students.name", json!("Arnold"))]), false)
        .unwrap();
    session
        .filter(FilterSpec::map(vec![("students.name", json!("Wanda"))]), false)
        .unwrap();
    assert_eq!(session.aliases().len(), 2);
    assert_eq!(matched_ids(&storage, &session), vec![1]);
}

#[test]
fn test_resolve_is_idempotent_within_a_session() {
    let schema = school_schema();
    let teacher = schema.entity("Teacher").unwrap();
    let mut session = QuerySession::new(&schema, teacher);

    let first = session.resolve("classroom.school.name").unwrap();
    let joins = session.query().joins.len();
    let second = session.resolve("classroom.school.name").unwrap();

    assert_eq!(first, second);
    assert_eq!(session.query().joins.len(), joins);
    assert_eq!(
        session.aliases().keys(),
        vec!["teacher.classroom", "teacher.classroom.school"]
    );
}

#[test]
fn test_to_one_paths_never_fork() {
    let engine = Engine::new(school_schema());
    let session = engine
        .filter(
            "Teacher",
            and_all(vec![
                path("classroom.name").eq("4B"),
                path("classroom.school.name").eq("Walkerville Elementary"),
            ]),
            false,
        )
        .unwrap();
    assert_eq!(
        session.aliases().keys(),
        vec!["teacher.classroom", "teacher.classroom.school"]
    );
}
