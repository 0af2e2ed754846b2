//! Shared school fixture: schema, DDL and rows.

#![allow(dead_code)]

use dotquery::prelude::*;
use serde_json::Value;

pub const DDL: &str = "
CREATE TABLE school (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
CREATE TABLE classroom (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    school_id INTEGER REFERENCES school(id)
);
CREATE TABLE teacher (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    classroom_id INTEGER REFERENCES classroom(id)
);
CREATE TABLE student (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    phone TEXT,
    home_phone TEXT,
    email TEXT,
    address TEXT
);
CREATE TABLE teacher_student (
    teacher_id INTEGER REFERENCES teacher(id),
    student_id INTEGER REFERENCES student(id)
);
";

pub const DATA: &str = "
INSERT INTO school VALUES (1, 'Walkerville Elementary'), (2, 'Eastside');
INSERT INTO classroom VALUES (1, '4B', 1), (2, '5A', 1), (3, '6C', 2);
INSERT INTO teacher VALUES (1, 'Ms. Frizzle', 1), (2, 'Mr. Ruhle', 2), (3, 'Ms. Bleach', NULL);
INSERT INTO student VALUES
    (1, 'Arnold', '555-0101', '555-0201', 'arnold@school.test', '1 Elm St'),
    (2, 'Wanda', '555-0102', '555-0202', 'wanda@school.test', '2 Elm St'),
    (3, 'Carlos', '555-0103', NULL, 'carlos@school.test', '3 Elm St'),
    (4, 'Phoebe', NULL, '555-0204', 'phoebe@school.test', '4 Elm St');
INSERT INTO teacher_student VALUES (1, 1), (1, 2), (1, 3), (2, 1), (3, 2), (3, 4);
";

/// School → classrooms → teacher → students.
pub fn school_schema() -> Schema {
    Schema::new(vec![
        Entity::new("School", "school", "id")
            .column(Column::new("id").exposed(true))
            .columns(&["name"])
            .relationship(Relationship::to_many("classrooms", "Classroom", "id", "school_id"))
            .relationship(
                Relationship::to_many("classrooms_by_name", "Classroom", "id", "school_id")
                    .remap_by("name"),
            )
            .default_projection(&["id", "name"]),
        Entity::new("Classroom", "classroom", "id")
            .columns(&["name"])
            .column(Column::new("school_id").references("School", "id"))
            .relationship(Relationship::to_one("school", "School", "school_id", "id"))
            .relationship(Relationship::to_one("teacher", "Teacher", "id", "classroom_id"))
            .mapped("teacher_name", MapTarget::path("teacher.name"))
            .default_projection(&["name", "teacher.*"]),
        Entity::new("Teacher", "teacher", "id")
            .columns(&["name"])
            .column(Column::new("classroom_id").references("Classroom", "id"))
            .relationship(Relationship::to_one("classroom", "Classroom", "classroom_id", "id"))
            .relationship(
                Relationship::to_many("students", "Student", "id", "id")
                    .through("teacher_student", "teacher_id", "student_id"),
            )
            .default_projection(&["name", "students(name)"]),
        Entity::new("Student", "student", "id")
            .columns(&["name", "phone", "home_phone", "email"])
            .column(Column::new("address").hidden())
            .relationship(
                Relationship::to_many("teachers", "Teacher", "id", "id")
                    .through("teacher_student", "student_id", "teacher_id"),
            )
            .mapped(
                "contact_info",
                MapTarget::dict(vec![
                    ("phone", MapTarget::path("phone")),
                    ("home_phone", MapTarget::path("home_phone")),
                    ("email", MapTarget::path("email")),
                ]),
            )
            .mapped(
                "phone_numbers",
                MapTarget::list(vec![MapTarget::path("phone"), MapTarget::path("home_phone")]),
            )
            .mapped("guardian_number", MapTarget::path("home_phone"))
            .default_projection(&["name", "email"]),
    ])
    .unwrap()
}

/// In-memory database loaded with the fixture rows.
pub fn school_storage() -> SqliteStorage {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.execute_batch(DDL).unwrap();
    storage.execute_batch(DATA).unwrap();
    storage
}

/// Root ids matched by a session, sorted.
pub fn matched_ids(storage: &SqliteStorage, session: &QuerySession<'_>) -> Vec<i64> {
    let mut ids: Vec<i64> = storage
        .fetch(session.query())
        .unwrap()
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();
    ids
}

/// Install a fmt subscriber once so `RUST_LOG`-style output shows in failures.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
