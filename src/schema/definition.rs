//! Serde-facing entity definitions.
//!
//! ```toml
//! [[entity]]
//! name = "Teacher"
//! table = "teacher"
//! primary_key = "id"
//! columns = ["name", { name = "classroom_id", references = "Classroom.id" }]
//! default_projection = ["name", "students(name)"]
//!
//! [[entity.relationship]]
//! name = "students"
//! target = "Student"
//! cardinality = "many"
//! local_key = "id"
//! remote_key = "id"
//! through = { table = "teacher_student", local_column = "teacher_id", remote_column = "student_id" }
//!
//! [entity.mapped]
//! contact = { phone = "phone", email = "email" }
//! ```

use serde::{Deserialize, Serialize};

use super::{Association, Cardinality, Column, Entity, MapTarget, Relationship, Schema};
use crate::error::{SchemaError, SchemaResult};

/// Root of a definitions file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SchemaDef {
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityDef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntityDef {
    pub name: String,
    pub table: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default, rename = "relationship")]
    pub relationships: Vec<RelationshipDef>,
    #[serde(default)]
    pub mapped: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub default_projection: Vec<String>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// A column is either a bare name or a table with flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColumnDef {
    Name(String),
    Full {
        name: String,
        exposed: Option<bool>,
        /// `"Entity.column"`
        references: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelationshipDef {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub local_key: String,
    pub remote_key: String,
    pub through: Option<Association>,
    pub remap_by: Option<String>,
    #[serde(default = "default_true")]
    pub exposed: bool,
}

fn default_true() -> bool {
    true
}

impl SchemaDef {
    /// Convert into a validated [`Schema`].
    pub fn into_schema(self) -> SchemaResult<Schema> {
        let entities = self
            .entities
            .into_iter()
            .map(EntityDef::into_entity)
            .collect::<SchemaResult<Vec<_>>>()?;
        Schema::new(entities)
    }
}

impl EntityDef {
    fn into_entity(self) -> SchemaResult<Entity> {
        let table = self.table.unwrap_or_else(|| self.name.to_lowercase());
        let mut entity = Entity::new(&self.name, &table, &self.primary_key);

        for def in self.columns {
            entity = entity.column(def.into_column(&self.name)?);
        }

        for def in self.relationships {
            entity = entity.relationship(Relationship {
                name: def.name,
                target: def.target,
                cardinality: def.cardinality,
                local_key: def.local_key,
                remote_key: def.remote_key,
                association: def.through,
                remap_by: def.remap_by,
                exposed: def.exposed,
            });
        }

        for (name, value) in self.mapped {
            let target = MapTarget::try_from(value).map_err(|reason| SchemaError::MalformedMapped {
                entity: self.name.clone(),
                name: name.clone(),
                reason,
            })?;
            entity = entity.mapped(&name, target);
        }

        if !self.default_projection.is_empty() {
            entity.default_projection = self.default_projection;
        }
        Ok(entity)
    }
}

impl ColumnDef {
    fn into_column(self, entity: &str) -> SchemaResult<Column> {
        match self {
            ColumnDef::Name(name) => Ok(Column::new(&name)),
            ColumnDef::Full {
                name,
                exposed,
                references,
            } => {
                let mut column = Column::new(&name);
                column.exposed = exposed;
                if let Some(reference) = references {
                    let (target, target_column) =
                        reference.split_once('.').ok_or_else(|| {
                            SchemaError::Parse(format!(
                                "column '{}.{}' references '{}'; expected 'Entity.column'",
                                entity, name, reference
                            ))
                        })?;
                    column = column.references(target, target_column);
                }
                Ok(column)
            }
        }
    }
}
