//! Top-level entry points.
//!
//! ```ignore
//! let engine = Engine::new(schema);
//! let opts = engine
//!     .options()
//!     .to_return(&["name", "students(name)"])
//!     .filter_by(FilterSpec::map(vec![("students.id", json!([1, 2]))]))
//!     .limit(10);
//! let docs = engine.serialize(&storage, "Teacher", &opts)?;
//! ```

use serde_json::Value;
use tracing::debug;

use crate::config::{Settings, SettingsError};
use crate::error::Result;
use crate::filter::FilterSpec;
use crate::projection::{
    expand_projection, exposed_paths, load, materialize, paginate, FieldTree, LoadPlan,
};
use crate::schema::{Entity, Schema};
use crate::session::QuerySession;
use crate::sql::{Dialect, OrderByExpr, Query};
use crate::storage::{Storage, StorageError};

// =============================================================================
// Options
// =============================================================================

/// Options for [`Engine::serialize`] and [`Engine::prepare`].
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "options have no effect until passed to serialize() or prepare()"]
pub struct SerializeOptions {
    /// Projection strings; `None` means the entity's default projection.
    pub to_return: Option<Vec<String>>,
    pub filter_by: Option<FilterSpec>,
    /// Ordering terms; attribute paths are allowed via [`crate::sql::path`].
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Skip the exposure filter.
    pub expose_all: bool,
    /// Drop `null` entries of a map filter.
    pub skip_nones: bool,
}

impl SerializeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_return<S: AsRef<str>>(mut self, paths: &[S]) -> Self {
        self.to_return = Some(paths.iter().map(|p| p.as_ref().to_string()).collect());
        self
    }

    pub fn filter_by(mut self, spec: impl Into<FilterSpec>) -> Self {
        self.filter_by = Some(spec.into());
        self
    }

    pub fn order_by(mut self, terms: Vec<OrderByExpr>) -> Self {
        self.order_by = terms;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn expose_all(mut self, expose_all: bool) -> Self {
        self.expose_all = expose_all;
        self
    }

    pub fn skip_nones(mut self, skip_nones: bool) -> Self {
        self.skip_nones = skip_nones;
        self
    }
}

// =============================================================================
// Prepared serialization
// =============================================================================

/// Everything `serialize` needs, compiled without touching storage.
#[derive(Debug, Clone)]
pub struct Prepared<'e> {
    pub entity: &'e Entity,
    /// Expanded, exposure-filtered projection paths.
    pub paths: Vec<String>,
    pub tree: FieldTree,
    pub plan: LoadPlan<'e>,
    /// The paginated root query.
    pub query: Query,
}

impl Prepared<'_> {
    /// Root query SQL for `dialect`.
    pub fn sql(&self, dialect: Dialect) -> String {
        self.query.to_sql(dialect)
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Compiles filters and projections against one schema.
#[derive(Debug, Clone)]
pub struct Engine {
    schema: Schema,
    settings: Settings,
    dialect: Dialect,
}

impl Engine {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            settings: Settings::default(),
            dialect: Dialect::default(),
        }
    }

    /// Apply settings, validating the configured dialect.
    pub fn with_settings(mut self, settings: Settings) -> Result<Self> {
        self.dialect = settings.engine.dialect()?;
        self.settings = settings;
        Ok(self)
    }

    /// Build an engine from settings alone; the schema file is required.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let schema = settings.schema.load()?.ok_or_else(|| {
            SettingsError::InvalidConfig("schema.path is not set".to_string())
        })?;
        Engine::new(schema).with_settings(settings)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Serialize options seeded with the configured defaults.
    pub fn options(&self) -> SerializeOptions {
        SerializeOptions::new()
            .expose_all(self.settings.engine.expose_all)
            .skip_nones(self.settings.engine.skip_nones)
    }

    /// Start a session on `entity` and compile `spec` into it.
    ///
    /// The returned session can take further filters; every call shares the
    /// session's joins.
    pub fn filter(
        &self,
        entity: &str,
        spec: impl Into<FilterSpec>,
        skip_nones: bool,
    ) -> Result<QuerySession<'_>> {
        let root = self.schema.entity(entity)?;
        let mut session = QuerySession::new(&self.schema, root);
        session.filter(spec, skip_nones)?;
        Ok(session)
    }

    /// Compile everything `serialize` would run, without running it.
    pub fn prepare(&self, entity: &str, opts: &SerializeOptions) -> Result<Prepared<'_>> {
        let root = self.schema.entity(entity)?;
        self.prepare_session(QuerySession::new(&self.schema, root), opts)
    }

    /// Like [`Engine::prepare`], but pages over an already filtered session.
    ///
    /// `opts.filter_by` is compiled into the session after its own filters,
    /// so both share joins.
    pub fn prepare_session<'e>(
        &'e self,
        mut session: QuerySession<'e>,
        opts: &SerializeOptions,
    ) -> Result<Prepared<'e>> {
        let root = self.schema.entity(&session.root().name)?;
        let requested = opts
            .to_return
            .clone()
            .unwrap_or_else(|| root.default_projection.clone());

        let mut paths = expand_projection(&self.schema, root, &requested)?;
        if !opts.expose_all {
            paths = exposed_paths(&self.schema, root, paths)?;
        }
        let tree = FieldTree::from_paths(&paths);
        let plan = LoadPlan::new(&self.schema, root, &paths)?;

        if let Some(spec) = &opts.filter_by {
            session.filter(spec.clone(), opts.skip_nones)?;
        }
        let query = paginate(
            session,
            &opts.order_by,
            opts.limit,
            opts.offset,
            &plan.root().columns,
        )?;
        debug!(entity = %root.name, sql = %query.to_sql(self.dialect), "prepared root query");

        Ok(Prepared {
            entity: root,
            paths,
            tree,
            plan,
            query,
        })
    }

    /// Filter, page and load `entity`, returning one document per root row.
    pub fn serialize<S: Storage + ?Sized>(
        &self,
        storage: &S,
        entity: &str,
        opts: &SerializeOptions,
    ) -> Result<Vec<Value>> {
        self.check_dialect(storage)?;
        let prepared = self.prepare(entity, opts)?;
        self.run(storage, &prepared)
    }

    /// Page and load the root rows matched by `session`.
    pub fn serialize_session<'e, S: Storage + ?Sized>(
        &'e self,
        storage: &S,
        session: QuerySession<'e>,
        opts: &SerializeOptions,
    ) -> Result<Vec<Value>> {
        self.check_dialect(storage)?;
        let prepared = self.prepare_session(session, opts)?;
        self.run(storage, &prepared)
    }

    fn run<S: Storage + ?Sized>(&self, storage: &S, prepared: &Prepared<'_>) -> Result<Vec<Value>> {
        let records = load(storage, &prepared.plan, &prepared.query)?;
        records
            .iter()
            .map(|r| materialize(&self.schema, prepared.entity, r, &prepared.tree))
            .collect()
    }

    /// The configured dialect must be the one the storage executes.
    fn check_dialect<S: Storage + ?Sized>(&self, storage: &S) -> Result<()> {
        let expected = storage.dialect();
        if expected != self.dialect {
            return Err(StorageError::DialectMismatch {
                engine: self.dialect,
                storage: expected,
            }
            .into());
        }
        Ok(())
    }
}
