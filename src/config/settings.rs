//! TOML-based configuration for dotquery.
//!
//! Supports a config file (dotquery.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [engine]
//! dialect = "sqlite"
//! expose_all = false
//! skip_nones = false
//!
//! [storage]
//! path = "${DATA_DIR}/school.db"
//!
//! [schema]
//! path = "schema.toml"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::Schema;
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Engine defaults.
    pub engine: EngineSettings,

    /// Storage location.
    pub storage: StorageSettings,

    /// Entity definitions file.
    pub schema: SchemaSettings,
}

/// Engine defaults applied to every serialize call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// SQL dialect name (sqlite, postgres, duckdb).
    pub dialect: String,

    /// Skip the exposure filter by default.
    pub expose_all: bool,

    /// Drop `null` map-filter entries by default.
    pub skip_nones: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            dialect: "sqlite".to_string(),
            expose_all: false,
            skip_nones: false,
        }
    }
}

impl EngineSettings {
    /// Get the dialect.
    pub fn dialect(&self) -> Result<Dialect, SettingsError> {
        self.dialect.parse().map_err(SettingsError::InvalidConfig)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database path (supports ${ENV_VAR} expansion, ":memory:" for in-memory).
    pub path: Option<String>,
}

impl StorageSettings {
    /// Get the database path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<String>, SettingsError> {
        self.path.as_deref().map(expand_env_vars).transpose()
    }
}

/// Schema configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Path to a TOML (or `.json`) entity definitions file.
    pub path: Option<String>,
}

impl SchemaSettings {
    /// Load the configured schema, if any.
    pub fn load(&self) -> crate::Result<Option<Schema>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let path = PathBuf::from(expand_env_vars(path)?);
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path).into());
        }
        let content = fs::read_to_string(&path).map_err(SettingsError::from)?;
        let schema = if path.extension().is_some_and(|ext| ext == "json") {
            Schema::from_json_str(&content)?
        } else {
            Schema::from_toml_str(&content)?
        };
        Ok(Some(schema))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.engine.dialect()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DOTQUERY_CONFIG`
    /// 2. `./dotquery.toml`
    /// 3. `~/.config/dotquery/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("DOTQUERY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("dotquery.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dotquery").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // lone '$'
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
