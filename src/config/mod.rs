//! Configuration module for dotquery.
//!
//! Handles engine defaults, storage location and environment variables.

mod settings;

pub use settings::{
    expand_env_vars, EngineSettings, SchemaSettings, Settings, SettingsError, StorageSettings,
};
