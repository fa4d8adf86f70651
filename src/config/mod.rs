//! Configuration.
//!
//! Handles the project config file, environment variable expansion, and
//! run settings.

mod settings;

pub use settings::{
    expand_env_vars, ConnectionSettings, RunSettings, Settings, SettingsError,
};
