//! # Cloudreve CLI
//!
//! Command-line front end for [`cloudreve_client`].
//!
//! - **Settings**: `config.yml` (YAML) with `CLOUDREVE__*` environment
//!   overrides, reloaded when the file changes
//! - **Logging**: tracing to stdout and an optional log file
//! - **Commands**: whoami, profile, ls, get, put, mv, cp, and an
//!   interactive shell

pub mod commands;
pub mod logging;
pub mod settings;
pub mod shell;

pub use commands::{Command, Session};
pub use settings::{Settings, SettingsError, SettingsWatcher};
