//! Tracing setup: stdout plus an optional append-only log file

use crate::settings::SettingsError;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parse a configured level name
pub fn parse_level(level: &str) -> Result<Level, SettingsError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(SettingsError::Invalid(format!("unsupported log level {:?}", other))),
    }
}

/// Default directives for our crates when `RUST_LOG` is unset
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("cloudreve_cli={level},cloudreve_client={level}")
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`. When `file` is given, records are also
/// appended there without ANSI colours.
pub fn init(level: Level, file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let file_layer = match file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("debug", Level::DEBUG)]
    #[case("INFO", Level::INFO)]
    #[case("warn", Level::WARN)]
    #[case("warning", Level::WARN)]
    #[case(" error ", Level::ERROR)]
    fn test_parse_level(#[case] name: &str, #[case] expected: Level) {
        assert_eq!(parse_level(name).unwrap(), expected);
    }

    #[test]
    fn test_parse_level_rejects_unknown() {
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(Level::WARN),
            "cloudreve_cli=warn,cloudreve_client=warn"
        );
    }
}
