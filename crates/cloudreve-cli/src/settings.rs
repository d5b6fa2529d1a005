//! CLI settings: YAML file plus environment overrides, with hot reload

use cloudreve_client::{ClientConfig, Credentials};
use config::{Config, Environment, File, FileFormat};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Settings errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("failed to watch settings file: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Account used for login
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSettings {
    pub user: String,
    pub password: String,
    pub captcha: String,
}

/// Log output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// debug, info, warn (or warning), error
    pub level: String,
    /// Optional log file, relative paths resolve against the settings file
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Everything read from `config.yml`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Service base URL with scheme, host and port
    pub address: String,
    pub login: LoginSettings,
    pub log: LogSettings,
    /// Local directories; the first one is the default download target
    pub path: Vec<PathBuf>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            address: String::new(),
            login: LoginSettings::default(),
            log: LogSettings::default(),
            path: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load from a YAML file, then apply `CLOUDREVE__SECTION__KEY` variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Yaml).required(true))
            .add_source(
                Environment::with_prefix("CLOUDREVE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.address.is_empty() {
            return Err(SettingsError::Invalid("address is not set".to_string()));
        }
        url::Url::parse(&self.address)
            .map_err(|e| SettingsError::Invalid(format!("address {:?}: {}", self.address, e)))?;
        crate::logging::parse_level(&self.log.level)?;
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.address).with_timeout(Duration::from_secs(self.timeout_secs.max(1)))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.login.user, &self.login.password).with_captcha(&self.login.captcha)
    }

    /// Where downloads go when no destination is given
    pub fn download_dir(&self) -> PathBuf {
        self.path.first().cloned().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Log file resolved against the directory holding the settings file
    pub fn log_file(&self, settings_path: &Path) -> Option<PathBuf> {
        let file = self.log.file.as_ref()?;
        if file.is_absolute() {
            return Some(file.clone());
        }
        let dir = settings_path.parent().unwrap_or_else(|| Path::new("."));
        Some(dir.join(file))
    }

    /// Whether a client built from `other` would talk to a different account
    pub fn connection_changed(&self, other: &Settings) -> bool {
        self.address != other.address || self.login != other.login || self.timeout_secs != other.timeout_secs
    }
}

/// Keeps a [`Settings`] value in sync with its file.
///
/// A reload that fails to parse or validate is logged and the previous
/// settings stay in place.
pub struct SettingsWatcher {
    path: PathBuf,
    current: Arc<RwLock<Settings>>,
    generation: Arc<AtomicU64>,
    _watcher: RecommendedWatcher,
}

impl SettingsWatcher {
    /// Load `path` and start watching it
    pub fn start(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let initial = Settings::load(path.as_ref())?;
        let path = std::fs::canonicalize(path.as_ref())?;

        let current = Arc::new(RwLock::new(initial));
        let generation = Arc::new(AtomicU64::new(0));
        let file_name = path.file_name().map(|n| n.to_os_string());

        let handler = {
            let current = Arc::clone(&current);
            let generation = Arc::clone(&generation);
            let path = path.clone();
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "settings watch error");
                        return;
                    }
                };

                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                if !event.paths.iter().any(|p| p.file_name() == file_name.as_deref()) {
                    return;
                }

                match Settings::load(&path) {
                    Ok(settings) => {
                        if *current.read() != settings {
                            *current.write() = settings;
                            generation.fetch_add(1, Ordering::SeqCst);
                            info!(path = %path.display(), "settings reloaded");
                        }
                    }
                    Err(e) => error!(path = %path.display(), error = %e, "settings reload failed, keeping previous"),
                }
            }
        };

        let mut watcher = notify::recommended_watcher(handler)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            path,
            current,
            generation,
            _watcher: watcher,
        })
    }

    /// Snapshot of the latest good settings
    pub fn current(&self) -> Settings {
        self.current.read().clone()
    }

    /// Bumped on every applied reload
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
