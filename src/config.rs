use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_BACKEND: &str = "BUDGETRACK_BACKEND";
pub const ENV_DB: &str = "BUDGETRACK_DB";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "BUDGETRACK_REQUEST_TIMEOUT_MS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "BUDGETRACK_BUSY_TIMEOUT_MS";
pub const ENV_LOG: &str = "BUDGETRACK_LOG";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_LOG_FILTER: &str = "budgetrack=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: unknown backend {value:?} (expected \"sqlite\" or \"document\")")]
    UnknownBackend { var: &'static str, value: String },
    #[error("{var}: expected a number of milliseconds, got {value:?}")]
    InvalidDuration { var: &'static str, value: String },
    #[error("could not determine data directory")]
    NoDataDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    /// In-memory document collections; nothing survives the process.
    Document,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sql" | "relational" => Some(Self::Sqlite),
            "document" | "doc" | "memory" => Some(Self::Document),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    /// `None` means the platform data directory.
    pub database_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub busy_timeout: Duration,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            database_path: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get(ENV_BACKEND) {
            config.backend = BackendKind::parse(&value).ok_or(ConfigError::UnknownBackend {
                var: ENV_BACKEND,
                value,
            })?;
        }
        if let Some(path) = get(ENV_DB) {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Some(value) = get(ENV_REQUEST_TIMEOUT_MS) {
            config.request_timeout = parse_millis(ENV_REQUEST_TIMEOUT_MS, value)?;
        }
        if let Some(value) = get(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout = parse_millis(ENV_BUSY_TIMEOUT_MS, value)?;
        }
        if let Some(filter) = get(ENV_LOG) {
            config.log_filter = filter;
        }
        Ok(config)
    }

    /// The configured database path, or `budgetrack.db` in the platform data
    /// directory (created if missing).
    pub fn resolve_database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let proj_dirs = directories::ProjectDirs::from("com", "budgetrack", "budgetrack")
            .ok_or(ConfigError::NoDataDir)?;
        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|_| ConfigError::NoDataDir)?;
        Ok(data_dir.join("budgetrack.db"))
    }
}

fn parse_millis(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(_) => Err(ConfigError::InvalidDuration { var, value }),
    }
}
