// Configuration loading and parsing (client.toml).

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Backend used when running against a local development server.
pub const LOCAL_BASE_URL: &str = "http://127.0.0.1:8000";

/// Backend used by the published site.
pub const DEPLOYED_BASE_URL: &str = "https://ai-spec-driven-book-backend.up.railway.app";

/// Path prefix shared by every backend route.
pub const API_VERSION_PREFIX: &str = "/api/v1";

/// Environment variable that overrides `api.environment`.
pub const ENV_OVERRIDE_VAR: &str = "BOOKSHELF_ENV";

const CONFIG_FILE: &str = "client.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why `client.toml` could not be turned into a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no client config at {}", .path.display())]
    Missing { path: PathBuf },

    #[error("{} is not valid TOML: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("`{field}` {message}")]
    Invalid { field: &'static str, message: String },

    #[error("unknown environment `{0}` (expected `local` or `deployed`)")]
    UnknownEnvironment(String),

    /// Writing the shipped default into `config/` failed.
    #[error("could not seed {} from defaults: {source}", .path.display())]
    Seed {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Which backend deployment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Deployed,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Local => LOCAL_BASE_URL,
            Environment::Deployed => DEPLOYED_BASE_URL,
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "localhost" | "dev" => Ok(Environment::Local),
            "deployed" | "production" | "prod" => Ok(Environment::Deployed),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Local => write!(f, "local"),
            Environment::Deployed => write!(f, "deployed"),
        }
    }
}

// ---------------------------------------------------------------------------
// client.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
}

/// Raw deserialization target for the entire client.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ClientFile {
    api: ApiConfig,
    storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub environment: Environment,
    /// Explicit backend URL. Takes precedence over `environment` when set.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// The backend root every endpoint path is appended to, without a
    /// trailing slash.
    pub fn resolved_base_url(&self) -> String {
        let url = match &self.base_url {
            Some(url) if !url.trim().is_empty() => url.trim(),
            _ => self.environment.base_url(),
        };
        url.trim_end_matches('/').to_string()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the persisted session token. Relative paths are
    /// resolved against the data directory.
    pub path: String,
}

impl StorageConfig {
    /// Resolve the database path. `":memory:"` and absolute paths are kept
    /// as-is; relative paths land under `data_dir`.
    pub fn resolve_path(&self, data_dir: &Path) -> String {
        if self.path == ":memory:" || Path::new(&self.path).is_absolute() {
            self.path.clone()
        } else {
            data_dir.join(&self.path).to_string_lossy().into_owned()
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/client.toml` relative to `base_dir`.
///
/// Does not copy defaults and does not consult the process environment.
/// Prefer `load_config()` which does both.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: ClientFile = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        api: file.api,
        storage: file.storage,
    };

    validate(&config)?;

    Ok(config)
}

/// Apply the `BOOKSHELF_ENV` override, if one was supplied.
pub fn apply_env_override(mut config: Config, value: Option<&str>) -> Result<Config, ConfigError> {
    if let Some(raw) = value.filter(|v| !v.trim().is_empty()) {
        config.api.environment = raw.parse()?;
    }
    Ok(config)
}

/// First-run setup: if `config/client.toml` is absent but
/// `defaults/client.toml` ships alongside, copy it into place. Returns the
/// path written, or `None` when nothing had to be done. An existing config
/// is never touched.
pub fn seed_config(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let shipped = base_dir.join("defaults").join(CONFIG_FILE);
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.exists() || !shipped.is_file() {
        return Ok(None);
    }

    let seed_err = |source| ConfigError::Seed {
        path: target.clone(),
        source,
    };
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(seed_err)?;
    }
    // create_new so a config written concurrently by another process wins.
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(seed_err(e)),
    };
    let mut src = std::fs::File::open(&shipped).map_err(seed_err)?;
    std::io::copy(&mut src, &mut dest).map_err(seed_err)?;

    info!("seeded {} from defaults", target.display());
    Ok(Some(target))
}

/// Convenience wrapper: loads config relative to `base_dir`, copying
/// defaults first and honoring `BOOKSHELF_ENV`.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    seed_config(base_dir)?;
    let config = load_config_from(base_dir)?;
    let env_value = std::env::var(ENV_OVERRIDE_VAR).ok();
    apply_env_override(config, env_value.as_deref())
}

/// Per-user data directory (database, logs). Falls back to `./.bookshelf`
/// when the platform has no home directory.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "bookshelf")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".bookshelf"))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::Missing {
        path: path.to_path_buf(),
    })
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.api.timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "api.timeout_secs",
            message: "must be greater than 0".into(),
        });
    }

    if let Some(url) = &config.api.base_url {
        let url = url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "api.base_url",
                message: format!("must start with http:// or https://, got `{url}`"),
            });
        }
    }

    if config.storage.path.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: "storage.path",
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
