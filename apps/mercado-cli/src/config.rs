//! # Application Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Command-line flags (highest priority)                              │
//! │     --db ./mercado.db                                                  │
//! │                                                                         │
//! │  2. Environment Variables                                              │
//! │     MERCADO_DB_PATH=/srv/mercado/mercado.db                            │
//! │     MERCADO_SHORTAGE_POLICY=strict                                     │
//! │                                                                         │
//! │  3. TOML Config File (--config, or the platform default)               │
//! │     ~/.config/mercado/mercado.toml (Linux)                             │
//! │     ~/Library/Application Support/br.mercado.mercado/mercado.toml      │
//! │                                                                         │
//! │  4. Default Values (lowest priority)                                   │
//! │     backorder, pix, 600 s idle timeout                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # mercado.toml
//! store_name = "Mercado Central"
//! database_path = "/srv/mercado/mercado.db"
//! shortage_policy = "strict"        # strict | backorder
//! default_payment_method = "pix"    # pix | credit_card | debit_card | boleto
//! session_idle_timeout_secs = 600
//! max_connections = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use directories::ProjectDirs;
use mercado_core::{PaymentMethod, ShortagePolicy, DEFAULT_SESSION_IDLE_SECS};

use crate::error::{ConfigError, ConfigResult};

const CONFIG_FILE: &str = "mercado.toml";
const DATABASE_FILE: &str = "mercado.db";
const SESSIONS_FILE: &str = "sessions.json";

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Display name used in command output.
    #[serde(default = "default_store_name")]
    pub store_name: String,

    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Session file. Defaults next to the database.
    #[serde(default)]
    pub sessions_path: Option<PathBuf>,

    /// What checkout does when a line exceeds stock.
    #[serde(default)]
    pub shortage_policy: ShortagePolicy,

    /// Used when neither the request nor the customer names a method.
    #[serde(default)]
    pub default_payment_method: PaymentMethod,

    /// Sessions idle longer than this are dropped with their cart.
    #[serde(default = "default_idle_timeout")]
    pub session_idle_timeout_secs: u64,

    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_store_name() -> String {
    "Mercado".to_string()
}

fn default_idle_timeout() -> u64 {
    DEFAULT_SESSION_IDLE_SECS as u64
}

fn default_max_connections() -> u32 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            store_name: default_store_name(),
            database_path: None,
            sessions_path: None,
            shortage_policy: ShortagePolicy::default(),
            default_payment_method: PaymentMethod::default(),
            session_idle_timeout_secs: default_idle_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (mercado.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file. Returns the path written.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoDirectory)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(path)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.store_name.trim().is_empty() {
            return Err(ConfigError::Invalid("store_name must not be empty".into()));
        }
        if self.session_idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "session_idle_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }
        if let Some(ref path) = self.database_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("database_path must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Applies `MERCADO_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides read through `var`. Unparseable values are ignored
    /// with a warning.
    pub fn apply_overrides_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("MERCADO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database_path = Some(PathBuf::from(path));
        }

        if let Some(path) = var("MERCADO_SESSIONS_PATH") {
            self.sessions_path = Some(PathBuf::from(path));
        }

        if let Some(name) = var("MERCADO_STORE_NAME") {
            self.store_name = name;
        }

        if let Some(policy) = var("MERCADO_SHORTAGE_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding shortage policy from environment");
                    self.shortage_policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown shortage policy in environment"),
            }
        }

        if let Some(method) = var("MERCADO_DEFAULT_PAYMENT_METHOD") {
            match method.parse() {
                Ok(parsed) => self.default_payment_method = parsed,
                Err(_) => warn!(method = %method, "Unknown payment method in environment"),
            }
        }

        if let Some(secs) = var("MERCADO_SESSION_IDLE_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.session_idle_timeout_secs = s;
            }
        }

        if let Some(max) = var("MERCADO_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse::<u32>() {
                self.max_connections = m;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    // =========================================================================
    // Resolved Paths
    // =========================================================================

    /// The database file, creating the platform data directory if needed.
    ///
    /// ## Platform-Specific Paths
    /// - **macOS**: `~/Library/Application Support/br.mercado.mercado/mercado.db`
    /// - **Windows**: `%APPDATA%\mercado\mercado\data\mercado.db`
    /// - **Linux**: `~/.local/share/mercado/mercado.db`
    pub fn resolved_database_path(&self) -> ConfigResult<PathBuf> {
        if let Some(ref path) = self.database_path {
            return Ok(path.clone());
        }
        Ok(data_dir()?.join(DATABASE_FILE))
    }

    /// The session file: explicit path, else beside the database.
    pub fn resolved_sessions_path(&self) -> ConfigResult<PathBuf> {
        if let Some(ref path) = self.sessions_path {
            return Ok(path.clone());
        }
        let db_path = self.resolved_database_path()?;
        Ok(match db_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(SESSIONS_FILE),
            _ => PathBuf::from(SESSIONS_FILE),
        })
    }

    pub fn session_idle_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_idle_timeout_secs.min(i64::MAX as u64) as i64)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("br", "mercado", "mercado")
}

fn data_dir() -> ConfigResult<PathBuf> {
    let dirs = project_dirs().ok_or(ConfigError::NoDirectory)?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.to_path_buf())
}
