//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file, overridden by environment
//! variables, overridden in turn by command-line flags (applied by the binary).
//!
//! # Root folder priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`ARKLA_ROOT`)
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! The root folder holds `arkla.db`, `uploads/` and `output/`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "ARKLA_ROOT";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "ARKLA_CONFIG";

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArklaConfig {
    /// Root folder (optional; see module docs for resolution order)
    pub root_folder: Option<PathBuf>,

    /// Bind address
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// `development` or `production`; production hides internal error details
    pub environment: String,

    /// Maximum accepted upload size in bytes
    pub max_file_size: usize,

    /// Allowed CORS origins; `"*"` allows any origin
    pub cors_origins: Vec<String>,

    pub logging: LoggingConfig,

    pub gemini: GeminiConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error or a full EnvFilter string).
    /// `RUST_LOG` wins when set.
    pub level: Option<String>,
}

/// Gemini API configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key (env `GOOGLE_API_KEY`)
    pub api_key: Option<String>,

    /// Model name, e.g. `gemini-2.5-flash`
    pub model: String,

    /// API base URL (without the `/v1beta` suffix)
    pub base_url: String,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// Extra attempts after the first failure
    pub max_retries: u32,

    /// Backoff before the first retry; doubles per attempt
    pub initial_retry_delay_secs: u64,

    /// Backoff ceiling
    pub max_retry_delay_secs: u64,

    /// Wait after an HTTP 429
    pub rate_limit_delay_secs: u64,

    /// Estimated spend allowed per UTC day; 0 disables the check
    pub daily_cost_limit_usd: f64,

    /// Suggest Kode Arsip candidates from master data after extraction
    pub kode_matching_enabled: bool,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("initial_retry_delay_secs", &self.initial_retry_delay_secs)
            .field("max_retry_delay_secs", &self.max_retry_delay_secs)
            .field("rate_limit_delay_secs", &self.rate_limit_delay_secs)
            .field("daily_cost_limit_usd", &self.daily_cost_limit_usd)
            .field("kode_matching_enabled", &self.kode_matching_enabled)
            .finish()
    }
}

impl Default for ArklaConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: "development".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            cors_origins: vec!["*".to_string()],
            logging: LoggingConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 120,
            max_retries: 3,
            initial_retry_delay_secs: 2,
            max_retry_delay_secs: 32,
            rate_limit_delay_secs: 60,
            daily_cost_limit_usd: 10.0,
            kode_matching_enabled: false,
        }
    }
}

impl GeminiConfig {
    /// A non-blank API key is present
    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff before retry number `attempt` (0-based), capped at the maximum
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let secs = self
            .initial_retry_delay_secs
            .saturating_mul(factor)
            .min(self.max_retry_delay_secs);
        Duration::from_secs(secs)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit_delay_secs)
    }
}

impl ArklaConfig {
    /// Parse configuration from TOML text (missing keys take defaults)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration: TOML file (if any) then environment overrides
    ///
    /// An explicitly given path must exist; the default path is optional.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::read_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::read_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&content)
    }

    /// Apply environment variable overrides
    ///
    /// Unparsable numeric values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ARKLA_HOST") {
            self.host = host;
        }
        if let Some(port) = env_parse::<u16>("ARKLA_PORT") {
            self.port = port;
        }
        if let Ok(environment) = std::env::var("ENVIRONMENT") {
            self.environment = environment;
        }
        if let Some(size) = env_parse::<usize>("ARKLA_MAX_FILE_SIZE") {
            self.max_file_size = size;
        }
        if let Ok(origins) = std::env::var("ARKLA_CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            if !key.trim().is_empty() {
                self.gemini.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(limit) = env_parse::<f64>("GEMINI_DAILY_COST_LIMIT") {
            self.gemini.daily_cost_limit_usd = limit;
        }
        if let Some(enabled) = env_parse::<bool>("GEMINI_KODE_MATCHING_ENABLED") {
            self.gemini.kode_matching_enabled = enabled;
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", name, raw);
            None
        }
    }
}

/// Default configuration file path (`~/.config/arkla/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("arkla").join("config.toml"))
}

/// Resolve the root folder (CLI → ENV → TOML → OS default)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &ArklaConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/arkla (or /var/lib/arkla for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("arkla"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/arkla"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("arkla"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/arkla"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("arkla"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\arkla"))
    } else {
        PathBuf::from("./arkla_data")
    }
}

/// On-disk layout under the root folder
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    pub root: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("arkla.db")
    }

    /// Original uploads, one subdirectory per surat id
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    /// Generated export files
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Create the root, uploads and output directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.root.clone(), self.uploads_dir(), self.output_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("Cannot create directory {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}
