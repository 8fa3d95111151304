//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting that supports it:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is not fatal: a warning is logged and
//! defaults are used.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::annotation::ValidationMode;
use crate::{Error, Result};

/// Environment variable holding the vision model API key
pub const API_KEY_ENV: &str = "INFERENCE_API_KEY";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "PMLB_ROOT_FOLDER";

/// Chat-completion endpoint of the vision model
pub const DEFAULT_UPSTREAM_ENDPOINT: &str = "https://api.inference.net/v1/chat/completions";

/// Vision model identifier
pub const DEFAULT_MODEL: &str = "inference-net/cliptagger-12b";

/// Hard upper bound for one upstream call, independent of the retry policy
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 45;

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "pmlb.db";

/// Contents of the TOML config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Vision model API key (environment variable takes precedence)
    #[serde(default)]
    pub inference_api_key: Option<String>,

    #[serde(default)]
    pub upstream: UpstreamSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream vision model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub endpoint: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub validation_mode: ValidationMode,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_UPSTREAM_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            validation_mode: ValidationMode::default(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive; `RUST_LOG` overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// API credential; never printed in full
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting empty or whitespace-only values
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if is_valid_key(&key) {
            Some(Self(key.trim().to_string()))
        } else {
            None
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Default config file location (`~/.config/pmlb/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pmlb").join("config.toml"))
}

/// Load the TOML config file, falling back to defaults when it is missing
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
        warn!("Could not determine config directory, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        info!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolve the root folder (CLI → ENV → TOML → default)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("pmlb"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/pmlb"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("pmlb"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/pmlb"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("pmlb"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\pmlb"))
    } else {
        PathBuf::from("./pmlb_data")
    }
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(DATABASE_FILE))
}

/// Resolve the vision model API key (ENV → TOML)
///
/// Returns `None` when no valid key is configured; callers turn that into a
/// configuration error before any network activity.
pub fn resolve_api_key(toml_config: &TomlConfig) -> Option<ApiKey> {
    let env_key = std::env::var(API_KEY_ENV).ok().and_then(ApiKey::new);
    let toml_key = toml_config.inference_api_key.clone().and_then(ApiKey::new);

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "API key found in both {} and TOML config. Using environment variable.",
            API_KEY_ENV
        );
    }

    if let Some(key) = env_key {
        info!("API key loaded from environment variable");
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!("API key loaded from TOML config");
        return Some(key);
    }

    warn!(
        "Vision model API key not configured. Set {} or add inference_api_key to the TOML config.",
        API_KEY_ENV
    );
    None
}
