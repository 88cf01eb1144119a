use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ShroudError, ShroudResult};

/// Floor for recovery-phrase PBKDF2 rounds
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Top-level configuration (loaded from shroud.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShroudConfig {
    pub intercept: InterceptConfig,
    pub keystore: KeyStoreConfig,
    pub kdf: KdfConfig,
    pub transport: TransportConfig,
    pub log: LogConfig,
}

/// Request/response interception
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Encrypt outgoing bodies and decrypt enveloped responses (default: true)
    pub enabled: bool,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStoreBackend {
    /// JSON file on disk
    File,
    /// Platform keychain (macOS Keychain, Secret Service, Credential Manager)
    Keychain,
    /// Process memory only; lost on exit
    Memory,
}

/// Where the current key and recovery phrase are persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    pub backend: KeyStoreBackend,
    /// File backend location (default: ~/.config/shroud/keys.json)
    pub path: PathBuf,
    /// Keychain service name (default: shroud)
    pub service: String,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            backend: KeyStoreBackend::File,
            path: PathBuf::from("~/.config/shroud/keys.json"),
            service: "shroud".into(),
        }
    }
}

impl KeyStoreConfig {
    /// `path` with a leading `~/` resolved against `$HOME`.
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.path)
    }
}

/// Recovery-phrase key derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// PBKDF2-HMAC-SHA256 rounds (default: 100000, minimum: 100000)
    pub iterations: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            iterations: MIN_KDF_ITERATIONS,
        }
    }
}

/// HTTP transport wrapped by the interception layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Prefix for relative targets (e.g. "https://api.example.com")
    pub base_url: Option<String>,
    /// Per-request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ShroudConfig {
    /// Load and validate `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> ShroudResult<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<ShroudConfig>(&content)?
        } else {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            ShroudConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ShroudResult<()> {
        if self.kdf.iterations < MIN_KDF_ITERATIONS {
            return Err(ShroudError::Config(format!(
                "kdf.iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
                self.kdf.iterations
            )));
        }
        if self.transport.timeout_secs == 0 {
            return Err(ShroudError::Config(
                "transport.timeout_secs must be non-zero".into(),
            ));
        }
        if !matches!(self.log.format.as_str(), "json" | "text") {
            return Err(ShroudError::Config(format!(
                "log.format must be \"json\" or \"text\", got {:?}",
                self.log.format
            )));
        }
        Ok(())
    }
}

/// Resolve a leading `~` against `$HOME`. Other paths are returned as-is.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
