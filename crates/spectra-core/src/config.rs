//! Application configuration
//!
//! YAML-backed configuration shared by the library and the CLI. Loading
//! is forgiving: a missing file yields defaults, an unparsable file
//! warns and yields defaults. Validation of the audio section happens at
//! engine open, not at load time.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::audio::{EngineConfig, DEFAULT_THRESHOLD_RATIO};

/// Noise gate settings applied at startup; the gate can be retuned at
/// runtime through the engine's control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub enabled: bool,
    /// Threshold ratio in [0, 1]; out-of-range values clamp.
    pub threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD_RATIO,
        }
    }
}

/// Datagram publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub enabled: bool,
    /// "host:port" target for the connected datagram socket.
    pub endpoint: String,
    /// Publish interval in milliseconds (~30 Hz by default).
    pub interval_ms: u64,
    /// Keep transient connection-refused errors out of the error log.
    pub suppress_refused: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "127.0.0.1:9090".to_string(),
            interval_ms: 33,
            suppress_refused: true,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log filter used when RUST_LOG is not set (e.g. "info", "debug").
    pub log_level: Option<String>,
    pub audio: EngineConfig,
    pub gate: GateConfig,
    pub transport: TransportConfig,
}

/// Load configuration from a YAML file.
///
/// Missing file → defaults. Unreadable or invalid file → warning plus
/// defaults, so a bad config never prevents startup.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("config: {} not found, using defaults", path.display());
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => {
                log::info!("config: loaded {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("config: failed to parse {}: {}, using defaults", path.display(), e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("config: failed to read {}: {}, using defaults", path.display(), e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories.
pub fn save_config<T>(config: &T, path: &Path) -> std::io::Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, yaml)
}
