//! Configuration Vault – reads/writes `~/.heatwatch/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use heatwatch_runtime::{DecisionPolicy, DerivationDefaults, LoopConfig};
use serde::{Deserialize, Serialize};

/// Persisted operator configuration.
///
/// Every field has a default, so a partial file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial device of the field unit (e.g. `/dev/ttyUSB0`, `COM6`).
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Path of the JSON classifier artifact.  A missing file is allowed.
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Alert when the model probability is at or above this value.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Alert duration reported to the device, in seconds.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Idle sleep between polls when no line is waiting.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on a single serial read.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Pause after a faulted iteration.
    #[serde(default = "default_fault_pause_ms")]
    pub fault_pause_ms: u64,

    /// Temperature used when neither remote nor local reading is available.
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    /// Humidity used when neither remote nor local reading is available.
    #[serde(default = "default_humidity")]
    pub default_humidity: f64,
}

fn default_port() -> String {
    if cfg!(target_os = "windows") {
        "COM3".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}
fn default_baud_rate() -> u32 {
    115_200
}
fn default_model_path() -> String {
    "heat_model.json".to_string()
}
fn default_threshold() -> f64 {
    heatwatch_runtime::decision::DEFAULT_THRESHOLD
}
fn default_duration_secs() -> u64 {
    heatwatch_runtime::decision::DEFAULT_DURATION_SECS
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_fault_pause_ms() -> u64 {
    1000
}
fn default_temperature() -> f64 {
    heatwatch_runtime::features::DEFAULT_TEMPERATURE
}
fn default_humidity() -> f64 {
    heatwatch_runtime::features::DEFAULT_HUMIDITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            model_path: default_model_path(),
            threshold: default_threshold(),
            duration_secs: default_duration_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            fault_pause_ms: default_fault_pause_ms(),
            default_temperature: default_temperature(),
            default_humidity: default_humidity(),
        }
    }
}

impl Config {
    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.port.trim().is_empty() {
            return Err("port must not be empty".to_string());
        }
        if self.baud_rate == 0 {
            return Err("baud_rate must be greater than 0".to_string());
        }
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold must be within [0, 1], got {}", self.threshold));
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".to_string());
        }
        if !self.default_temperature.is_finite() || !self.default_humidity.is_finite() {
            return Err("default_temperature and default_humidity must be finite".to_string());
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Timing and policy for the inference loop.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            read_timeout: self.read_timeout(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            fault_pause: Duration::from_millis(self.fault_pause_ms),
            defaults: DerivationDefaults {
                temperature: self.default_temperature,
                humidity: self.default_humidity,
            },
            policy: DecisionPolicy {
                threshold: self.threshold,
                duration_secs: self.duration_secs,
            },
        }
    }
}

/// Return the path to `~/.heatwatch/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".heatwatch").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `HEATWATCH_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HEATWATCH_PORT` | `port` |
/// | `HEATWATCH_BAUD` | `baud_rate` |
/// | `HEATWATCH_MODEL` | `model_path` |
/// | `HEATWATCH_THRESHOLD` | `threshold` |
/// | `HEATWATCH_DURATION` | `duration_secs` |
/// | `HEATWATCH_POLL_MS` | `poll_interval_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("HEATWATCH_PORT") {
        cfg.port = v;
    }
    if let Ok(v) = std::env::var("HEATWATCH_MODEL") {
        cfg.model_path = v;
    }
    if let Ok(v) = std::env::var("HEATWATCH_BAUD")
        && let Ok(baud) = v.parse::<u32>()
    {
        cfg.baud_rate = baud;
    }
    if let Ok(v) = std::env::var("HEATWATCH_THRESHOLD")
        && let Ok(t) = v.parse::<f64>()
    {
        cfg.threshold = t;
    }
    if let Ok(v) = std::env::var("HEATWATCH_DURATION")
        && let Ok(d) = v.parse::<u64>()
    {
        cfg.duration_secs = d;
    }
    if let Ok(v) = std::env::var("HEATWATCH_POLL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.poll_interval_ms = ms;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
