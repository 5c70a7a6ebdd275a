//! Application configuration.
//!
//! Every section and field has a default, so a partial file (or none at all) is valid.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sensor::SamplingRate;

/// 冷却时间上限（秒）
pub const MAX_COOLDOWN_SECONDS: f64 = 3600.0;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub forwarder: ForwarderConfig,
    pub sensor: SensorConfig,
    pub service: ServiceConfig,
    pub supervisor: SupervisorConfig,
    pub collector: CollectorConfig,
}

/// 上报配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    pub endpoint_url: String,
    pub send_interval_seconds: u64,
    pub http_timeout_seconds: u64,
    /// Adds the capture time to the payload. Off keeps the bare `{x, y, z}` shape.
    pub include_timestamp: bool,
}

/// Which accelerometer implementation feeds the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackendKind {
    Simulated,
    Iio,
}

/// 传感器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub sampling_rate: SamplingRate,
    pub backend: SensorBackendKind,
    /// IIO device directory; discovered under /sys/bus/iio/devices when unset.
    pub iio_device: Option<String>,
    pub max_consecutive_read_errors: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Status file present while the service runs. Unset logs the state instead.
    pub status_file: Option<String>,
}

/// 重启策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub max_restarts: u32,
    pub base_cooldown_seconds: f64,
    pub max_cooldown_seconds: f64,
}

/// 采集端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub bind_addr: String,
    pub path: String,
    pub log_file: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://127.0.0.1:8080/ingest".to_string(),
            send_interval_seconds: 30,
            http_timeout_seconds: 20,
            include_timestamp: false,
        }
    }
}

impl ForwarderConfig {
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sampling_rate: SamplingRate::Ui,
            backend: SensorBackendKind::Simulated,
            iio_device: None,
            max_consecutive_read_errors: 10,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            base_cooldown_seconds: 2.0,
            max_cooldown_seconds: 30.0,
        }
    }
}

impl SupervisorConfig {
    pub fn base_cooldown(&self) -> Result<Duration, ConfigError> {
        cooldown("base_cooldown_seconds", self.base_cooldown_seconds)
    }

    pub fn max_cooldown(&self) -> Result<Duration, ConfigError> {
        cooldown("max_cooldown_seconds", self.max_cooldown_seconds)
    }
}

fn cooldown(field: &str, seconds: f64) -> Result<Duration, ConfigError> {
    if !(0.0..=MAX_COOLDOWN_SECONDS).contains(&seconds) {
        return Err(ConfigError::ValidationError(format!(
            "{} must be between 0 and {} seconds, got {}",
            field, MAX_COOLDOWN_SECONDS, seconds
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| ConfigError::ValidationError(format!("{}: {}", field, e)))
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            path: "/ingest".to_string(),
            log_file: "data/collector.log".to_string(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise the defaults, then apply `.env` and
    /// environment overrides and re-validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        dotenv::dotenv().ok(); // 加载 .env 文件
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(ConfigError::IoError)?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }

    /// Overrides from `SENSE_RELAY_*` variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = env::var("SENSE_RELAY_ENDPOINT") {
            self.forwarder.endpoint_url = endpoint;
        }
        if let Ok(interval) = env::var("SENSE_RELAY_INTERVAL_SECS") {
            self.forwarder.send_interval_seconds = parse_env("SENSE_RELAY_INTERVAL_SECS", &interval)?;
        }
        if let Ok(timeout) = env::var("SENSE_RELAY_TIMEOUT_SECS") {
            self.forwarder.http_timeout_seconds = parse_env("SENSE_RELAY_TIMEOUT_SECS", &timeout)?;
        }
        if let Ok(rate) = env::var("SENSE_RELAY_SAMPLING_RATE") {
            self.sensor.sampling_rate = parse_env("SENSE_RELAY_SAMPLING_RATE", &rate)?;
        }
        if let Ok(backend) = env::var("SENSE_RELAY_BACKEND") {
            self.sensor.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "simulated" => SensorBackendKind::Simulated,
                "iio" => SensorBackendKind::Iio,
                other => {
                    return Err(ConfigError::EnvError {
                        var: "SENSE_RELAY_BACKEND",
                        message: format!("unknown backend '{}'", other),
                    })
                }
            };
        }
        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.forwarder.endpoint_url.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::ValidationError("Endpoint URL must not be empty".to_string()));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "Endpoint URL must be http(s): {}",
                endpoint
            )));
        }

        if self.forwarder.send_interval_seconds == 0 {
            return Err(ConfigError::ValidationError("Send interval must be at least 1 second".to_string()));
        }

        if self.forwarder.http_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError("HTTP timeout must be at least 1 second".to_string()));
        }

        if self.sensor.max_consecutive_read_errors == 0 {
            return Err(ConfigError::ValidationError(
                "max_consecutive_read_errors must be at least 1".to_string(),
            ));
        }

        if self.supervisor.max_cooldown()? < self.supervisor.base_cooldown()? {
            return Err(ConfigError::ValidationError(
                "Supervisor cooldowns must satisfy base <= max".to_string(),
            ));
        }

        if !self.collector.path.starts_with('/') {
            return Err(ConfigError::ValidationError("Collector path must start with '/'".to_string()));
        }

        Ok(())
    }

    pub fn status_file_path(&self) -> Option<PathBuf> {
        self.service
            .status_file
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::EnvError {
        var,
        message: e.to_string(),
    })
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid value for {var}: {message}")]
    EnvError { var: &'static str, message: String },
}
