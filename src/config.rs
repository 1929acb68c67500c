use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::client::ConnectionConfig;
use crate::transport::DEFAULT_SCPI_PORT;
use crate::types::InstrumentFamily;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub logging: LoggingConfig,
    pub plot: PlotConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstrumentConfig {
    pub family: InstrumentFamily,
    /// Host or IP for TCP instruments
    pub address: String,
    pub port: u16,
    /// VISA resource string, empty for auto-selection
    pub resource: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlotConfig {
    /// Rolling window length in samples
    pub window: usize,
    pub chart_width: u32,
    pub chart_height: u32,
    /// Pause between readings
    pub interval_ms: u64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            family: InstrumentFamily::SiglentSdm3055,
            address: "192.168.1.98".to_string(),
            port: DEFAULT_SCPI_PORT,
            resource: String::new(),
            connect_timeout_ms: 5_000,
            read_timeout_ms: 10_000,
            write_timeout_ms: 5_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            window: 500,
            chart_width: 160,
            chart_height: 60,
            interval_ms: 1,
        }
    }
}

impl InstrumentConfig {
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }

    pub fn resource(&self) -> Option<&str> {
        let resource = self.resource.trim();
        (!resource.is_empty()).then_some(resource)
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else {
        for path in ["rusty-dmm.toml", "config.toml"] {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
                break;
            }
        }
    }

    // Environment overrides, e.g. RUSTY_DMM__INSTRUMENT__ADDRESS=10.0.0.7
    builder = builder.add_source(
        Environment::with_prefix("RUSTY_DMM")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize::<AppConfig>()
}

/// Load configuration, falling back to defaults on any error
pub fn load_config_or_default(config_path: Option<&Path>) -> AppConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::debug!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            AppConfig::default()
        }
    }
}
