//! Configuration management for the campus library client

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::push::Platform;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Static candidates in priority order (bare hosts or full URLs)
    pub candidates: Vec<String>,
    pub port: u16,
    pub scheme: String,
    pub api_prefix: String,
    pub probe_timeout_ms: u64,
    pub manual_probe_timeout_ms: u64,
}

impl DiscoveryConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn manual_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.manual_probe_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PushConfig {
    /// Delay after the first authenticated screen before prompting
    pub registration_delay_ms: u64,
    pub platform: Platform,
}

impl PushConfig {
    pub fn registration_delay(&self) -> Duration {
        Duration::from_millis(self.registration_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (with prefix CAMPUS_)
            .add_source(
                Environment::with_prefix("CAMPUS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("discovery.candidates")
                    .try_parsing(true),
            )
            // Override the state file from CAMPUS_STATE_PATH if present
            .set_override_option("storage.path", env::var("CAMPUS_STATE_PATH").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                "127.0.0.1".to_string(),
                "10.0.2.2".to_string(),
                "192.168.1.100".to_string(),
                "192.168.0.100".to_string(),
                "172.20.10.2".to_string(),
                "https://library.campus.example.edu".to_string(),
            ],
            port: 3000,
            scheme: "http".to_string(),
            api_prefix: "/api".to_string(),
            probe_timeout_ms: 3000,
            manual_probe_timeout_ms: 5000,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join("campus-library").join("state.json"),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            registration_delay_ms: 1500,
            platform: Platform::Android,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.discovery.candidates[0], "127.0.0.1");
        assert_eq!(config.discovery.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.discovery.manual_probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.push.platform, Platform::Android);
        assert!(config.storage.path.ends_with("campus-library/state.json"));
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("discovery.port", 8080)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.discovery.port, 8080);
        assert_eq!(config.discovery.api_prefix, "/api");
        assert_eq!(config.http.request_timeout_secs, 15);
    }
}
