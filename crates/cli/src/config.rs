//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then the TOML file,
//! then `DROWSY_GUARD__<SECTION>__<KEY>` environment variables.

use alerting::AlertConfig;
use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use session::SessionConfig;
use std::path::Path;
use storage::StorageConfig;

pub const DEFAULT_CONFIG_FILE: &str = "drowsy-guard.toml";
pub const ENV_PREFIX: &str = "DROWSY_GUARD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: StorageConfig,
    pub session: SessionConfig,
    pub detection: DmsConfig,
    pub alert: AlertConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(Some(Path::new("/nonexistent/drowsy-guard.toml"))).unwrap();

        assert_eq!(config.database.url, "sqlite://drowsy-guard.db");
        assert_eq!(config.session.join_timeout_ms, 5000);
        assert_eq!(config.detection.max_consecutive_timeouts, 10);
        assert_eq!(config.alert.cooldown_ms, 3000);
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = scratch_file(
            "override.toml",
            r#"
[database]
url = "sqlite::memory:"

[session]
join_timeout_ms = 750

[log]
json = true
"#,
        );

        let config = AppConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.session.join_timeout_ms, 750);
        assert_eq!(config.session.event_buffer, 64);
        assert!(config.log.json);
    }
}
