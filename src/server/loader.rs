//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let env_name = std::env::var("CHANSYNC_ENV").unwrap_or_else(|_| "development".to_string());

    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // CHANSYNC_PIPELINE__PROGRAM: single "_" after the prefix, "__" between keys.
        .add_source(
            Environment::with_prefix("CHANSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8090);
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.default_schedule, "0 0 * * *");
        assert_eq!(config.pipeline.checkpoint_interval_ms, 500);
        assert!(config.pipeline.args.iter().any(|a| a == "{channel_id}"));
    }

    #[test]
    fn test_missing_sections_fall_back() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str("[server]\nport = 9000\n", FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(
            config.database.path,
            std::path::PathBuf::from("data/chansync.db")
        );
        assert_eq!(config.pipeline.program, "chansync-fetch");
    }
}
