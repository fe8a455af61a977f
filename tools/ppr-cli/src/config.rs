//! CLI configuration.

use std::path::Path;

use anyhow::{Context, Result};
use ppr_server::prelude::{EngineConfig, LogSettings};
use serde::{Deserialize, Serialize};

/// File names searched for, in order, in each directory.
pub const CONFIG_NAMES: [&str; 3] = ["ppr.toml", ".ppr.toml", "ppr.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LogSettings,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?
        };

        config
            .engine
            .validate()
            .with_context(|| format!("Invalid engine config in {}", path.display()))?;
        Ok(config)
    }
}

/// Generate a default ppr.toml.
pub fn generate_default_config() -> String {
    r#"# Partial prerendering configuration

[engine]
mode = "production"
build_id = "development"
streaming = true
debug_headers = false

[logging]
level = "info"
format = "human"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use ppr_server::prelude::{EngineMode, LogFormat};

    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: CliConfig = toml::from_str(&generate_default_config()).unwrap();

        assert_eq!(config.engine.mode, EngineMode::Production);
        assert!(config.engine.streaming);
        assert_eq!(config.logging.format, LogFormat::Human);
    }

    #[test]
    fn test_load_json_and_toml() {
        let dir = std::env::temp_dir().join(format!("ppr-cli-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let json = dir.join("ppr.json");
        std::fs::write(
            &json,
            r#"{"engine": {"mode": "development"}, "logging": {"format": "json"}}"#,
        )
        .unwrap();
        let config = CliConfig::load(&json).unwrap();
        assert_eq!(config.engine.mode, EngineMode::Development);
        assert_eq!(config.logging.format, LogFormat::Json);

        let toml_path = dir.join("ppr.toml");
        std::fs::write(&toml_path, "[engine]\nbuild_id = \"\"\n").unwrap();
        assert!(CliConfig::load(&toml_path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
