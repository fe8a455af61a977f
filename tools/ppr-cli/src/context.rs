//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use ppr_server::prelude::{DiagnosticsSink, DiagnosticsWriter, EngineConfig, PprServer};

use crate::config::{CliConfig, CONFIG_NAMES};
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Config file the configuration came from.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
}

impl Context {
    /// Load context from an explicit config file or the nearest one.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(cwd.join(path)),
            None => find_config(&cwd),
        };
        let config = match &config_path {
            Some(path) => CliConfig::load(path)?,
            None => CliConfig::default(),
        };

        Ok(Self {
            config,
            config_path,
            output,
        })
    }

    /// Engine config with command-line overrides applied.
    pub fn engine(&self, build_id: Option<&str>, dev: bool) -> EngineConfig {
        let mut engine = if dev {
            EngineConfig {
                build_id: self.config.engine.build_id.clone(),
                ..EngineConfig::development()
            }
        } else {
            self.config.engine.clone()
        };
        if let Some(build_id) = build_id {
            engine.build_id = build_id.to_string();
        }
        engine
    }

    /// Server over the demo routes, writing diagnostics to `writer`.
    pub fn server(
        &self,
        engine: EngineConfig,
        writer: Arc<dyn DiagnosticsWriter>,
    ) -> Result<PprServer> {
        let routes = ppr_demo::routes().context("Failed to build demo routes")?;
        tracing::debug!(
            build_id = %engine.build_id,
            mode = ?engine.mode,
            config = ?self.config_path,
            routes = routes.len(),
            "starting server"
        );
        let server = PprServer::new(engine, routes).context("Invalid engine config")?;
        Ok(server.with_diagnostics(Arc::new(DiagnosticsSink::new(writer))))
    }
}

/// Find a config file in the directory tree, nearest first.
fn find_config(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_config_walks_up() {
        let root = std::env::temp_dir().join(format!("ppr-cli-find-{}", std::process::id()));
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join(".ppr.toml"), "").unwrap();

        assert_eq!(find_config(&nested), Some(root.join(".ppr.toml")));

        std::fs::write(nested.join("ppr.json"), "{}").unwrap();
        assert_eq!(find_config(&nested), Some(nested.join("ppr.json")));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
