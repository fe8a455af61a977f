//! Route and engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Route pathname must start with '/': {0}")]
    InvalidPathname(String),

    #[error("Build id must not be empty")]
    EmptyBuildId,

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runtime a route is declared for. Both runtimes render identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    #[default]
    Node,
    Edge,
}

/// Configuration for a single route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Route pathname (e.g., "/suspense/node").
    pub pathname: String,
    /// Whether the build step marked this route as eligible for partial
    /// prerendering.
    #[serde(default = "default_ppr")]
    pub ppr: bool,
    /// Declared runtime.
    #[serde(default)]
    pub runtime: Runtime,
    /// Document title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Static-only variance added to the shell cache key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

fn default_ppr() -> bool {
    true
}

impl RouteConfig {
    /// Create a new PPR-eligible route configuration.
    pub fn new(pathname: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            ppr: default_ppr(),
            runtime: Runtime::default(),
            title: None,
            locale: None,
        }
    }

    /// Set PPR eligibility.
    pub fn with_ppr(mut self, ppr: bool) -> Self {
        self.ppr = ppr;
        self
    }

    /// Set the declared runtime.
    pub fn with_runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Set the document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set a static locale variance.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Check the route is well-formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pathname.starts_with('/') {
            return Err(ConfigError::InvalidPathname(self.pathname.clone()));
        }
        Ok(())
    }
}

/// Engine mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    /// Dev preview: everything renders with live data, nothing is cached.
    Development,
    /// Prerender shells, cache them, resume holes per request.
    #[default]
    Production,
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine mode.
    #[serde(default)]
    pub mode: EngineMode,
    /// Deployment build id, part of every shell cache key.
    #[serde(default = "default_build_id")]
    pub build_id: String,
    /// Stream holes to streaming clients. When disabled the holes of a
    /// cached shell are resolved before the response is sent.
    #[serde(default = "default_true")]
    pub streaming: bool,
    /// Emit cache explain headers alongside the contract headers.
    #[serde(default)]
    pub debug_headers: bool,
}

fn default_build_id() -> String {
    "development".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EngineMode::default(),
            build_id: default_build_id(),
            streaming: true,
            debug_headers: false,
        }
    }
}

impl EngineConfig {
    /// Production config with a build id.
    pub fn production(build_id: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            ..Self::default()
        }
    }

    /// Development config.
    pub fn development() -> Self {
        Self {
            mode: EngineMode::Development,
            ..Self::default()
        }
    }

    /// Enable or disable streaming resume.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Parse from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build_id.trim().is_empty() {
            return Err(ConfigError::EmptyBuildId);
        }
        Ok(())
    }

    /// Whether this engine prerenders and caches shells.
    pub fn prerenders(&self) -> bool {
        self.mode == EngineMode::Production
    }
}
