//! Shell cache key composition.
//!
//! Keys vary only on static inputs: the route, its locale, the build that
//! produced the shell and custom static parts. Cookies and headers never
//! take part, since the shell must be identical for every request.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of one cached shell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShellKey {
    key: String,
    route: String,
    /// Components that make up the key (for debugging).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    components: Vec<String>,
}

impl ShellKey {
    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Route pathname the key belongs to.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Get the key components (for debugging).
    pub fn components(&self) -> &[String] {
        &self.components
    }
}

impl fmt::Display for ShellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Static variance a key can include.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyComponent {
    /// Route locale.
    Locale(String),
    /// Custom static value.
    Custom(String),
}

/// Builder for composing shell keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellKeyBuilder {
    build_id: String,
    components: Vec<KeyComponent>,
}

impl ShellKeyBuilder {
    /// Create a builder for shells produced by `build_id`.
    pub fn new(build_id: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            components: Vec::new(),
        }
    }

    /// Include a locale.
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.components.push(KeyComponent::Locale(locale.into()));
        self
    }

    /// Include a locale when present.
    pub fn maybe_locale(self, locale: Option<&str>) -> Self {
        match locale {
            Some(locale) => self.locale(locale),
            None => self,
        }
    }

    /// Include a custom static value.
    pub fn custom(mut self, value: impl Into<String>) -> Self {
        self.components.push(KeyComponent::Custom(value.into()));
        self
    }

    /// Build the key for a route. A trailing slash is ignored.
    pub fn build(&self, pathname: &str) -> ShellKey {
        let route = normalize_pathname(pathname);
        let mut parts = vec![escape_part(&self.build_id), escape_part(&route)];
        let mut component_descs = vec![
            format!("build:{}", self.build_id),
            format!("route:{}", route),
        ];

        for component in &self.components {
            match component {
                KeyComponent::Locale(locale) => {
                    parts.push(format!("locale={}", escape_part(locale)));
                    component_descs.push(format!("locale:{}", locale));
                }
                KeyComponent::Custom(value) => {
                    parts.push(format!("custom={}", escape_part(value)));
                    component_descs.push(format!("custom:{}", value));
                }
            }
        }

        ShellKey {
            key: parts.join("|"),
            route,
            components: component_descs,
        }
    }
}

/// Percent-encode the key separators so every part stays distinct.
fn escape_part(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '|' => escaped.push_str("%7C"),
            '=' => escaped.push_str("%3D"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Strip a trailing slash from everything but the root path.
pub fn normalize_pathname(pathname: &str) -> String {
    let trimmed = pathname.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
