//! Response header contract for shell responses.

use std::fmt;

use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::artifact::ShellArtifact;
use crate::key::ShellKey;

/// Header names.
pub mod header_names {
    /// Cache lookup outcome (HIT, MISS).
    pub const X_NEXTJS_CACHE: &str = "x-nextjs-cache";
    /// Present with value `1` when the shell has unresolved holes.
    pub const X_NEXTJS_POSTPONED: &str = "x-nextjs-postponed";
    /// Shell key used for lookup; debug only.
    pub const X_PPR_CACHE_KEY: &str = "x-ppr-cache-key";
}

/// Outcome of a shell cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Header value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headers describing a served shell.
///
/// Responses that were not served from the shell cache carry none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellHeaders {
    /// Cache lookup outcome.
    pub status: Option<CacheStatus>,
    /// Whether the served shell has holes.
    pub postponed: bool,
    /// Lookup key, when debug headers are enabled.
    pub key: Option<String>,
}

impl ShellHeaders {
    /// Headers for a response carrying no shell.
    pub fn none() -> Self {
        Self::default()
    }

    /// Headers for serving `artifact` after a lookup with `status`.
    pub fn for_artifact(status: CacheStatus, artifact: &ShellArtifact) -> Self {
        Self {
            status: Some(status),
            postponed: artifact.has_holes(),
            key: None,
        }
    }

    /// Include the lookup key.
    pub fn with_debug_key(mut self, key: &ShellKey) -> Self {
        self.key = Some(key.as_str().to_string());
        self
    }

    /// Write the headers into a response header map.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(status) = self.status {
            headers.insert(
                header_names::X_NEXTJS_CACHE,
                HeaderValue::from_static(status.as_str()),
            );
        }

        if self.postponed {
            headers.insert(
                header_names::X_NEXTJS_POSTPONED,
                HeaderValue::from_static("1"),
            );
        }

        if let Some(key) = &self.key {
            if let Ok(value) = HeaderValue::from_str(key) {
                headers.insert(header_names::X_PPR_CACHE_KEY, value);
            }
        }
    }

    /// Convert to name/value pairs.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut headers = HeaderMap::new();
        self.apply(&mut headers);
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sets_cache_and_postponed() {
        let headers = ShellHeaders {
            status: Some(CacheStatus::Hit),
            postponed: true,
            key: None,
        };
        let mut map = HeaderMap::new();
        headers.apply(&mut map);

        assert_eq!(map.get(header_names::X_NEXTJS_CACHE).unwrap(), "HIT");
        assert_eq!(map.get(header_names::X_NEXTJS_POSTPONED).unwrap(), "1");
        assert!(map.get(header_names::X_PPR_CACHE_KEY).is_none());
    }

    #[test]
    fn test_none_writes_nothing() {
        let mut map = HeaderMap::new();
        ShellHeaders::none().apply(&mut map);
        assert!(map.is_empty());
        assert!(ShellHeaders::none().to_pairs().is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CacheStatus::Miss.to_string(), "MISS");
    }
}
