//! Request context with per-request data.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use http::header::COOKIE;
use http::HeaderMap;

use crate::lifecycle::TimingContext;

/// Header a client sends to ask for the complete page in one response.
pub const FULL_PAGE_HEADER: &str = "x-ppr-full-page";

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        let id = format!(
            "{:x}-{:x}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
            next_sequence()
        );
        Self(id)
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

fn next_sequence() -> u32 {
    static SEQUENCE: AtomicU32 = AtomicU32::new(0);
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cookies parsed from the `Cookie` request header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every `Cookie` header in the map.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();
        for value in headers.get_all(COOKIE) {
            if let Ok(raw) = value.to_str() {
                jar.parse_into(raw);
            }
        }
        jar
    }

    fn parse_into(&mut self, raw: &str) {
        for pair in raw.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            self.cookies
                .insert(name.to_string(), value.trim().to_string());
        }
    }

    /// Add or replace a cookie.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Get a cookie value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }

    /// Whether the jar holds a cookie with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Number of cookies.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the jar is empty.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Per-request data a dynamic subtree may read.
///
/// Only available in FullDynamic and Resume renders; a Prerender render
/// postpones instead of reading it.
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    /// HTTP headers.
    pub headers: HeaderMap,
    /// Parsed cookies.
    pub cookies: CookieJar,
}

impl RequestData {
    /// Build request data from headers, parsing cookies.
    pub fn from_headers(headers: HeaderMap) -> Self {
        let cookies = CookieJar::from_headers(&headers);
        Self { headers, cookies }
    }

    /// Get a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a cookie value by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name)
    }
}

/// How the client consumes the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientKind {
    /// Accepts a shell followed by streamed hole content.
    #[default]
    Streaming,
    /// Needs the complete page in a single body.
    FullPage,
}

/// Typed request context passed to the server.
#[derive(Debug)]
pub struct PageRequest {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// Request pathname.
    pub pathname: String,
    /// Static-only variance (e.g. a locale resolved by the router).
    pub locale: Option<String>,
    /// Per-request data.
    pub data: RequestData,
    /// How the client consumes the response.
    pub client: ClientKind,
    /// Timing context for observability.
    pub timing: TimingContext,
}

impl PageRequest {
    /// Create a request for a pathname with no headers.
    pub fn new(pathname: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::generate(),
            pathname: pathname.into(),
            locale: None,
            data: RequestData::default(),
            client: ClientKind::default(),
            timing: TimingContext::new(),
        }
    }

    /// Create a request from headers; the client kind is derived from
    /// the full-page header.
    pub fn from_parts(pathname: impl Into<String>, headers: HeaderMap) -> Self {
        let client = match headers.get(FULL_PAGE_HEADER).map(|v| v.as_bytes()) {
            Some(b"1") => ClientKind::FullPage,
            _ => ClientKind::Streaming,
        };
        Self {
            data: RequestData::from_headers(headers),
            client,
            ..Self::new(pathname)
        }
    }

    /// Add a cookie to the request data.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.cookies = self.data.cookies.with(name, value);
        self
    }

    /// Set the client kind.
    pub fn with_client(mut self, client: ClientKind) -> Self {
        self.client = client;
        self
    }

    /// Set the locale variance.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn test_cookie_jar_parses_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session=1; theme = dark;broken"));

        let jar = CookieJar::from_headers(&headers);

        assert_eq!(jar.get("session"), Some("1"));
        assert_eq!(jar.get("theme"), Some("dark"));
        assert!(!jar.contains("broken"));
        assert_eq!(jar.len(), 2);
    }

    #[test]
    fn test_page_request_full_page_header() {
        let mut headers = HeaderMap::new();
        headers.insert(FULL_PAGE_HEADER, HeaderValue::from_static("1"));

        let request = PageRequest::from_parts("/a", headers);
        assert_eq!(request.client, ClientKind::FullPage);

        let request = PageRequest::from_parts("/a", HeaderMap::new());
        assert_eq!(request.client, ClientKind::Streaming);
    }

    #[test]
    fn test_page_request_with_cookie() {
        let request = PageRequest::new("/a").with_cookie("session", "1");
        assert_eq!(request.data.cookie("session"), Some("1"));
    }
}
