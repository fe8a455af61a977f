//! Page responses.

use futures::channel::mpsc;
use futures::StreamExt;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use ppr_streaming::{reconstruct, StreamError};

/// Response body.
#[derive(Debug)]
pub enum ResponseBody {
    /// Complete body.
    Full(String),
    /// Shell chunk, hole chunks and tail, as they are produced.
    Streaming(mpsc::Receiver<Vec<u8>>),
}

/// A rendered page response.
#[derive(Debug)]
pub struct PprResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl PprResponse {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Html response with a complete body.
    pub(crate) fn html(status: StatusCode, mut headers: HeaderMap, body: String) -> Self {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        Self::new(status, headers, ResponseBody::Full(body))
    }

    /// Response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// A header value as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the body is streamed.
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, ResponseBody::Streaming(_))
    }

    /// Split into parts.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, ResponseBody) {
        (self.status, self.headers, self.body)
    }

    /// Wait for every chunk of the body.
    pub async fn chunks(self) -> Result<Vec<String>, StreamError> {
        match self.body {
            ResponseBody::Full(body) => Ok(vec![body]),
            ResponseBody::Streaming(rx) => {
                let raw: Vec<Vec<u8>> = rx.collect().await;
                raw.into_iter()
                    .map(|bytes| String::from_utf8(bytes).map_err(StreamError::from))
                    .collect()
            }
        }
    }

    /// Wait for the body and return the bytes as sent, concatenated.
    pub async fn text(self) -> Result<String, StreamError> {
        Ok(self.chunks().await?.concat())
    }

    /// Wait for the body and return the document a client ends up showing,
    /// with streamed hole content moved into its placeholders.
    pub async fn document(self) -> Result<String, StreamError> {
        reconstruct(&self.chunks().await?)
    }
}
