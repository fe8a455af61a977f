//! Wire format of streamed responses.
//!
//! A streamed response is the shell chunk, one chunk per resolved hole and a
//! tail chunk. Hole chunks carry their hole id, so they may arrive in any
//! order and still land in the placeholder reserved for them.

use ppr_cache::{hole_close, hole_open};
use ppr_core::HoleId;

use crate::sink::StreamError;

const TEMPLATE_PREFIX: &str = "<template data-ppr-hole=\"";
const TEMPLATE_SUFFIX: &str = "</template>";

/// One chunk of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Document opening plus shell body.
    Shell(String),
    /// Resolved content of one hole.
    Hole { hole: HoleId, html: String },
    /// Document closing.
    Tail(String),
}

impl StreamChunk {
    /// Encode for the wire.
    pub fn encode(&self) -> String {
        match self {
            Self::Shell(html) | Self::Tail(html) => html.clone(),
            Self::Hole { hole, html } => {
                format!("{}{}\">{}{}", TEMPLATE_PREFIX, hole, html, TEMPLATE_SUFFIX)
            }
        }
    }
}

/// Parse a hole chunk into its hole id and content.
pub fn parse_hole_chunk(chunk: &str) -> Option<(HoleId, &str)> {
    let rest = chunk.strip_prefix(TEMPLATE_PREFIX)?;
    let (id, rest) = rest.split_once("\">")?;
    let html = rest.strip_suffix(TEMPLATE_SUFFIX)?;
    let index = id.strip_prefix('h')?.parse::<usize>().ok()?;
    Some((HoleId::new(index), html))
}

/// Rebuild the document a client sees once every chunk arrived: each hole
/// chunk replaces its placeholder, fallback included.
pub fn reconstruct(chunks: &[String]) -> Result<String, StreamError> {
    let mut document = String::new();
    let mut holes = Vec::new();

    for chunk in chunks {
        match parse_hole_chunk(chunk) {
            Some((hole, html)) => holes.push((hole, html)),
            None => document.push_str(chunk),
        }
    }

    for (hole, html) in holes {
        let open = hole_open(hole);
        let close = hole_close(hole);
        let start = document
            .find(&open)
            .ok_or(StreamError::MissingPlaceholder(hole))?;
        let end = document[start..]
            .find(&close)
            .map(|offset| start + offset + close.len())
            .ok_or(StreamError::MissingPlaceholder(hole))?;
        document.replace_range(start..end, html);
    }

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hole_chunk_wire_format() {
        let chunk = StreamChunk::Hole {
            hole: HoleId::new(2),
            html: "<p>Signed In</p>".to_string(),
        };

        let encoded = chunk.encode();
        assert_eq!(
            encoded,
            r#"<template data-ppr-hole="h2"><p>Signed In</p></template>"#
        );
        assert_eq!(
            parse_hole_chunk(&encoded),
            Some((HoleId::new(2), "<p>Signed In</p>"))
        );
        assert_eq!(parse_hole_chunk("<p>shell</p>"), None);
    }

    #[test]
    fn test_reconstruct_out_of_order() {
        let shell = format!(
            "<main>{}a{}|{}b{}</main>",
            hole_open(HoleId::new(0)),
            hole_close(HoleId::new(0)),
            hole_open(HoleId::new(1)),
            hole_close(HoleId::new(1)),
        );
        let chunks = vec![
            StreamChunk::Shell(shell).encode(),
            StreamChunk::Hole {
                hole: HoleId::new(1),
                html: "second".to_string(),
            }
            .encode(),
            StreamChunk::Hole {
                hole: HoleId::new(0),
                html: "first".to_string(),
            }
            .encode(),
            StreamChunk::Tail(String::new()).encode(),
        ];

        assert_eq!(reconstruct(&chunks).unwrap(), "<main>first|second</main>");
    }

    #[test]
    fn test_reconstruct_missing_placeholder() {
        let chunks = vec![
            "<main></main>".to_string(),
            StreamChunk::Hole {
                hole: HoleId::new(0),
                html: "x".to_string(),
            }
            .encode(),
        ];

        assert!(matches!(
            reconstruct(&chunks),
            Err(StreamError::MissingPlaceholder(_))
        ));
    }
}
