//! Shell-first streaming for partially prerendered pages.
//!
//! This crate provides:
//! - `Document` - Html document wrapper around page bodies
//! - `StreamingSink` - Shell-first sink over any `Sink<Vec<u8>>`
//! - `StreamChunk` - Hole chunk wire format and client-side reconstruction
//! - `ResumeExecutor` - Streaming and synchronous resume

mod chunk;
mod document;
mod resume;
mod sink;

pub use chunk::*;
pub use document::*;
pub use resume::*;
pub use sink::*;
