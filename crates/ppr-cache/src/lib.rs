//! Shell artifacts and their cache.
//!
//! This crate provides:
//! - `ShellArtifact` / `HoleDescriptor` - Immutable prerendered shell with holes
//! - `assemble` - Builds a shell artifact from a finished prerender
//! - `ShellKeyBuilder` - Cache key composition from static-only variance
//! - `ShellHeaders` - The `x-nextjs-cache` / `x-nextjs-postponed` contract
//! - `ShellCache` - Shell cache with a pluggable backend and population guard
//!
//! # Example
//!
//! ```ignore
//! use ppr_cache::{assemble, ShellCache, ShellKeyBuilder};
//!
//! let artifact = assemble(&outcome, job.tree())?;
//! let key = ShellKeyBuilder::new("build-1").locale("en").build("/suspense/node");
//!
//! let cache = ShellCache::in_memory();
//! cache.store(key.clone(), artifact).await?;
//! let lookup = cache.lookup(&key).await?;
//! lookup.headers().apply(&mut response_headers);
//! ```

mod artifact;
mod assemble;
mod headers;
mod key;
mod store;

pub use artifact::*;
pub use assemble::*;
pub use headers::*;
pub use key::*;
pub use store::*;
