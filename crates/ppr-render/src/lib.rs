//! Postpone-aware rendering.
//!
//! This crate drives one render of a page tree:
//! - `SignalChannel` / `RenderError::Postpone` - Typed unwind out of a subtree
//! - `RenderTree` / `View` - Arena render tree and its builder
//! - `RenderScope` / `Component` - Per-request data access during render
//! - `PostponeCoordinator` - Per-subtree postpone state machine
//! - `RenderJob` - Prerender, full dynamic and resume renders

mod coordinator;
mod html;
mod job;
mod scope;
mod signal;
mod tree;

pub use coordinator::*;
pub use html::*;
pub use job::*;
pub use scope::*;
pub use signal::*;
pub use tree::*;
