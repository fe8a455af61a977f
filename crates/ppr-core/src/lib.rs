//! Core types for the partial prerendering engine.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `NodeId` / `HoleId` / `AttemptId` - Stable identifiers
//! - `PageRequest` / `RequestData` - Per-request data and client kind
//! - `LifecyclePhase` / `TimingContext` - Request lifecycle tracking
//! - `EngineConfig` / `RouteConfig` - Engine and route configuration

mod config;
mod context;
mod ids;
mod lifecycle;

pub use config::*;
pub use context::*;
pub use ids::*;
pub use lifecycle::*;
