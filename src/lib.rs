//! Obra: worksite management server.
//!
//! The domain lives in [`obra_core`]; this crate adds the HTTP API, the
//! client used by field-worker tooling, the MCP surface and configuration.

pub mod api;
pub mod client;
pub mod config;
pub mod mcp;
pub mod workflow;

pub use obra_core::{db, models};
