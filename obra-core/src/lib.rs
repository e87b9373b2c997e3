//! Core library for Obra.
//!
//! This crate provides the domain models, the SQLite-backed stores and the
//! worksite progress gate, independent of any transport layer (HTTP, MCP, etc.).
//!
//! # Usage
//!
//! ```no_run
//! use obra_core::db::Database;
//! use obra_core::models::*;
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let admin = Actor::new(1, Role::Admin);
//! let progress = db.get_progress(1, &admin)?;
//! assert_eq!(progress.len(), 4);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod db;
pub mod error;
pub mod models;
pub mod storage;
pub mod workflow;

// Re-export commonly used types at crate root
pub use db::{Database, GateConfig};
pub use error::{Error, Result};
pub use storage::PhotoStore;
