//! Shared types for the mess POS core
//!
//! Data models, the unified error system, and small utilities used by
//! every crate in the workspace.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};
