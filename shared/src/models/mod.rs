//! Data models
//!
//! Persisted documents and their create payloads. All IDs are `i64`
//! snowflakes (see [`crate::util::snowflake_id`]); all timestamps are Unix
//! millis.

pub mod account;
pub mod plan;
pub mod staff;
pub mod transaction;

// Re-exports
pub use account::*;
pub use plan::*;
pub use staff::*;
pub use transaction::*;
