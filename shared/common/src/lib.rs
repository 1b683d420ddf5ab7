//! ProDetect Common Library
//!
//! Shared constants, the caller principal and small helper types used across
//! the ProDetect AML services.

pub mod constants;
pub mod types;

// Re-export commonly used types
pub use constants::*;
pub use types::*;

// Re-export external dependencies for consistency
pub use chrono::{DateTime, Utc};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
