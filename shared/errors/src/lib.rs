//! ProDetect Error Handling Library
//!
//! A single error type shared by all ProDetect services, with stable
//! machine-readable codes alongside human messages.

pub mod types;

pub use types::*;
