//! ProDetect Configuration Library
//!
//! Layered configuration loading (YAML files plus `PRODETECT_`-prefixed
//! environment variables) with validated, typed sections.

pub mod aml;
pub mod database;
pub mod settings;

pub use aml::*;
pub use database::*;
pub use settings::*;
