//! ProDetect AML core service
//!
//! Rules registry, real-time transaction monitoring, customer risk scoring,
//! investigation case workflow, regulatory reporting and the audit trail
//! binding them together. Transport, identity and the live sanctions feed
//! are external collaborators; this crate owns the business semantics.

pub mod audit;
pub mod cases;
pub mod models;
pub mod monitoring;
pub mod reporting;
pub mod repositories;
pub mod risk_scoring;
pub mod rules;
pub mod screening;
pub mod services;

pub use services::AmlService;
