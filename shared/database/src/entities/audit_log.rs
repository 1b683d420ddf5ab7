//! Audit log entity model
//!
//! Rows are immutable after insert except for the review-metadata fields
//! (`reviewed`, `reviewed_by`, `review_date`, `review_notes`).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit record of a business event
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // Event identification
    #[sea_orm(unique)]
    pub event_id: String,
    pub event_type: String,
    pub event_category: String,

    // Actor
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub user_role: Option<String>,
    pub impersonated_by: Option<Uuid>,

    // Action
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub resource_identifier: Option<String>,

    // Context
    pub description: String,
    pub details: Json,

    // System context
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub correlation_id: Option<String>,

    // Before/after state for data changes
    pub old_values: Option<Json>,
    pub new_values: Option<Json>,
    pub changed_fields: Option<Json>,

    // Risk and security
    pub risk_score: Option<f64>,
    pub suspicious_activity: bool,

    // Compliance
    pub regulatory_significance: bool,
    pub retention_period: i32,
    pub data_classification: String,

    // Processing
    pub records_affected: Option<i32>,
    pub status: String,
    pub error_message: Option<String>,

    // Timing
    pub timestamp: DateTime<Utc>,

    // Review metadata, the only mutable fields on this table
    pub reviewed: bool,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
