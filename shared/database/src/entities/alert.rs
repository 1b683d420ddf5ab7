//! Alert entity model

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monitoring alert raised against a customer and optionally a transaction
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // Identification
    /// Human-readable identifier (TXN-YYYYMMDD-XXXXXXXX)
    #[sea_orm(unique)]
    pub alert_id: String,
    pub alert_type: String,
    pub alert_category: String,

    // Related entities
    pub customer_id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,

    // Details
    pub title: String,
    pub description: String,
    pub severity: String,
    pub priority: i32,

    // Risk assessment
    pub risk_score: f64,
    pub risk_factors: Json,
    pub triggered_rules: Json,
    pub threshold_values: Json,

    // Investigation
    pub status: String,
    pub assigned_to: Option<Uuid>,
    pub investigation_notes: Option<String>,

    // Case linkage
    pub case_id: Option<Uuid>,
    pub escalation_level: i32,

    // Timing
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub investigated_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,

    // Resolution
    pub resolution: Option<String>,
    pub resolution_notes: Option<String>,
    pub resolved_by: Option<Uuid>,

    // Compliance tracking
    pub sla_deadline: Option<DateTime<Utc>>,
    pub sla_breached: bool,
    pub regulatory_significance: bool,

    // Detection provenance
    pub detection_method: String,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,

    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id"
    )]
    Transaction,

    #[sea_orm(
        belongs_to = "super::rule::Entity",
        from = "Column::RuleId",
        to = "super::rule::Column::Id"
    )]
    Rule,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_open(&self) -> bool {
        matches!(self.status.as_str(), "open" | "investigating" | "escalated")
    }
}
