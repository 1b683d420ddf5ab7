//! Transaction entity model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Financial transaction with AML risk annotations
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // Identification
    /// External system transaction identifier
    pub transaction_id: String,
    /// Internal tracking reference (REF-YYYYMMDD-XXXXXXXX)
    pub reference_number: String,

    // Basic transaction info
    pub transaction_type: String,
    pub transaction_method: String,
    pub currency: String,
    pub amount: Decimal,

    // Parties
    pub customer_id: Uuid,
    pub account_number: String,
    pub beneficiary_name: Option<String>,
    pub beneficiary_account: Option<String>,
    pub beneficiary_bank: Option<String>,
    pub beneficiary_country: Option<String>,

    // Details
    pub description: String,
    pub channel: String,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub device_id: Option<String>,

    // Timing
    pub transaction_date: DateTime<Utc>,
    pub value_date: DateTime<Utc>,
    pub processing_date: DateTime<Utc>,

    // Status
    pub status: String,
    pub failure_reason: Option<String>,

    // Risk assessment
    pub risk_score: f64,
    pub risk_flags: Json,

    // AML flags
    pub is_suspicious: bool,
    pub alert_count: i32,
    pub structuring_indicator: bool,
    pub velocity_flag: bool,
    pub amount_threshold_flag: bool,
    pub unusual_pattern_flag: bool,

    // Regulatory flags
    pub above_ctr_threshold: bool,
    pub cross_border: bool,
    pub cash_transaction: bool,

    pub metadata: Json,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether a named risk indicator is set in the flags map
    pub fn has_risk_flag(&self, indicator: &str) -> bool {
        self.risk_flags
            .get(indicator)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}
