//! Regulatory report entity model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Regulator-facing report (STR, CTR or SAR)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // Identification
    /// Monthly-sequenced identifier ({TYPE}-YYYYMM-NNNN)
    #[sea_orm(unique)]
    pub report_number: String,
    pub report_type: String,
    pub report_category: String,

    // Related entities
    pub case_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub related_customers: Json,
    pub transaction_ids: Json,
    pub alert_ids: Json,

    // Content
    pub title: String,
    pub narrative: String,
    pub summary: String,

    // Regulatory information
    pub regulatory_authority: String,
    pub filing_requirement: String,

    // Activity details
    pub suspicious_activity_type: String,
    pub activity_description: String,
    pub timeline_of_events: String,
    pub total_amount: Decimal,
    pub currency: String,

    /// Flattened customer snapshot taken at report creation time
    pub subject_information: Json,

    // Supporting material
    pub evidence_summary: String,
    pub investigation_notes: String,

    // Workflow
    pub status: String,
    pub prepared_by: Uuid,
    pub reviewed_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,

    // Activity period
    pub incident_date_from: DateTime<Utc>,
    pub incident_date_to: DateTime<Utc>,
    pub detection_date: DateTime<Utc>,

    // Filing
    pub filed: bool,
    pub filing_date: Option<DateTime<Utc>>,
    pub filing_method: Option<String>,
    pub filing_reference: Option<String>,
    pub filed_by: Option<Uuid>,

    // Authority response
    pub acknowledged: bool,
    pub acknowledgment_date: Option<DateTime<Utc>>,
    pub acknowledgment_reference: Option<String>,

    // Quality assurance
    pub qa_reviewed: bool,
    pub qa_reviewer: Option<Uuid>,
    pub qa_notes: Option<String>,
    pub qa_approved: bool,
    pub legal_reviewed: bool,

    // Export
    pub export_format: String,
    pub export_data: Option<Json>,

    // Retention in years
    pub retention_period: i32,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Uuid,
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
        belongs_to = "super::case_record::Entity",
        from = "Column::CaseId",
        to = "super::case_record::Column::Id"
    )]
    Case,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Transaction ids decoded from the JSON column
    pub fn transaction_id_list(&self) -> Vec<Uuid> {
        serde_json::from_value(self.transaction_ids.clone()).unwrap_or_default()
    }
}
