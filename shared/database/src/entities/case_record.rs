//! Investigation case entity model

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Investigation case consolidating one or more alerts
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // Identification
    /// Monthly-sequenced identifier (CASE-YYYYMM-NNNN)
    #[sea_orm(unique)]
    pub case_number: String,
    pub case_type: String,
    pub case_category: String,

    // Related entities. Alert and transaction links are kept as id lists on
    // the case side; alerts point back through their own case_id column.
    pub customer_id: Uuid,
    pub related_customers: Json,
    pub alert_ids: Json,
    pub transaction_ids: Json,

    // Details
    pub title: String,
    pub description: String,
    pub priority: i32,
    pub risk_level: String,

    // Workflow
    pub status: String,
    pub investigation_stage: String,

    // Assignment
    pub assigned_to: Uuid,
    pub reviewer: Option<Uuid>,
    pub approver: Option<Uuid>,
    pub team_members: Json,

    // Timing
    pub opened_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub investigation_started_at: Option<DateTime<Utc>>,
    pub review_started_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,

    // SLA management
    pub sla_deadline: Option<DateTime<Utc>>,
    pub sla_extended: bool,
    pub sla_extension_reason: Option<String>,
    pub sla_breached: bool,

    // Investigation artefacts
    pub investigation_notes: String,
    pub evidence_collected: Json,
    pub interviews_conducted: Json,
    pub external_inquiries: Json,

    // Findings and decision
    pub findings: Option<String>,
    pub recommendations: Option<String>,
    pub decision: Option<String>,
    pub actions_taken: Json,

    // Regulatory reporting flags
    pub str_required: bool,
    pub str_filed: bool,
    pub str_reference: Option<String>,
    pub str_filed_date: Option<DateTime<Utc>>,
    pub ctr_required: bool,
    pub ctr_filed: bool,

    // Quality assurance
    pub qa_reviewed: bool,
    pub qa_reviewer: Option<Uuid>,
    pub qa_notes: Option<String>,
    pub qa_approved: bool,

    // Closure
    pub closure_reason: Option<String>,
    pub closure_notes: Option<String>,
    pub closed_by: Option<Uuid>,

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
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_closed(&self) -> bool {
        self.status == "closed"
    }

    /// Alert ids decoded from the JSON column
    pub fn alert_id_list(&self) -> Vec<Uuid> {
        serde_json::from_value(self.alert_ids.clone()).unwrap_or_default()
    }

    /// Transaction ids decoded from the JSON column
    pub fn transaction_id_list(&self) -> Vec<Uuid> {
        serde_json::from_value(self.transaction_ids.clone()).unwrap_or_default()
    }

    /// Related customer ids decoded from the JSON column
    pub fn related_customer_list(&self) -> Vec<Uuid> {
        serde_json::from_value(self.related_customers.clone()).unwrap_or_default()
    }
}
