//! Customer entity model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Customer under AML monitoring
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // Basic information
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: DateTime<Utc>,
    pub nationality: String,

    // KYC information
    /// Bank's internal customer identifier
    #[sea_orm(unique)]
    pub customer_id: String,
    pub bvn: Option<String>,
    pub nin: Option<String>,
    pub kyc_status: String,
    pub kyc_level: String,

    // Address
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: Option<String>,

    // Risk assessment
    pub risk_score: f64,
    pub risk_category: String,
    pub pep_status: bool,
    pub sanctions_checked: bool,
    pub last_risk_assessment: Option<DateTime<Utc>>,

    // Accounts
    pub account_numbers: Json,
    pub account_types: Json,
    pub account_opening_date: DateTime<Utc>,
    pub customer_since: DateTime<Utc>,

    // Behavioural counters
    pub suspicious_activity_count: i32,
    pub last_transaction_date: Option<DateTime<Utc>>,
    pub average_monthly_turnover: Decimal,

    // Compliance flags
    pub is_blacklisted: bool,
    pub blacklist_reason: Option<String>,
    pub requires_enhanced_dd: bool,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,

    #[sea_orm(has_many = "super::alert::Entity")]
    Alerts,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Account numbers decoded from the JSON column
    pub fn account_number_list(&self) -> Vec<String> {
        serde_json::from_value(self.account_numbers.clone()).unwrap_or_default()
    }

    /// Account types decoded from the JSON column
    pub fn account_type_list(&self) -> Vec<String> {
        serde_json::from_value(self.account_types.clone()).unwrap_or_default()
    }

    pub fn is_high_risk(&self) -> bool {
        self.risk_category == "high"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_customer() -> Model {
        Model {
            id: Uuid::new_v4(),
            first_name: "Amina".to_string(),
            last_name: "Bello".to_string(),
            email: "amina.bello@example.com".to_string(),
            phone: "+2348012345678".to_string(),
            date_of_birth: Utc::now(),
            nationality: "NG".to_string(),
            customer_id: "CUST-0001".to_string(),
            bvn: Some("22212345678".to_string()),
            nin: None,
            kyc_status: "verified".to_string(),
            kyc_level: "tier2".to_string(),
            address_line1: "12 Marina Road".to_string(),
            address_line2: None,
            city: "Lagos".to_string(),
            state: "Lagos".to_string(),
            country: "NG".to_string(),
            postal_code: None,
            risk_score: 72.0,
            risk_category: "high".to_string(),
            pep_status: false,
            sanctions_checked: true,
            last_risk_assessment: None,
            account_numbers: serde_json::json!(["0123456789"]),
            account_types: serde_json::json!(["savings", "business"]),
            account_opening_date: Utc::now(),
            customer_since: Utc::now(),
            suspicious_activity_count: 0,
            last_transaction_date: None,
            average_monthly_turnover: Decimal::ZERO,
            is_blacklisted: false,
            blacklist_reason: None,
            requires_enhanced_dd: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_full_name() {
        assert_eq!(sample_customer().full_name(), "Amina Bello");
    }

    #[test]
    fn test_account_lists_decode() {
        let customer = sample_customer();
        assert_eq!(customer.account_number_list(), vec!["0123456789"]);
        assert_eq!(customer.account_type_list(), vec!["savings", "business"]);
        assert!(customer.is_high_risk());
    }
}
