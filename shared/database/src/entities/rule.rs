//! Monitoring rule entity model

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configurable AML monitoring rule
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // Identification
    pub rule_name: String,
    #[sea_orm(unique)]
    pub rule_code: String,
    pub rule_type: String,
    pub category: String,

    // Definition
    pub description: String,
    pub business_justification: String,
    pub regulatory_reference: Option<String>,

    // Logic. Conditions is a map of predicate name to enabled flag,
    // thresholds a map of threshold name to numeric value.
    pub conditions: Json,
    pub thresholds: Json,

    // Scope
    pub applies_to: String,
    pub customer_segments: Json,
    pub transaction_types: Json,
    pub channels: Json,

    // Risk settings
    pub risk_weight: f64,
    pub severity_level: String,
    pub alert_priority: i32,

    // Lifecycle
    pub status: String,
    pub version: String,
    pub effective_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,

    // Testing and validation
    pub test_results: Json,
    pub false_positive_rate: Option<f64>,
    pub effectiveness_score: Option<f64>,
    pub last_tested: Option<DateTime<Utc>>,

    // Performance counters
    pub total_triggers: i32,
    pub true_positives: i32,
    pub false_positives: i32,
    pub alerts_generated: i32,

    // Monitoring
    pub last_triggered: Option<DateTime<Utc>>,
    pub performance_reviewed: Option<DateTime<Utc>>,
    pub tuning_required: bool,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub last_modified_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::alert::Entity")]
    Alerts,
}

impl Related<super::alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    /// Whether a named condition predicate is enabled for this rule
    pub fn condition_enabled(&self, name: &str) -> bool {
        self.conditions
            .get(name)
            .map(|v| v.as_bool().unwrap_or(true))
            .unwrap_or(false)
    }

    /// Numeric threshold by name, when present
    pub fn threshold(&self, name: &str) -> Option<f64> {
        self.thresholds.get(name).and_then(|v| v.as_f64())
    }

    /// Scope list decoded from a JSON column
    pub fn scope_list(values: &Json) -> Vec<String> {
        serde_json::from_value(values.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_and_threshold_lookup() {
        let rule = Model {
            id: Uuid::new_v4(),
            rule_name: "High Value Cash Transaction".to_string(),
            rule_code: "CBN-CASH-001".to_string(),
            rule_type: "transaction_monitoring".to_string(),
            category: "aml".to_string(),
            description: String::new(),
            business_justification: String::new(),
            regulatory_reference: None,
            conditions: serde_json::json!({"amount_threshold": true, "cash_monitoring": true}),
            thresholds: serde_json::json!({"amount": 5000000, "cash_amount": 5000000}),
            applies_to: "all".to_string(),
            customer_segments: serde_json::json!([]),
            transaction_types: serde_json::json!(["deposit", "withdrawal"]),
            channels: serde_json::json!([]),
            risk_weight: 1.5,
            severity_level: "high".to_string(),
            alert_priority: 2,
            status: "draft".to_string(),
            version: "1.0".to_string(),
            effective_date: None,
            expiry_date: None,
            test_results: serde_json::json!({}),
            false_positive_rate: None,
            effectiveness_score: None,
            last_tested: None,
            total_triggers: 0,
            true_positives: 0,
            false_positives: 0,
            alerts_generated: 0,
            last_triggered: None,
            performance_reviewed: None,
            tuning_required: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: Uuid::new_v4(),
            last_modified_by: None,
        };

        assert!(rule.condition_enabled("amount_threshold"));
        assert!(!rule.condition_enabled("velocity_check"));
        assert_eq!(rule.threshold("amount"), Some(5_000_000.0));
        assert_eq!(rule.threshold("missing"), None);
        assert_eq!(
            Model::scope_list(&rule.transaction_types),
            vec!["deposit", "withdrawal"]
        );
    }
}
