//! Rule registry: lifecycle, back-testing and performance review of AML
//! monitoring rules

use chrono::{Duration, Utc};
use sea_orm::Set;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use prodetect_common::Principal;
use prodetect_config::AmlConfig;
use prodetect_database::entities::{rule, Rule};
use prodetect_errors::{ProDetectError, Result};

use crate::audit::{AuditEvent, AuditSink};
use crate::models::{
    AlertSeverity, CreateRuleRequest, EventCategory, RulePerformanceReport, RuleTestReport,
};
use crate::monitoring::evaluate_rule;
use crate::repositories::{AlertRepository, RuleRepository, TransactionRepository};

/// Back-testing replay cap, newest transactions first
const TEST_SAMPLE_CAP: u64 = 1000;

/// Registry of configurable monitoring rules
pub struct RuleRegistry {
    rules: Arc<RuleRepository>,
    transactions: Arc<TransactionRepository>,
    alerts: Arc<AlertRepository>,
    audit: Arc<AuditSink>,
    config: AmlConfig,
}

impl RuleRegistry {
    pub fn new(
        rules: Arc<RuleRepository>,
        transactions: Arc<TransactionRepository>,
        alerts: Arc<AlertRepository>,
        audit: Arc<AuditSink>,
        config: AmlConfig,
    ) -> Self {
        Self {
            rules,
            transactions,
            alerts,
            audit,
            config,
        }
    }

    /// Create a new monitoring rule in draft state
    pub async fn create_rule(
        &self,
        principal: &Principal,
        request: CreateRuleRequest,
    ) -> Result<Rule> {
        if self.rules.code_exists(&request.rule_code).await? {
            return Err(ProDetectError::validation(
                format!("Rule code {} already exists", request.rule_code),
                "DUPLICATE_RULE_CODE",
            ));
        }

        let now = Utc::now();
        let model = rule::ActiveModel {
            id: Set(Uuid::new_v4()),
            rule_name: Set(request.rule_name.clone()),
            rule_code: Set(request.rule_code.clone()),
            rule_type: Set(request.rule_type.clone()),
            category: Set(request.category.clone()),
            description: Set(request.description),
            business_justification: Set(request.business_justification),
            regulatory_reference: Set(request.regulatory_reference),
            conditions: Set(request.conditions),
            thresholds: Set(request.thresholds),
            applies_to: Set(request.applies_to),
            customer_segments: Set(serde_json::to_value(request.customer_segments)?),
            transaction_types: Set(serde_json::to_value(request.transaction_types)?),
            channels: Set(serde_json::to_value(request.channels)?),
            risk_weight: Set(request.risk_weight),
            severity_level: Set(request.severity_level.as_str().to_string()),
            alert_priority: Set(request.alert_priority),
            status: Set("draft".to_string()),
            version: Set("1.0".to_string()),
            effective_date: Set(None),
            expiry_date: Set(None),
            test_results: Set(serde_json::json!({})),
            false_positive_rate: Set(None),
            effectiveness_score: Set(None),
            last_tested: Set(None),
            total_triggers: Set(0),
            true_positives: Set(0),
            false_positives: Set(0),
            alerts_generated: Set(0),
            last_triggered: Set(None),
            performance_reviewed: Set(None),
            tuning_required: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(principal.id),
            last_modified_by: Set(None),
        };

        let created = self.rules.insert(model).await?;
        info!(rule_code = %created.rule_code, "AML rule created");

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::RulesManagement,
                    "rule_created",
                    "create",
                    "rule",
                    principal,
                    format!(
                        "AML rule {} ({}) created",
                        created.rule_name, created.rule_code
                    ),
                )
                .with_resource(created.id)
                .with_details(serde_json::json!({
                    "rule_type": request.rule_type,
                    "category": request.category,
                })),
            )
            .await?;

        Ok(created)
    }

    /// Replay a rule against historical transactions to measure effectiveness.
    ///
    /// A trigger counts as a true positive when the historical transaction was
    /// already marked suspicious, and a false positive otherwise.
    pub async fn test_rule(
        &self,
        principal: &Principal,
        rule_id: Uuid,
        test_period_days: i64,
    ) -> Result<RuleTestReport> {
        let rule = self.rules.get(rule_id).await?;
        let since = Utc::now() - Duration::days(test_period_days);

        let history = self
            .transactions
            .history_for_rule_test(&rule, since, TEST_SAMPLE_CAP)
            .await?;

        let mut total_triggers = 0usize;
        let mut true_positives = 0usize;
        let mut false_positives = 0usize;
        let total_transactions = history.len();

        for (transaction, customer) in &history {
            let Some(customer) = customer else {
                warn!(transaction = %transaction.id, "Skipping orphaned transaction in rule test");
                continue;
            };

            let activity = self
                .transactions
                .customer_activity(customer.id, transaction.transaction_date, &self.config)
                .await?;

            let evaluation = evaluate_rule(transaction, customer, &rule, &activity, &self.config);
            if evaluation.triggered {
                total_triggers += 1;
                if transaction.is_suspicious {
                    true_positives += 1;
                } else {
                    false_positives += 1;
                }
            }
        }

        let trigger_rate = percentage(total_triggers, total_transactions);
        let false_positive_rate = percentage(false_positives, total_triggers);
        let precision = if total_triggers > 0 {
            true_positives as f64 / total_triggers as f64
        } else {
            0.0
        };
        let effectiveness = precision * (1.0 - false_positive_rate / 100.0);

        let report = RuleTestReport {
            rule_id,
            test_period_days,
            total_transactions_tested: total_transactions,
            total_triggers,
            true_positives,
            false_positives,
            trigger_rate_percent: round2(trigger_rate),
            false_positive_rate_percent: round2(false_positive_rate),
            precision: round3(precision),
            effectiveness_score: round3(effectiveness),
            test_date: Utc::now(),
        };

        self.rules
            .update_test_results(
                rule_id,
                serde_json::to_value(&report)?,
                report.false_positive_rate_percent,
                report.effectiveness_score,
            )
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::RulesManagement,
                    "rule_tested",
                    "test",
                    "rule",
                    principal,
                    format!(
                        "Rule {} tested against {} historical transactions",
                        rule.rule_name, total_transactions
                    ),
                )
                .with_resource(rule_id)
                .with_details(serde_json::to_value(&report)?),
            )
            .await?;

        Ok(report)
    }

    /// Promote a tested rule into production monitoring
    pub async fn activate_rule(&self, principal: &Principal, rule_id: Uuid) -> Result<Rule> {
        let rule = self.rules.get(rule_id).await?;

        if rule.status == "active" {
            return Err(ProDetectError::state(
                "rule",
                "Rule is already active",
                "RULE_ALREADY_ACTIVE",
            ));
        }
        if rule.last_tested.is_none() {
            return Err(ProDetectError::state(
                "rule",
                "Rule must be tested before activation",
                "RULE_NOT_TESTED",
            ));
        }

        let old_status = rule.status.clone();
        let updated = self
            .rules
            .set_status(&rule, "active", Some(Utc::now()), principal.id)
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::RulesManagement,
                    "rule_activated",
                    "activate",
                    "rule",
                    principal,
                    format!("Rule {} activated for production monitoring", rule.rule_name),
                )
                .with_resource(rule_id)
                .with_change(
                    serde_json::json!({ "status": old_status }),
                    serde_json::json!({ "status": "active" }),
                ),
            )
            .await?;

        Ok(updated)
    }

    /// Withdraw an active rule from production monitoring
    pub async fn deactivate_rule(
        &self,
        principal: &Principal,
        rule_id: Uuid,
        reason: &str,
    ) -> Result<Rule> {
        let rule = self.rules.get(rule_id).await?;

        if rule.status != "active" {
            return Err(ProDetectError::state(
                "rule",
                "Rule is not currently active",
                "RULE_NOT_ACTIVE",
            ));
        }

        let old_status = rule.status.clone();
        let updated = self.rules.set_status(&rule, "inactive", None, principal.id).await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::RulesManagement,
                    "rule_deactivated",
                    "deactivate",
                    "rule",
                    principal,
                    format!("Rule {} deactivated. Reason: {}", rule.rule_name, reason),
                )
                .with_resource(rule_id)
                .with_change(
                    serde_json::json!({ "status": old_status }),
                    serde_json::json!({ "status": "inactive" }),
                )
                .with_details(serde_json::json!({ "deactivation_reason": reason })),
            )
            .await?;

        Ok(updated)
    }

    /// Tune rule thresholds, bumping the version and clearing the tuning flag
    pub async fn update_thresholds(
        &self,
        principal: &Principal,
        rule_id: Uuid,
        new_thresholds: serde_json::Value,
        reason: &str,
    ) -> Result<Rule> {
        let rule = self.rules.get(rule_id).await?;
        let old_thresholds = rule.thresholds.clone();
        let next_version = increment_version(&rule.version);

        let updated = self
            .rules
            .update_thresholds(&rule, new_thresholds.clone(), &next_version, principal.id)
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::RulesManagement,
                    "rule_thresholds_updated",
                    "update",
                    "rule",
                    principal,
                    format!(
                        "Rule {} thresholds updated. Reason: {}",
                        rule.rule_name, reason
                    ),
                )
                .with_resource(rule_id)
                .with_change(
                    serde_json::json!({ "thresholds": old_thresholds }),
                    serde_json::json!({ "thresholds": new_thresholds }),
                )
                .with_details(serde_json::json!({ "update_reason": reason })),
            )
            .await?;

        Ok(updated)
    }

    /// Production performance metrics for a rule over a trailing window
    pub async fn performance(
        &self,
        principal: &Principal,
        rule_id: Uuid,
        days: i64,
    ) -> Result<RulePerformanceReport> {
        let rule = self.rules.get(rule_id).await?;
        let since = Utc::now() - Duration::days(days);

        let aggregates = self.alerts.rule_performance(rule_id, since).await?;

        let total = aggregates.total_alerts;
        let false_positive_rate = percentage(aggregates.false_positives as usize, total as usize);
        let escalation_rate = percentage(aggregates.escalated_alerts as usize, total as usize);
        let resolution_rate = percentage(aggregates.resolved_alerts as usize, total as usize);
        let requires_tuning = false_positive_rate > 70.0 || escalation_rate < 10.0;

        let report = RulePerformanceReport {
            rule_id,
            rule_name: rule.rule_name.clone(),
            rule_code: rule.rule_code.clone(),
            measurement_period_days: days,
            total_alerts_generated: total,
            average_risk_score: round2(aggregates.average_risk_score.unwrap_or(0.0)),
            false_positive_count: aggregates.false_positives,
            false_positive_rate_percent: round2(false_positive_rate),
            escalated_alerts: aggregates.escalated_alerts,
            escalation_rate_percent: round2(escalation_rate),
            resolved_alerts: aggregates.resolved_alerts,
            resolution_rate_percent: round2(resolution_rate),
            effectiveness_score: round3(
                (1.0 - false_positive_rate / 100.0) * (escalation_rate / 100.0),
            ),
            requires_tuning,
            generated_at: Utc::now(),
        };

        self.rules
            .set_performance_review(rule_id, requires_tuning)
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::RulesManagement,
                    "rule_performance_reviewed",
                    "review",
                    "rule",
                    principal,
                    format!("Performance metrics reviewed for rule {}", rule.rule_name),
                )
                .with_resource(rule_id)
                .with_details(serde_json::to_value(&report)?),
            )
            .await?;

        Ok(report)
    }

    /// Active rules listing, optionally scoped to one rule type
    pub async fn active_rules(
        &self,
        principal: &Principal,
        rule_type: Option<&str>,
    ) -> Result<Vec<Rule>> {
        let rules = self.rules.active(rule_type).await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::RulesManagement,
                    "active_rules_accessed",
                    "view",
                    "rule",
                    principal,
                    format!("Accessed {} active rules", rules.len()),
                )
                .with_records_affected(rules.len() as i32),
            )
            .await?;

        Ok(rules)
    }

    /// Seed the standard CBN rule set. Idempotent: codes that already exist
    /// are skipped.
    pub async fn seed_standard_rules(&self, principal: &Principal) -> Result<Vec<Rule>> {
        let mut created = Vec::new();

        for request in standard_cbn_rules() {
            match self.create_rule(principal, request).await {
                Ok(rule) => created.push(rule),
                Err(ProDetectError::Validation { code, .. }) if code == "DUPLICATE_RULE_CODE" => {
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::RulesManagement,
                    "standard_rules_created",
                    "create",
                    "rule",
                    principal,
                    format!("Created {} standard CBN-compliant AML rules", created.len()),
                )
                .with_records_affected(created.len() as i32),
            )
            .await?;

        Ok(created)
    }
}

/// Increment the minor component of an `M.n` version string; anything
/// non-conforming resets to `1.1`.
pub fn increment_version(current: &str) -> String {
    match current.split_once('.') {
        Some((major, minor)) => match minor.parse::<u32>() {
            Ok(n) => format!("{}.{}", major, n + 1),
            Err(_) => "1.1".to_string(),
        },
        None => "1.1".to_string(),
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// The four standard CBN monitoring rules
fn standard_cbn_rules() -> Vec<CreateRuleRequest> {
    vec![
        CreateRuleRequest {
            rule_name: "High Value Cash Transaction".to_string(),
            rule_code: "CBN-CASH-001".to_string(),
            rule_type: "transaction_monitoring".to_string(),
            category: "aml".to_string(),
            description: "Monitor cash transactions above CBN reporting threshold".to_string(),
            business_justification: "CBN requires reporting of cash transactions above 5M NGN"
                .to_string(),
            regulatory_reference: Some("CBN AML/CFT Guidelines Section 4.2".to_string()),
            conditions: serde_json::json!({"amount_threshold": true, "cash_monitoring": true}),
            thresholds: serde_json::json!({"amount": 5000000, "cash_amount": 5000000}),
            applies_to: "all".to_string(),
            customer_segments: vec![],
            transaction_types: vec!["deposit".to_string(), "withdrawal".to_string()],
            channels: vec![],
            risk_weight: 1.5,
            severity_level: AlertSeverity::High,
            alert_priority: 2,
        },
        CreateRuleRequest {
            rule_name: "Rapid Transaction Velocity".to_string(),
            rule_code: "CBN-VEL-001".to_string(),
            rule_type: "transaction_monitoring".to_string(),
            category: "aml".to_string(),
            description: "Detect rapid succession of transactions indicating possible structuring"
                .to_string(),
            business_justification:
                "High frequency transactions may indicate structuring to avoid reporting"
                    .to_string(),
            regulatory_reference: Some("CBN AML/CFT Guidelines Section 3.1".to_string()),
            conditions: serde_json::json!({"velocity_check": true, "structuring_detection": true}),
            thresholds: serde_json::json!({"transaction_count_24h": 20, "amount_24h": 10000000}),
            applies_to: "all".to_string(),
            customer_segments: vec![],
            transaction_types: vec![],
            channels: vec![],
            risk_weight: 1.2,
            severity_level: AlertSeverity::Medium,
            alert_priority: 3,
        },
        CreateRuleRequest {
            rule_name: "Cross-Border High Risk Country".to_string(),
            rule_code: "CBN-CB-001".to_string(),
            rule_type: "transaction_monitoring".to_string(),
            category: "aml".to_string(),
            description: "Monitor transactions to/from high-risk countries".to_string(),
            business_justification:
                "Transactions with high-risk jurisdictions require enhanced monitoring".to_string(),
            regulatory_reference: Some("CBN AML/CFT Guidelines Section 5.3".to_string()),
            conditions: serde_json::json!({"cross_border": true, "high_risk_country": true}),
            thresholds: serde_json::json!({"amount": 1000000}),
            applies_to: "all".to_string(),
            customer_segments: vec![],
            transaction_types: vec![],
            channels: vec![],
            risk_weight: 2.0,
            severity_level: AlertSeverity::High,
            alert_priority: 1,
        },
        CreateRuleRequest {
            rule_name: "PEP Transaction Monitoring".to_string(),
            rule_code: "CBN-PEP-001".to_string(),
            rule_type: "transaction_monitoring".to_string(),
            category: "aml".to_string(),
            description: "Enhanced monitoring of Politically Exposed Persons".to_string(),
            business_justification: "PEPs require enhanced due diligence and monitoring"
                .to_string(),
            regulatory_reference: Some("CBN AML/CFT Guidelines Section 6.1".to_string()),
            conditions: serde_json::json!({"customer_risk": true, "pep_monitoring": true}),
            thresholds: serde_json::json!({"amount": 500000}),
            applies_to: "individuals".to_string(),
            customer_segments: vec![],
            transaction_types: vec![],
            channels: vec![],
            risk_weight: 1.8,
            severity_level: AlertSeverity::High,
            alert_priority: 2,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_version() {
        assert_eq!(increment_version("1.0"), "1.1");
        assert_eq!(increment_version("2.9"), "2.10");
        assert_eq!(increment_version("3"), "1.1");
        assert_eq!(increment_version("not-a-version"), "1.1");
        assert_eq!(increment_version("1.2.3"), "1.1");
    }

    #[test]
    fn test_percentage_handles_empty_denominator() {
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn test_standard_rules_carry_unique_codes() {
        let rules = standard_cbn_rules();
        assert_eq!(rules.len(), 4);
        let mut codes: Vec<_> = rules.iter().map(|r| r.rule_code.clone()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 4);
    }

    #[test]
    fn test_tuning_thresholds() {
        // 100 alerts, 80 false positives, 5 escalated: both conditions breach
        let fpr = percentage(80, 100);
        let escalation = percentage(5, 100);
        assert!(fpr > 70.0);
        assert!(escalation < 10.0);
    }
}
