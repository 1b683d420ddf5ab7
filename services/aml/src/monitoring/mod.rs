//! Real-time transaction monitoring
//!
//! `process_transaction` persists the transaction, evaluates the active rule
//! snapshot, appends the pattern detectors, and writes transaction, alerts
//! and the audit record in one database transaction so readers never observe
//! a partial result. Rule evaluation itself is pure: it runs against a
//! preloaded `CustomerActivity` aggregate and the rule snapshot only.

use chrono::{Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use prodetect_common::Principal;
use prodetect_config::AmlConfig;
use prodetect_database::entities::{alert, transaction, Customer, Rule, Transaction};
use prodetect_errors::{ProDetectError, Result};

use crate::audit::{AuditEvent, AuditSink};
use crate::models::{
    AlertSeverity, CustomerActivity, DetectionMethod, EventCategory, MonitoringOutcome,
    PendingAlert, ProcessTransactionRequest, RuleEvaluation,
};
use crate::repositories::{
    AlertRepository, CustomerRepository, RuleRepository, TransactionRepository,
};

/// Pattern findings outside any configured rule
#[derive(Debug, Default)]
pub struct PatternFindings {
    pub risk_contribution: f64,
    pub flags: Vec<&'static str>,
    pub alerts: Vec<PendingAlert>,
}

/// Transaction monitoring engine
pub struct MonitoringEngine {
    db: DatabaseConnection,
    customers: Arc<CustomerRepository>,
    transactions: Arc<TransactionRepository>,
    alerts: Arc<AlertRepository>,
    rules: Arc<RuleRepository>,
    audit: Arc<AuditSink>,
    config: AmlConfig,
}

impl MonitoringEngine {
    pub fn new(
        db: DatabaseConnection,
        customers: Arc<CustomerRepository>,
        transactions: Arc<TransactionRepository>,
        alerts: Arc<AlertRepository>,
        rules: Arc<RuleRepository>,
        audit: Arc<AuditSink>,
        config: AmlConfig,
    ) -> Self {
        Self {
            db,
            customers,
            transactions,
            alerts,
            rules,
            audit,
            config,
        }
    }

    /// Process a new transaction: persist it with system-derived fields and
    /// run real-time AML monitoring against the active rule snapshot.
    pub async fn process_transaction(
        &self,
        principal: &Principal,
        request: ProcessTransactionRequest,
    ) -> Result<MonitoringOutcome> {
        use validator::Validate;
        request
            .validate()
            .map_err(|e| ProDetectError::validation(e.to_string(), "INVALID_TRANSACTION"))?;

        let customer = self.customers.get(request.customer_id).await?;

        // Snapshot the active rules before evaluation; mid-flight rule
        // changes do not affect this transaction.
        let active_rules = self.rules.active(Some("transaction_monitoring")).await?;

        let now = Utc::now();
        let cross_border = request
            .beneficiary_country
            .as_deref()
            .map(|country| country != self.config.home_country)
            .unwrap_or(false);
        let cash_transaction = matches!(
            request.transaction_method.to_lowercase().as_str(),
            "cash" | "atm_withdrawal"
        );
        let above_ctr_threshold = request.amount >= Decimal::from(self.config.ctr_threshold);

        let draft = transaction::Model {
            id: Uuid::new_v4(),
            transaction_id: request.transaction_id.clone(),
            reference_number: format!("REF-{}-{}", now.format("%Y%m%d"), short_hex()),
            transaction_type: request.transaction_type.clone(),
            transaction_method: request.transaction_method.clone(),
            currency: request.currency.clone(),
            amount: request.amount,
            customer_id: request.customer_id,
            account_number: request.account_number.clone(),
            beneficiary_name: request.beneficiary_name.clone(),
            beneficiary_account: request.beneficiary_account.clone(),
            beneficiary_bank: request.beneficiary_bank.clone(),
            beneficiary_country: request.beneficiary_country.clone(),
            description: request.description.clone(),
            channel: request.channel.clone(),
            location: request.location.clone(),
            ip_address: request.ip_address.clone(),
            device_id: request.device_id.clone(),
            transaction_date: now,
            value_date: now,
            processing_date: now,
            status: "completed".to_string(),
            failure_reason: None,
            risk_score: 0.0,
            risk_flags: serde_json::json!({}),
            is_suspicious: false,
            alert_count: 0,
            structuring_indicator: false,
            velocity_flag: false,
            amount_threshold_flag: false,
            unusual_pattern_flag: false,
            above_ctr_threshold,
            cross_border,
            cash_transaction,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            processed_by: Some(principal.id),
        };

        let activity = self
            .transactions
            .customer_activity(customer.id, now, &self.config)
            .await?;

        let mut risk_score = 0.0;
        let mut indicators: Vec<String> = Vec::new();
        let mut pending_alerts: Vec<PendingAlert> = Vec::new();
        let mut triggered_rule_alerts: Vec<(Uuid, i32)> = Vec::new();

        for rule in &active_rules {
            let evaluation = evaluate_rule(&draft, &customer, rule, &activity, &self.config);
            if !evaluation.triggered {
                debug!(rule_code = %rule.rule_code, "Rule did not trigger");
                continue;
            }

            info!(rule_code = %rule.rule_code, transaction = %draft.transaction_id, "Rule triggered");
            risk_score += evaluation.risk_contribution;
            indicators.push(rule.rule_code.to_lowercase());
            for indicator in &evaluation.indicators {
                indicators.push(indicator.to_string());
            }

            let mut alerts_for_rule = 0;
            if evaluation.alert_required {
                pending_alerts.push(PendingAlert {
                    rule_id: Some(rule.id),
                    rule_name: rule.rule_name.clone(),
                    severity: AlertSeverity::parse(&rule.severity_level),
                    priority: rule.alert_priority,
                    risk_score: evaluation.risk_contribution,
                    threshold_values: serde_json::Value::Object(evaluation.threshold_values),
                    description: format!(
                        "Transaction {} triggered AML rule: {}",
                        draft.transaction_id, rule.rule_name
                    ),
                });
                alerts_for_rule = 1;
            }
            triggered_rule_alerts.push((rule.id, alerts_for_rule));
        }

        let patterns = detect_patterns(&draft, &activity);
        risk_score += patterns.risk_contribution;
        indicators.extend(patterns.flags.iter().map(|flag| flag.to_string()));
        pending_alerts.extend(patterns.alerts);

        let risk_score = clamp_score(risk_score);
        let is_suspicious = risk_score >= prodetect_common::aml::SUSPICIOUS_SCORE;

        let mut risk_flags = serde_json::Map::new();
        for indicator in &indicators {
            risk_flags.insert(indicator.clone(), serde_json::Value::Bool(true));
        }

        let has = |name: &str| indicators.iter().any(|i| i == name);
        let unusual_pattern =
            has("unusual_amount") || has("unusual_time") || has("round_amount");

        // Transaction, alerts, rule counters and the audit record become
        // visible atomically.
        let txn = self.db.begin().await?;

        let persisted = self
            .transactions
            .insert_in(
                &txn,
                transaction::ActiveModel {
                    id: Set(draft.id),
                    transaction_id: Set(draft.transaction_id.clone()),
                    reference_number: Set(draft.reference_number.clone()),
                    transaction_type: Set(draft.transaction_type.clone()),
                    transaction_method: Set(draft.transaction_method.clone()),
                    currency: Set(draft.currency.clone()),
                    amount: Set(draft.amount),
                    customer_id: Set(draft.customer_id),
                    account_number: Set(draft.account_number.clone()),
                    beneficiary_name: Set(draft.beneficiary_name.clone()),
                    beneficiary_account: Set(draft.beneficiary_account.clone()),
                    beneficiary_bank: Set(draft.beneficiary_bank.clone()),
                    beneficiary_country: Set(draft.beneficiary_country.clone()),
                    description: Set(draft.description.clone()),
                    channel: Set(draft.channel.clone()),
                    location: Set(draft.location.clone()),
                    ip_address: Set(draft.ip_address.clone()),
                    device_id: Set(draft.device_id.clone()),
                    transaction_date: Set(draft.transaction_date),
                    value_date: Set(draft.value_date),
                    processing_date: Set(draft.processing_date),
                    status: Set(draft.status.clone()),
                    failure_reason: Set(None),
                    risk_score: Set(risk_score),
                    risk_flags: Set(serde_json::Value::Object(risk_flags.clone())),
                    is_suspicious: Set(is_suspicious),
                    alert_count: Set(pending_alerts.len() as i32),
                    structuring_indicator: Set(has("structuring")),
                    velocity_flag: Set(has("velocity")),
                    amount_threshold_flag: Set(has("amount_threshold")),
                    unusual_pattern_flag: Set(unusual_pattern),
                    above_ctr_threshold: Set(draft.above_ctr_threshold),
                    cross_border: Set(draft.cross_border),
                    cash_transaction: Set(draft.cash_transaction),
                    metadata: Set(serde_json::json!({})),
                    created_at: Set(now),
                    updated_at: Set(now),
                    processed_by: Set(Some(principal.id)),
                },
            )
            .await?;

        for pending in &pending_alerts {
            let alert = self
                .alerts
                .insert_in(&txn, build_alert(&persisted, pending, now))
                .await?;

            self.audit
                .emit_in(
                    &txn,
                    AuditEvent::new(
                        EventCategory::TransactionMonitoring,
                        "alert_generated",
                        "create",
                        "alert",
                        principal,
                        format!("Alert generated for transaction {}", persisted.transaction_id),
                    )
                    .with_resource(alert.id)
                    .with_resource_identifier(alert.alert_id.clone())
                    .with_details(serde_json::json!({
                        "rule_name": &pending.rule_name,
                        "severity": pending.severity,
                        "risk_score": pending.risk_score,
                    })),
                )
                .await?;
        }

        // Pattern-synthesised alerts carry no rule id and do not count
        // toward any rule's counters.
        for (rule_id, alerts_generated) in &triggered_rule_alerts {
            self.rules
                .record_trigger_in(&txn, *rule_id, *alerts_generated)
                .await?;
        }

        let outcome = MonitoringOutcome {
            transaction_id: persisted.id,
            reference_number: persisted.reference_number.clone(),
            risk_score,
            risk_flags: serde_json::Value::Object(risk_flags),
            is_suspicious,
            alerts_generated: pending_alerts.len(),
            rules_triggered: triggered_rule_alerts.len(),
            monitoring_timestamp: now,
        };

        self.audit
            .emit_in(
                &txn,
                AuditEvent::new(
                    EventCategory::TransactionMonitoring,
                    "transaction_processed",
                    "create",
                    "transaction",
                    principal,
                    format!(
                        "Transaction {} processed for amount {} {}",
                        persisted.transaction_id, persisted.amount, persisted.currency
                    ),
                )
                .with_resource(persisted.id)
                .with_resource_identifier(persisted.reference_number.clone())
                .with_details(serde_json::to_value(&outcome)?),
            )
            .await?;

        txn.commit().await?;

        info!(
            transaction = %persisted.transaction_id,
            risk_score,
            is_suspicious,
            alerts = outcome.alerts_generated,
            "Transaction monitoring completed"
        );

        Ok(outcome)
    }

    /// Suspicious transactions for analyst review, highest risk first
    pub async fn suspicious_transactions(
        &self,
        principal: &Principal,
        days: i64,
        limit: u64,
    ) -> Result<Vec<Transaction>> {
        let results = self.transactions.suspicious(days, limit).await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::TransactionMonitoring,
                    "suspicious_transactions_accessed",
                    "view",
                    "transaction",
                    principal,
                    format!(
                        "Accessed {} suspicious transactions from last {} days",
                        results.len(),
                        days
                    ),
                )
                .with_records_affected(results.len() as i32),
            )
            .await?;

        Ok(results)
    }
}

/// Evaluate one rule against one transaction. Deterministic given the rule
/// snapshot and the preloaded activity aggregates; predicates run in fixed
/// order and their weighted contributions sum.
pub fn evaluate_rule(
    transaction: &Transaction,
    customer: &Customer,
    rule: &Rule,
    activity: &CustomerActivity,
    config: &AmlConfig,
) -> RuleEvaluation {
    let mut evaluation = RuleEvaluation::default();
    let amount = transaction.amount.to_f64().unwrap_or(0.0);

    if rule.condition_enabled("amount_threshold") {
        let threshold = rule
            .threshold("amount")
            .unwrap_or(config.default_amount_threshold as f64);
        if amount >= threshold {
            evaluation.triggered = true;
            evaluation.risk_contribution += rule.risk_weight * 20.0;
            evaluation.alert_required = true;
            evaluation.indicators.push("amount_threshold");
            evaluation.threshold_values.insert(
                "amount".to_string(),
                serde_json::json!({ "actual": amount, "threshold": threshold }),
            );
        }
    }

    if rule.condition_enabled("velocity_check") {
        let count_exceeded = activity.count_24h >= config.velocity_count_24h;
        let amount_exceeded =
            activity.total_24h >= Decimal::from(config.velocity_amount_24h);
        if count_exceeded || amount_exceeded {
            evaluation.triggered = true;
            evaluation.risk_contribution += rule.risk_weight * 15.0;
            evaluation.alert_required = true;
            evaluation.indicators.push("velocity");
            evaluation.threshold_values.insert(
                "velocity".to_string(),
                serde_json::json!({
                    "transaction_count": activity.count_24h,
                    "total_amount": activity.total_24h,
                    "thresholds": {
                        "count_threshold": config.velocity_count_24h,
                        "amount_threshold": config.velocity_amount_24h,
                    },
                }),
            );
        }
    }

    if rule.condition_enabled("structuring_detection") {
        let combined_exceeds_ctr =
            activity.structuring_total > Decimal::from(config.ctr_threshold);
        if activity.structuring_count >= config.structuring_min_count && combined_exceeds_ctr {
            evaluation.triggered = true;
            evaluation.risk_contribution += rule.risk_weight * 25.0;
            evaluation.alert_required = true;
            evaluation.indicators.push("structuring");
            evaluation.threshold_values.insert(
                "structuring".to_string(),
                serde_json::json!({
                    "transaction_count": activity.structuring_count,
                    "total_amount": activity.structuring_total,
                }),
            );
        }
    }

    if rule.condition_enabled("cross_border") && transaction.cross_border {
        evaluation.triggered = true;
        evaluation.risk_contribution += rule.risk_weight * 10.0;
        evaluation.indicators.push("cross_border");

        if let Some(country) = &transaction.beneficiary_country {
            if config.is_sanctioned_country(country) {
                evaluation.risk_contribution += rule.risk_weight * 20.0;
                evaluation.alert_required = true;
                evaluation.indicators.push("high_risk_country");
                evaluation.threshold_values.insert(
                    "high_risk_country".to_string(),
                    serde_json::json!({ "beneficiary_country": country }),
                );
            }
        }
    }

    if rule.condition_enabled("cash_monitoring") && transaction.cash_transaction {
        let threshold = rule
            .threshold("cash_amount")
            .unwrap_or(config.default_cash_threshold as f64);
        if amount >= threshold {
            evaluation.triggered = true;
            evaluation.risk_contribution += rule.risk_weight * 15.0;
            evaluation.alert_required = true;
            evaluation.indicators.push("cash_transaction");
            evaluation.threshold_values.insert(
                "cash_amount".to_string(),
                serde_json::json!({ "actual": amount, "threshold": threshold }),
            );
        }
    }

    if rule.condition_enabled("customer_risk") {
        if customer.risk_category == "high" {
            evaluation.triggered = true;
            evaluation.risk_contribution += rule.risk_weight * 10.0;
            evaluation.indicators.push("high_risk_customer");
        }
        if customer.pep_status {
            evaluation.triggered = true;
            evaluation.risk_contribution += rule.risk_weight * 15.0;
            evaluation.alert_required = true;
            evaluation.indicators.push("pep_customer");
        }
    }

    evaluation
}

/// Pattern detectors that run on every transaction regardless of rule
/// configuration.
pub fn detect_patterns(transaction: &Transaction, activity: &CustomerActivity) -> PatternFindings {
    let mut findings = PatternFindings::default();
    let million = Decimal::from(1_000_000i64);

    let hour = transaction.transaction_date.hour();
    if hour < 6 || hour > 22 {
        findings.risk_contribution += 5.0;
        findings.flags.push("unusual_time");
    }

    if transaction.amount >= million && transaction.amount % million == Decimal::ZERO {
        findings.risk_contribution += 8.0;
        findings.flags.push("round_amount");
    }

    if let Some(average) = activity.average_30d {
        if average > Decimal::ZERO && transaction.amount > average * Decimal::from(10) {
            findings.risk_contribution += 15.0;
            findings.flags.push("unusual_amount");
            findings.alerts.push(PendingAlert {
                rule_id: None,
                rule_name: "Unusual Amount Pattern".to_string(),
                severity: AlertSeverity::Medium,
                priority: 3,
                risk_score: 15.0,
                threshold_values: serde_json::json!({
                    "customer_average": average,
                    "actual": transaction.amount,
                }),
                description: format!(
                    "Transaction amount {} is 10x higher than customer average",
                    transaction.amount
                ),
            });
        }
    }

    findings
}

/// Saturate a risk score into the [0, 100] band
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn build_alert(
    transaction: &Transaction,
    pending: &PendingAlert,
    now: chrono::DateTime<Utc>,
) -> alert::ActiveModel {
    alert::ActiveModel {
        id: Set(Uuid::new_v4()),
        alert_id: Set(format!("TXN-{}-{}", now.format("%Y%m%d"), short_hex())),
        alert_type: Set("transaction_monitoring".to_string()),
        alert_category: Set("aml".to_string()),
        customer_id: Set(transaction.customer_id),
        transaction_id: Set(Some(transaction.id)),
        rule_id: Set(pending.rule_id),
        title: Set(format!("Suspicious Transaction: {}", pending.rule_name)),
        description: Set(pending.description.clone()),
        severity: Set(pending.severity.as_str().to_string()),
        priority: Set(pending.priority),
        risk_score: Set(pending.risk_score),
        risk_factors: Set(serde_json::json!([pending.description])),
        triggered_rules: Set(serde_json::json!([pending.rule_name])),
        threshold_values: Set(pending.threshold_values.clone()),
        status: Set("open".to_string()),
        assigned_to: Set(None),
        investigation_notes: Set(None),
        case_id: Set(None),
        escalation_level: Set(1),
        triggered_at: Set(now),
        acknowledged_at: Set(None),
        investigated_at: Set(None),
        resolved_at: Set(None),
        resolution: Set(None),
        resolution_notes: Set(None),
        resolved_by: Set(None),
        sla_deadline: Set(None),
        sla_breached: Set(false),
        regulatory_significance: Set(true),
        detection_method: Set(DetectionMethod::RuleBased.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_customer(risk_category: &str, pep: bool) -> Customer {
        Customer {
            id: Uuid::new_v4(),
            first_name: "Ngozi".to_string(),
            last_name: "Okafor".to_string(),
            email: "ngozi.okafor@example.com".to_string(),
            phone: "+2348098765432".to_string(),
            date_of_birth: Utc::now(),
            nationality: "NG".to_string(),
            customer_id: "CUST-1001".to_string(),
            bvn: None,
            nin: None,
            kyc_status: "verified".to_string(),
            kyc_level: "tier2".to_string(),
            address_line1: "4 Broad Street".to_string(),
            address_line2: None,
            city: "Lagos".to_string(),
            state: "Lagos".to_string(),
            country: "NG".to_string(),
            postal_code: None,
            risk_score: if risk_category == "high" { 75.0 } else { 20.0 },
            risk_category: risk_category.to_string(),
            pep_status: pep,
            sanctions_checked: true,
            last_risk_assessment: None,
            account_numbers: serde_json::json!(["0011223344"]),
            account_types: serde_json::json!(["savings"]),
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

    fn test_transaction(amount: i64) -> Transaction {
        // Mid-morning so the unusual-time detector stays quiet
        let date = Utc.with_ymd_and_hms(2024, 6, 12, 10, 30, 0).unwrap();
        Transaction {
            id: Uuid::new_v4(),
            transaction_id: "TXN-EXT-1".to_string(),
            reference_number: "REF-20240612-abcd1234".to_string(),
            transaction_type: "transfer".to_string(),
            transaction_method: "mobile".to_string(),
            currency: "NGN".to_string(),
            amount: Decimal::from(amount),
            customer_id: Uuid::new_v4(),
            account_number: "0011223344".to_string(),
            beneficiary_name: None,
            beneficiary_account: None,
            beneficiary_bank: None,
            beneficiary_country: None,
            description: "test transfer".to_string(),
            channel: "mobile_app".to_string(),
            location: None,
            ip_address: None,
            device_id: None,
            transaction_date: date,
            value_date: date,
            processing_date: date,
            status: "completed".to_string(),
            failure_reason: None,
            risk_score: 0.0,
            risk_flags: serde_json::json!({}),
            is_suspicious: false,
            alert_count: 0,
            structuring_indicator: false,
            velocity_flag: false,
            amount_threshold_flag: false,
            unusual_pattern_flag: false,
            above_ctr_threshold: amount >= 5_000_000,
            cross_border: false,
            cash_transaction: false,
            metadata: serde_json::json!({}),
            created_at: date,
            updated_at: date,
            processed_by: None,
        }
    }

    fn test_rule(conditions: serde_json::Value, thresholds: serde_json::Value, weight: f64) -> Rule {
        Rule {
            id: Uuid::new_v4(),
            rule_name: "Test Rule".to_string(),
            rule_code: "TEST-001".to_string(),
            rule_type: "transaction_monitoring".to_string(),
            category: "aml".to_string(),
            description: String::new(),
            business_justification: String::new(),
            regulatory_reference: None,
            conditions,
            thresholds,
            applies_to: "all".to_string(),
            customer_segments: serde_json::json!([]),
            transaction_types: serde_json::json!([]),
            channels: serde_json::json!([]),
            risk_weight: weight,
            severity_level: "medium".to_string(),
            alert_priority: 3,
            status: "active".to_string(),
            version: "1.0".to_string(),
            effective_date: None,
            expiry_date: None,
            test_results: serde_json::json!({}),
            false_positive_rate: None,
            effectiveness_score: None,
            last_tested: Some(Utc::now()),
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
        }
    }

    #[test]
    fn test_amount_threshold_triggers_at_boundary() {
        let rule = test_rule(
            serde_json::json!({"amount_threshold": true}),
            serde_json::json!({"amount": 1_000_000}),
            1.0,
        );
        let customer = test_customer("low", false);
        let config = AmlConfig::default();

        let below = evaluate_rule(
            &test_transaction(999_999),
            &customer,
            &rule,
            &CustomerActivity::default(),
            &config,
        );
        assert!(!below.triggered);

        let at = evaluate_rule(
            &test_transaction(1_000_000),
            &customer,
            &rule,
            &CustomerActivity::default(),
            &config,
        );
        assert!(at.triggered);
        assert!(at.alert_required);
        assert_eq!(at.risk_contribution, 20.0);
        assert!(at.threshold_values.contains_key("amount"));
    }

    #[test]
    fn test_velocity_triggers_on_count_or_volume() {
        let rule = test_rule(serde_json::json!({"velocity_check": true}), serde_json::json!({}), 1.2);
        let customer = test_customer("low", false);
        let config = AmlConfig::default();
        let transaction = test_transaction(200_000);

        let by_count = CustomerActivity {
            count_24h: 50,
            total_24h: Decimal::from(50 * 200_000),
            ..Default::default()
        };
        let evaluation = evaluate_rule(&transaction, &customer, &rule, &by_count, &config);
        assert!(evaluation.triggered);
        assert!(evaluation.alert_required);
        assert!((evaluation.risk_contribution - 18.0).abs() < 1e-9);

        let by_volume = CustomerActivity {
            count_24h: 3,
            total_24h: Decimal::from(10_000_000),
            ..Default::default()
        };
        assert!(evaluate_rule(&transaction, &customer, &rule, &by_volume, &config).triggered);

        let quiet = CustomerActivity {
            count_24h: 5,
            total_24h: Decimal::from(1_000_000),
            ..Default::default()
        };
        assert!(!evaluate_rule(&transaction, &customer, &rule, &quiet, &config).triggered);
    }

    #[test]
    fn test_structuring_needs_count_and_combined_total() {
        let rule = test_rule(
            serde_json::json!({"structuring_detection": true}),
            serde_json::json!({}),
            1.0,
        );
        let customer = test_customer("low", false);
        let config = AmlConfig::default();
        let transaction = test_transaction(4_900_000);

        // Three in-band transactions summing past the CTR threshold
        let active = CustomerActivity {
            structuring_count: 3,
            structuring_total: Decimal::from(14_400_000),
            ..Default::default()
        };
        let evaluation = evaluate_rule(&transaction, &customer, &rule, &active, &config);
        assert!(evaluation.triggered);
        assert_eq!(evaluation.risk_contribution, 25.0);

        // Two in-band transactions are not enough
        let sparse = CustomerActivity {
            structuring_count: 2,
            structuring_total: Decimal::from(9_700_000),
            ..Default::default()
        };
        assert!(!evaluate_rule(&transaction, &customer, &rule, &sparse, &config).triggered);
    }

    #[test]
    fn test_cross_border_sanctioned_country_requires_alert() {
        let rule = test_rule(serde_json::json!({"cross_border": true}), serde_json::json!({}), 2.0);
        let customer = test_customer("low", false);
        let config = AmlConfig::default();

        let mut transaction = test_transaction(2_000_000);
        transaction.cross_border = true;
        transaction.beneficiary_country = Some("IR".to_string());

        let evaluation = evaluate_rule(
            &transaction,
            &customer,
            &rule,
            &CustomerActivity::default(),
            &config,
        );
        assert!(evaluation.triggered);
        assert!(evaluation.alert_required);
        // base 10 plus sanctioned 20, each weighted by 2.0
        assert!((evaluation.risk_contribution - 60.0).abs() < f64::EPSILON);

        let mut benign = test_transaction(2_000_000);
        benign.cross_border = true;
        benign.beneficiary_country = Some("GB".to_string());
        let benign_eval = evaluate_rule(
            &benign,
            &customer,
            &rule,
            &CustomerActivity::default(),
            &config,
        );
        assert!(benign_eval.triggered);
        assert!(!benign_eval.alert_required);
        assert!((benign_eval.risk_contribution - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_customer_risk_sums_high_risk_and_pep() {
        let rule = test_rule(serde_json::json!({"customer_risk": true}), serde_json::json!({}), 1.8);
        let config = AmlConfig::default();
        let transaction = test_transaction(100_000);

        let pep_high = test_customer("high", true);
        let evaluation = evaluate_rule(
            &transaction,
            &pep_high,
            &rule,
            &CustomerActivity::default(),
            &config,
        );
        assert!(evaluation.triggered);
        assert!(evaluation.alert_required);
        // high-risk 10 plus PEP 15, weighted by 1.8
        assert!((evaluation.risk_contribution - 45.0).abs() < 1e-9);

        let plain = test_customer("low", false);
        assert!(!evaluate_rule(
            &transaction,
            &plain,
            &rule,
            &CustomerActivity::default(),
            &config
        )
        .triggered);
    }

    #[test]
    fn test_pattern_detectors() {
        // Exact million at 3am
        let mut transaction = test_transaction(2_000_000);
        transaction.transaction_date = Utc.with_ymd_and_hms(2024, 6, 12, 3, 0, 0).unwrap();

        let findings = detect_patterns(&transaction, &CustomerActivity::default());
        assert!(findings.flags.contains(&"unusual_time"));
        assert!(findings.flags.contains(&"round_amount"));
        assert_eq!(findings.risk_contribution, 13.0);
        assert!(findings.alerts.is_empty());
    }

    #[test]
    fn test_unusual_amount_synthesises_alert() {
        let transaction = test_transaction(5_000_000);
        let activity = CustomerActivity {
            average_30d: Some(Decimal::from(100_000)),
            ..Default::default()
        };

        let findings = detect_patterns(&transaction, &activity);
        assert!(findings.flags.contains(&"unusual_amount"));
        assert_eq!(findings.alerts.len(), 1);
        let alert = &findings.alerts[0];
        assert_eq!(alert.severity, AlertSeverity::Medium);
        assert!(alert.rule_id.is_none());
    }

    #[test]
    fn test_score_saturates() {
        assert_eq!(clamp_score(180.0), 100.0);
        assert_eq!(clamp_score(-4.0), 0.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn test_reference_formats() {
        let hex = short_hex();
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
