//! Scenario tests for the monitoring evaluator and workflow helpers

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use prodetect_aml_service::cases::{calculate_sla_deadline, determine_case_risk_level};
use prodetect_aml_service::models::{AlertSeverity, CustomerActivity};
use prodetect_aml_service::monitoring::{clamp_score, detect_patterns, evaluate_rule};
use prodetect_aml_service::reporting::report_number;
use prodetect_config::AmlConfig;
use prodetect_database::entities::{Customer, Rule, Transaction};

fn customer(risk_category: &str, pep: bool) -> Customer {
    Customer {
        id: Uuid::new_v4(),
        first_name: "Chidi".to_string(),
        last_name: "Eze".to_string(),
        email: "chidi.eze@example.com".to_string(),
        phone: "+2347011122233".to_string(),
        date_of_birth: Utc::now(),
        nationality: "NG".to_string(),
        customer_id: "CUST-2001".to_string(),
        bvn: None,
        nin: None,
        kyc_status: "verified".to_string(),
        kyc_level: "tier2".to_string(),
        address_line1: "1 Unity Road".to_string(),
        address_line2: None,
        city: "Abuja".to_string(),
        state: "FCT".to_string(),
        country: "NG".to_string(),
        postal_code: None,
        risk_score: if risk_category == "high" { 80.0 } else { 15.0 },
        risk_category: risk_category.to_string(),
        pep_status: pep,
        sanctions_checked: true,
        last_risk_assessment: None,
        account_numbers: serde_json::json!(["2001002003"]),
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

fn transaction(amount: i64, beneficiary_country: Option<&str>) -> Transaction {
    let date = Utc.with_ymd_and_hms(2024, 5, 20, 11, 15, 0).unwrap();
    let cross_border = beneficiary_country.map(|c| c != "NG").unwrap_or(false);
    Transaction {
        id: Uuid::new_v4(),
        transaction_id: "EXT-5001".to_string(),
        reference_number: "REF-20240520-0a1b2c3d".to_string(),
        transaction_type: "transfer".to_string(),
        transaction_method: "mobile".to_string(),
        currency: "NGN".to_string(),
        amount: Decimal::from(amount),
        customer_id: Uuid::new_v4(),
        account_number: "2001002003".to_string(),
        beneficiary_name: beneficiary_country.map(|_| "Overseas Recipient".to_string()),
        beneficiary_account: None,
        beneficiary_bank: None,
        beneficiary_country: beneficiary_country.map(|c| c.to_string()),
        description: "transfer".to_string(),
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
        cross_border,
        cash_transaction: false,
        metadata: serde_json::json!({}),
        created_at: date,
        updated_at: date,
        processed_by: None,
    }
}

fn rule(code: &str, conditions: serde_json::Value, weight: f64, severity: &str) -> Rule {
    Rule {
        id: Uuid::new_v4(),
        rule_name: code.to_string(),
        rule_code: code.to_string(),
        rule_type: "transaction_monitoring".to_string(),
        category: "aml".to_string(),
        description: String::new(),
        business_justification: String::new(),
        regulatory_reference: None,
        conditions,
        thresholds: serde_json::json!({}),
        applies_to: "all".to_string(),
        customer_segments: serde_json::json!([]),
        transaction_types: serde_json::json!([]),
        channels: serde_json::json!([]),
        risk_weight: weight,
        severity_level: severity.to_string(),
        alert_priority: 2,
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
fn velocity_scenario_raises_alert_but_stays_below_suspicion() {
    // Fifty prior transactions of 200k NGN in the trailing 24 hours; the
    // fifty-first arrives.
    let config = AmlConfig::default();
    let velocity_rule = rule(
        "CBN-VEL-001",
        serde_json::json!({"velocity_check": true}),
        1.2,
        "medium",
    );
    let activity = CustomerActivity {
        count_24h: 50,
        total_24h: Decimal::from(10_000_000),
        ..Default::default()
    };

    let evaluation = evaluate_rule(
        &transaction(200_000, None),
        &customer("low", false),
        &velocity_rule,
        &activity,
        &config,
    );

    assert!(evaluation.triggered);
    assert!(evaluation.alert_required);
    assert!(evaluation.indicators.contains(&"velocity"));
    assert_eq!(
        AlertSeverity::parse(&velocity_rule.severity_level),
        AlertSeverity::Medium
    );
    // Contribution of 18 alone keeps the transaction below the suspicion bar
    let score = clamp_score(evaluation.risk_contribution);
    assert!(score < 60.0);
}

#[test]
fn structuring_scenario_triggers_on_fourth_subthreshold_transaction() {
    // Three prior transactions of 4.8M within 24 hours; a fourth of 4.9M
    // arrives. The in-band priors sum past the CTR threshold.
    let config = AmlConfig::default();
    let structuring_rule = rule(
        "CBN-VEL-001",
        serde_json::json!({"structuring_detection": true}),
        1.2,
        "medium",
    );
    let activity = CustomerActivity {
        count_24h: 3,
        total_24h: Decimal::from(14_400_000),
        structuring_count: 3,
        structuring_total: Decimal::from(14_400_000),
        ..Default::default()
    };

    let evaluation = evaluate_rule(
        &transaction(4_900_000, None),
        &customer("low", false),
        &structuring_rule,
        &activity,
        &config,
    );

    assert!(evaluation.triggered);
    assert!(evaluation.alert_required);
    assert!(evaluation.indicators.contains(&"structuring"));
    assert!(evaluation.risk_contribution >= 25.0);
}

#[test]
fn pep_cross_border_scenario_is_suspicious_with_two_alerts() {
    // PEP customer sends 2M NGN to Iran: the cross-border and PEP rules both
    // fire, each requiring an alert, and the combined score crosses 60.
    let config = AmlConfig::default();
    let cross_border_rule = rule(
        "CBN-CB-001",
        serde_json::json!({"cross_border": true, "high_risk_country": true}),
        2.0,
        "high",
    );
    let pep_rule = rule(
        "CBN-PEP-001",
        serde_json::json!({"customer_risk": true, "pep_monitoring": true}),
        1.8,
        "high",
    );

    let subject = customer("high", true);
    let txn = transaction(2_000_000, Some("IR"));
    let activity = CustomerActivity::default();

    let cb = evaluate_rule(&txn, &subject, &cross_border_rule, &activity, &config);
    let pep = evaluate_rule(&txn, &subject, &pep_rule, &activity, &config);

    assert!(cb.triggered && cb.alert_required);
    assert!(pep.triggered && pep.alert_required);

    let total = clamp_score(cb.risk_contribution + pep.risk_contribution);
    assert!(total >= 60.0);
}

#[test]
fn ctr_threshold_is_inclusive() {
    assert!(transaction(5_000_000, None).above_ctr_threshold);
    assert!(!transaction(4_999_999, None).above_ctr_threshold);
}

#[test]
fn quiet_transaction_produces_no_findings() {
    let config = AmlConfig::default();
    let all_rules = vec![
        rule("CBN-CASH-001", serde_json::json!({"amount_threshold": true, "cash_monitoring": true}), 1.5, "high"),
        rule("CBN-VEL-001", serde_json::json!({"velocity_check": true, "structuring_detection": true}), 1.2, "medium"),
        rule("CBN-CB-001", serde_json::json!({"cross_border": true, "high_risk_country": true}), 2.0, "high"),
        rule("CBN-PEP-001", serde_json::json!({"customer_risk": true, "pep_monitoring": true}), 1.8, "high"),
    ];

    let subject = customer("low", false);
    let txn = transaction(50_000, None);
    let activity = CustomerActivity {
        count_24h: 1,
        total_24h: Decimal::from(50_000),
        average_30d: Some(Decimal::from(45_000)),
        ..Default::default()
    };

    let mut score = 0.0;
    for r in &all_rules {
        let evaluation = evaluate_rule(&txn, &subject, r, &activity, &config);
        assert!(!evaluation.triggered, "rule {} should stay quiet", r.rule_code);
        score += evaluation.risk_contribution;
    }
    let findings = detect_patterns(&txn, &activity);
    score += findings.risk_contribution;

    assert_eq!(clamp_score(score), 0.0);
    assert!(findings.alerts.is_empty());
}

#[test]
fn case_risk_and_sla_helpers_follow_regulatory_bands() {
    assert_eq!(determine_case_risk_level(82.0, 2), "critical");
    assert_eq!(determine_case_risk_level(61.0, 2), "high");

    let from = Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();
    let deadline = calculate_sla_deadline(1, "sanctions_investigation", from);
    assert_eq!((deadline - from).num_hours(), 4);
}

#[test]
fn report_numbers_are_month_scoped_and_zero_padded() {
    let at = Utc.with_ymd_and_hms(2024, 11, 3, 8, 0, 0).unwrap();
    assert_eq!(report_number("STR", at, 12), "STR-202411-0012");
}
