//! Customer risk scoring and screening side-effects

use chrono::{Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::Set;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use prodetect_common::{aml, Principal};
use prodetect_database::entities::{customer, Customer, Transaction};
use prodetect_errors::{ProDetectError, Result};

use crate::audit::{AuditEvent, AuditSink};
use crate::models::{CreateCustomerRequest, EventCategory, RiskCategory, ScreeningOutcome};
use crate::repositories::{AlertRepository, CustomerRepository, TransactionRepository};
use crate::screening::SanctionsScreeningProvider;

/// Customer risk service: initial scoring, periodic reassessment and
/// sanctions screening side-effects
pub struct CustomerRiskService {
    customers: Arc<CustomerRepository>,
    transactions: Arc<TransactionRepository>,
    alerts: Arc<AlertRepository>,
    audit: Arc<AuditSink>,
    screener: Arc<dyn SanctionsScreeningProvider>,
}

impl CustomerRiskService {
    pub fn new(
        customers: Arc<CustomerRepository>,
        transactions: Arc<TransactionRepository>,
        alerts: Arc<AlertRepository>,
        audit: Arc<AuditSink>,
        screener: Arc<dyn SanctionsScreeningProvider>,
    ) -> Self {
        Self {
            customers,
            transactions,
            alerts,
            audit,
            screener,
        }
    }

    /// Create a customer record with its initial risk assessment
    pub async fn create_customer(
        &self,
        principal: &Principal,
        request: CreateCustomerRequest,
    ) -> Result<Customer> {
        use validator::Validate;
        request
            .validate()
            .map_err(|e| ProDetectError::validation(e.to_string(), "INVALID_CUSTOMER"))?;

        let risk_score = initial_risk_score(&request.nationality, &request.account_types);
        let now = Utc::now();

        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set(request.first_name.clone()),
            last_name: Set(request.last_name.clone()),
            email: Set(request.email),
            phone: Set(request.phone),
            date_of_birth: Set(request.date_of_birth),
            nationality: Set(request.nationality),
            customer_id: Set(request.customer_id),
            bvn: Set(request.bvn),
            nin: Set(request.nin),
            kyc_status: Set("pending".to_string()),
            kyc_level: Set("tier1".to_string()),
            address_line1: Set(request.address_line1),
            address_line2: Set(request.address_line2),
            city: Set(request.city),
            state: Set(request.state),
            country: Set(request.country),
            postal_code: Set(request.postal_code),
            risk_score: Set(risk_score),
            risk_category: Set(RiskCategory::from_score(risk_score).as_str().to_string()),
            pep_status: Set(false),
            sanctions_checked: Set(false),
            last_risk_assessment: Set(None),
            account_numbers: Set(serde_json::to_value(request.account_numbers)?),
            account_types: Set(serde_json::to_value(request.account_types)?),
            account_opening_date: Set(request.account_opening_date),
            // customer_since is the record creation instant, not the account
            // opening date
            customer_since: Set(now),
            suspicious_activity_count: Set(0),
            last_transaction_date: Set(None),
            average_monthly_turnover: Set(Decimal::ZERO),
            is_blacklisted: Set(false),
            blacklist_reason: Set(None),
            requires_enhanced_dd: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(principal.id),
        };

        let created = self.customers.insert(model).await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CustomerManagement,
                    "customer_created",
                    "create",
                    "customer",
                    principal,
                    format!("Customer {} created", created.full_name()),
                )
                .with_resource(created.id)
                .with_resource_identifier(created.customer_id.clone()),
            )
            .await?;

        Ok(created)
    }

    /// Recalculate the risk score from the trailing 90 days of activity
    pub async fn refresh_risk_score(
        &self,
        principal: &Principal,
        customer_id: Uuid,
    ) -> Result<Customer> {
        let customer = self.customers.get(customer_id).await?;
        let since = Utc::now() - Duration::days(90);

        let recent_transactions = self.transactions.by_customer_since(customer_id, since).await?;
        let recent_alerts = self.alerts.by_customer_since(customer_id, since).await?;

        let old_score = customer.risk_score;
        let new_score =
            dynamic_risk_score(customer.risk_score, &recent_transactions, recent_alerts.len());
        let new_category = RiskCategory::from_score(new_score);

        let updated = self
            .customers
            .update_risk(customer_id, new_score, new_category.as_str())
            .await?;

        info!(customer = %customer_id, old_score, new_score, "Customer risk score refreshed");

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CustomerManagement,
                    "risk_score_updated",
                    "update",
                    "customer",
                    principal,
                    format!("Risk score updated from {} to {}", old_score, new_score),
                )
                .with_resource(customer_id)
                .with_change(
                    serde_json::json!({ "risk_score": old_score }),
                    serde_json::json!({ "risk_score": new_score }),
                ),
            )
            .await?;

        Ok(updated)
    }

    /// High-risk customers due for review
    pub async fn high_risk_customers(
        &self,
        principal: &Principal,
        limit: u64,
    ) -> Result<Vec<Customer>> {
        let customers = self.customers.high_risk(limit).await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CustomerManagement,
                    "high_risk_customers_accessed",
                    "view",
                    "customer",
                    principal,
                    format!("Accessed {} high-risk customers", customers.len()),
                )
                .with_records_affected(customers.len() as i32),
            )
            .await?;

        Ok(customers)
    }

    /// Run sanctions/PEP screening and apply the result to the customer record
    pub async fn screen_customer(
        &self,
        principal: &Principal,
        customer_id: Uuid,
    ) -> Result<ScreeningOutcome> {
        let customer = self.customers.get(customer_id).await?;

        let outcome =
            self.screener
                .screen(&customer)
                .await
                .map_err(|e| ProDetectError::ExternalService {
                    service: "sanctions_screening".to_string(),
                    message: e.to_string(),
                    code: "SCREENING_FAILED".to_string(),
                })?;

        let (new_score, new_category, requires_edd) = if outcome.any_hit() {
            let score = clamp(customer.risk_score + 30.0);
            (
                Some(score),
                Some(RiskCategory::from_score(score).as_str().to_string()),
                true,
            )
        } else {
            (None, None, false)
        };

        self.customers
            .update_screening(customer_id, outcome.pep_hit, new_score, new_category, requires_edd)
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CustomerManagement,
                    "sanctions_screening",
                    "screening",
                    "customer",
                    principal,
                    format!("Sanctions screening performed for {}", customer.full_name()),
                )
                .with_resource(customer_id)
                .with_details(serde_json::to_value(&outcome)?),
            )
            .await?;

        Ok(outcome)
    }
}

/// Initial risk score from nationality and account mix
pub fn initial_risk_score(nationality: &str, account_types: &[String]) -> f64 {
    let mut score = 10.0;

    if aml::HIGH_RISK_COUNTRIES.contains(&nationality) {
        score += 40.0;
    }

    for account_type in account_types {
        if matches!(
            account_type.to_lowercase().as_str(),
            "business" | "corporate" | "trust"
        ) {
            score += 15.0;
        }
    }

    clamp(score)
}

/// Dynamic risk score from the trailing 90 days of behaviour
pub fn dynamic_risk_score(
    current_score: f64,
    transactions: &[Transaction],
    alert_count: usize,
) -> f64 {
    let mut score = current_score;

    let total_amount: f64 = transactions
        .iter()
        .map(|t| t.amount.to_f64().unwrap_or(0.0))
        .sum();
    if total_amount > 10_000_000.0 {
        score += 20.0;
    } else if total_amount > 5_000_000.0 {
        score += 10.0;
    }

    let transaction_count = transactions.len();
    if transaction_count > 1000 {
        score += 15.0;
    } else if transaction_count > 500 {
        score += 8.0;
    }

    if alert_count > 10 {
        score += 25.0;
    } else if alert_count > 5 {
        score += 15.0;
    } else if alert_count >= 1 {
        score += 5.0;
    }

    if !transactions.is_empty() {
        let cash_count = transactions.iter().filter(|t| t.cash_transaction).count();
        if cash_count as f64 / transactions.len() as f64 > 0.5 {
            score += 20.0;
        }
    }

    clamp(score)
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cash_transaction(amount: i64, cash: bool) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            transaction_id: "EXT-1".to_string(),
            reference_number: "REF-20240101-00000000".to_string(),
            transaction_type: "withdrawal".to_string(),
            transaction_method: if cash { "cash" } else { "mobile" }.to_string(),
            currency: "NGN".to_string(),
            amount: Decimal::from(amount),
            customer_id: Uuid::new_v4(),
            account_number: "0000000000".to_string(),
            beneficiary_name: None,
            beneficiary_account: None,
            beneficiary_bank: None,
            beneficiary_country: None,
            description: String::new(),
            channel: "atm".to_string(),
            location: None,
            ip_address: None,
            device_id: None,
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
            above_ctr_threshold: false,
            cross_border: false,
            cash_transaction: cash,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            processed_by: None,
        }
    }

    #[test]
    fn test_initial_score_baseline() {
        assert_eq!(initial_risk_score("NG", &["savings".to_string()]), 10.0);
    }

    #[test]
    fn test_initial_score_high_risk_nationality() {
        assert_eq!(initial_risk_score("IR", &[]), 50.0);
    }

    #[test]
    fn test_initial_score_account_types_accumulate() {
        let accounts = vec![
            "business".to_string(),
            "trust".to_string(),
            "savings".to_string(),
        ];
        assert_eq!(initial_risk_score("NG", &accounts), 40.0);
    }

    #[test]
    fn test_initial_score_saturates() {
        let accounts = vec!["business".to_string(); 10];
        assert_eq!(initial_risk_score("KP", &accounts), 100.0);
    }

    #[test]
    fn test_dynamic_score_volume_and_alert_bands() {
        let transactions: Vec<_> = (0..3).map(|_| cash_transaction(4_000_000, false)).collect();
        // 12M turnover adds 20, six alerts add 15
        assert_eq!(dynamic_risk_score(10.0, &transactions, 6), 45.0);
    }

    #[test]
    fn test_dynamic_score_cash_ratio() {
        let transactions = vec![
            cash_transaction(100_000, true),
            cash_transaction(100_000, true),
            cash_transaction(100_000, false),
        ];
        // cash ratio 2/3 adds 20
        assert_eq!(dynamic_risk_score(0.0, &transactions, 0), 20.0);
    }

    #[test]
    fn test_dynamic_score_clamps_at_ceiling() {
        let transactions: Vec<_> = (0..1001).map(|_| cash_transaction(20_000, true)).collect();
        let score = dynamic_risk_score(90.0, &transactions, 20);
        assert_eq!(score, 100.0);
    }
}
