//! AML service data models and types

use chrono::{DateTime, Utc};
use sea_orm::FromQueryResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use prodetect_common::aml;

// ---------------------------------------------------------------------------
// Domain enumerations. The store keeps these as lowercase strings; the typed
// variants are used everywhere inside the engine.
// ---------------------------------------------------------------------------

/// Customer risk category, a pure function of the risk score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    /// Partition a risk score into its category (70/40 boundaries)
    pub fn from_score(score: f64) -> Self {
        if score >= aml::HIGH_RISK_SCORE {
            Self::High
        } else if score >= aml::MEDIUM_RISK_SCORE {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// KYC verification status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }
}

/// Alert lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Investigating,
    Escalated,
    Closed,
    FalsePositive,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Investigating => "investigating",
            Self::Escalated => "escalated",
            Self::Closed => "closed",
            Self::FalsePositive => "false_positive",
        }
    }
}

/// Case lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    Investigating,
    PendingReview,
    Escalated,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Investigating => "investigating",
            Self::PendingReview => "pending_review",
            Self::Escalated => "escalated",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "investigating" => Some(Self::Investigating),
            "pending_review" => Some(Self::PendingReview),
            "escalated" => Some(Self::Escalated),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Regulatory report type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportType {
    #[serde(rename = "STR")]
    Str,
    #[serde(rename = "CTR")]
    Ctr,
    #[serde(rename = "SAR")]
    Sar,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "STR",
            Self::Ctr => "CTR",
            Self::Sar => "SAR",
        }
    }
}

/// Report workflow status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Draft,
    Review,
    Approved,
    Filed,
    Acknowledged,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Approved => "approved",
            Self::Filed => "filed",
            Self::Acknowledged => "acknowledged",
        }
    }
}

/// Rule lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Draft,
    Testing,
    Active,
    Inactive,
    Deprecated,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Testing => "testing",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Deprecated => "deprecated",
        }
    }
}

/// How an alert was detected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    RuleBased,
    MlModel,
    Manual,
    ExternalFeed,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::MlModel => "ml_model",
            Self::Manual => "manual",
            Self::ExternalFeed => "external_feed",
        }
    }
}

/// Audit event categories, the closed set every emitter must pick from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Authentication,
    TransactionMonitoring,
    CustomerManagement,
    CaseManagement,
    Reporting,
    RulesManagement,
    AuditManagement,
    System,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::TransactionMonitoring => "transaction_monitoring",
            Self::CustomerManagement => "customer_management",
            Self::CaseManagement => "case_management",
            Self::Reporting => "reporting",
            Self::RulesManagement => "rules_management",
            Self::AuditManagement => "audit_management",
            Self::System => "system",
        }
    }
}

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Customer creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100))]
    pub last_name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 7, max = 20))]
    pub phone: String,

    pub date_of_birth: DateTime<Utc>,

    #[validate(length(min = 2, max = 2))]
    pub nationality: String,

    /// Bank's internal customer identifier
    #[validate(length(min = 1, max = 50))]
    pub customer_id: String,

    pub bvn: Option<String>,
    pub nin: Option<String>,

    #[validate(length(min = 1))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: Option<String>,

    #[validate(length(min = 1))]
    pub account_numbers: Vec<String>,
    pub account_types: Vec<String>,
    pub account_opening_date: DateTime<Utc>,
}

/// Transaction processing request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProcessTransactionRequest {
    /// External system transaction identifier
    #[validate(length(min = 1, max = 100))]
    pub transaction_id: String,

    pub customer_id: Uuid,

    #[validate(length(min = 1, max = 50))]
    pub transaction_type: String,

    pub amount: Decimal,

    #[validate(length(min = 3, max = 3))]
    pub currency: String,

    #[validate(length(min = 1))]
    pub account_number: String,

    pub description: String,
    pub transaction_method: String,
    pub channel: String,
    pub beneficiary_name: Option<String>,
    pub beneficiary_account: Option<String>,
    pub beneficiary_bank: Option<String>,
    pub beneficiary_country: Option<String>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub device_id: Option<String>,
}

/// Rule creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRuleRequest {
    #[validate(length(min = 1, max = 200))]
    pub rule_name: String,

    /// Globally unique rule code (e.g. CBN-CASH-001)
    #[validate(length(min = 1, max = 50))]
    pub rule_code: String,

    pub rule_type: String,
    pub category: String,
    pub description: String,
    pub business_justification: String,
    pub regulatory_reference: Option<String>,

    /// Predicate name to enabled flag
    pub conditions: serde_json::Value,
    /// Threshold name to numeric value
    pub thresholds: serde_json::Value,

    pub applies_to: String,
    pub customer_segments: Vec<String>,
    pub transaction_types: Vec<String>,
    pub channels: Vec<String>,

    pub risk_weight: f64,
    pub severity_level: AlertSeverity,

    #[validate(range(min = 1, max = 5))]
    pub alert_priority: i32,
}

/// Case creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCaseRequest {
    #[validate(length(min = 1))]
    pub alert_ids: Vec<Uuid>,

    pub case_type: String,

    #[validate(length(min = 1, max = 300))]
    pub title: String,

    pub description: String,

    #[validate(range(min = 1, max = 5))]
    pub priority: i32,
}

/// STR creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateStrRequest {
    pub case_id: Uuid,

    #[validate(length(min = 1))]
    pub narrative: String,

    pub suspicious_activity_type: String,
    pub activity_description: String,
    pub timeline_of_events: String,
    pub incident_date_from: DateTime<Utc>,
    pub incident_date_to: DateTime<Utc>,
}

/// CTR creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCtrRequest {
    pub customer_id: Uuid,

    #[validate(length(min = 1))]
    pub transaction_ids: Vec<Uuid>,

    pub reporting_period_start: DateTime<Utc>,
    pub reporting_period_end: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Monitoring results
// ---------------------------------------------------------------------------

/// Preloaded customer activity aggregates the evaluator runs against.
///
/// Loading these once per transaction keeps the rule evaluation itself pure
/// and deterministic against the rule snapshot.
#[derive(Debug, Clone, Default)]
pub struct CustomerActivity {
    /// Transactions in the preceding 24 hours
    pub count_24h: u64,
    /// Aggregate amount in the preceding 24 hours
    pub total_24h: Decimal,
    /// Transactions in the structuring band over the preceding 24 hours
    pub structuring_count: usize,
    /// Aggregate amount of in-band transactions
    pub structuring_total: Decimal,
    /// Average transaction amount over the preceding 30 days
    pub average_30d: Option<Decimal>,
}

/// Outcome of evaluating one rule against one transaction
#[derive(Debug, Clone, Default)]
pub struct RuleEvaluation {
    pub triggered: bool,
    pub risk_contribution: f64,
    pub alert_required: bool,
    /// Actual vs threshold values for each predicate that fired
    pub threshold_values: serde_json::Map<String, serde_json::Value>,
    /// Indicator flags contributed by this rule
    pub indicators: Vec<&'static str>,
}

/// Alert payload accumulated during monitoring, persisted with the transaction
#[derive(Debug, Clone)]
pub struct PendingAlert {
    pub rule_id: Option<Uuid>,
    pub rule_name: String,
    pub severity: AlertSeverity,
    pub priority: i32,
    pub risk_score: f64,
    pub threshold_values: serde_json::Value,
    pub description: String,
}

/// Result of processing a transaction through the monitoring engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringOutcome {
    pub transaction_id: Uuid,
    pub reference_number: String,
    pub risk_score: f64,
    pub risk_flags: serde_json::Value,
    pub is_suspicious: bool,
    pub alerts_generated: usize,
    pub rules_triggered: usize,
    pub monitoring_timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Screening
// ---------------------------------------------------------------------------

/// Result envelope from the external sanctions/PEP screening boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    pub sanctions_hit: bool,
    pub pep_hit: bool,
    pub watchlist_hit: bool,
    pub confidence_score: f64,
    pub sources_checked: Vec<String>,
    pub screening_date: DateTime<Utc>,
}

impl ScreeningOutcome {
    pub fn any_hit(&self) -> bool {
        self.sanctions_hit || self.pep_hit || self.watchlist_hit
    }
}

// ---------------------------------------------------------------------------
// Rule testing and performance
// ---------------------------------------------------------------------------

/// Back-testing report for a rule over historical transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTestReport {
    pub rule_id: Uuid,
    pub test_period_days: i64,
    pub total_transactions_tested: usize,
    pub total_triggers: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub trigger_rate_percent: f64,
    pub false_positive_rate_percent: f64,
    pub precision: f64,
    pub effectiveness_score: f64,
    pub test_date: DateTime<Utc>,
}

/// Production performance metrics for a rule over a window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePerformanceReport {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub rule_code: String,
    pub measurement_period_days: i64,
    pub total_alerts_generated: i64,
    pub average_risk_score: f64,
    pub false_positive_count: i64,
    pub false_positive_rate_percent: f64,
    pub escalated_alerts: i64,
    pub escalation_rate_percent: f64,
    pub resolved_alerts: i64,
    pub resolution_rate_percent: f64,
    pub effectiveness_score: f64,
    pub requires_tuning: bool,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// NFIU export envelope, the exact shape filed with the authority
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NfiuExport {
    pub report_header: NfiuReportHeader,
    pub subject_information: serde_json::Value,
    pub transaction_details: NfiuTransactionDetails,
    pub narrative: String,
    pub suspicious_activity: NfiuSuspiciousActivity,
    pub compliance_officer: NfiuComplianceOfficer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NfiuReportHeader {
    pub report_number: String,
    pub report_type: String,
    pub filing_institution: String,
    pub filing_date: Option<DateTime<Utc>>,
    pub reporting_period: NfiuReportingPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NfiuReportingPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NfiuTransactionDetails {
    pub transaction_count: usize,
    pub total_amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NfiuSuspiciousActivity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NfiuComplianceOfficer {
    pub prepared_by: String,
    pub reviewed_by: Option<String>,
    pub approved_by: Option<String>,
}

/// Compliance statistics for a reporting window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceStatistics {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_strs: i64,
    pub filed_strs: i64,
    pub average_str_filing_hours: Option<f64>,
    pub total_ctrs: i64,
    pub filed_ctrs: i64,
    pub total_alerts: i64,
    pub escalated_alerts: i64,
    pub average_alert_risk_score: Option<f64>,
    pub total_cases: i64,
    pub closed_cases: i64,
    pub sla_breached_cases: i64,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Audit & forensics
// ---------------------------------------------------------------------------

/// Closed filter set for audit log search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSearchFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub event_type: Option<String>,
    pub event_category: Option<String>,
    pub user_email: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub action: Option<String>,
    pub limit: Option<u64>,
}

impl AuditSearchFilter {
    /// Number of filters actually applied (excludes the limit)
    pub fn active_filter_count(&self) -> usize {
        [
            self.start_date.is_some(),
            self.end_date.is_some(),
            self.event_type.is_some(),
            self.event_category.is_some(),
            self.user_email.is_some(),
            self.resource_type.is_some(),
            self.resource_id.is_some(),
            self.action.is_some(),
        ]
        .iter()
        .filter(|applied| **applied)
        .count()
    }
}

/// Per-user activity summary over a window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivitySummary {
    pub user_id: Uuid,
    pub analysis_period_days: i64,
    pub activity_breakdown: Vec<ActivityBreakdownRow>,
    pub login_summary: LoginSummary,
    pub high_risk_activities: Vec<serde_json::Value>,
    pub total_activities: i64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct ActivityBreakdownRow {
    pub event_category: String,
    pub action: String,
    pub count: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromQueryResult)]
pub struct LoginSummary {
    pub total_logins: i64,
    pub total_logouts: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub active_days: i64,
}

/// System-wide activity report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemActivityReport {
    pub report_period_days: i64,
    pub total_events: i64,
    pub active_users: i64,
    pub regulatory_significant_events: i64,
    pub suspicious_events: i64,
    pub activity_by_category: Vec<CategoryActivityRow>,
    pub daily_activity_trend: Vec<DailyActivityRow>,
    pub top_active_users: Vec<TopUserRow>,
    pub failed_operations: Vec<FailedOperationRow>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct CategoryActivityRow {
    pub event_category: String,
    pub event_count: i64,
    pub unique_users: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct DailyActivityRow {
    pub activity_date: chrono::NaiveDate,
    pub event_count: i64,
    pub unique_users: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct TopUserRow {
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub activity_count: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct FailedOperationRow {
    pub action: String,
    pub resource_type: String,
    pub failure_count: i64,
}

/// Suspicious user-activity patterns detected over the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousPatternReport {
    pub analysis_period_days: i64,
    pub unusual_login_times: Vec<UnusualLoginRow>,
    pub high_volume_data_access: Vec<HighVolumeAccessRow>,
    pub failed_authentication_attempts: Vec<FailedAuthRow>,
    pub rapid_successive_operations: Vec<RapidOperationsRow>,
    pub detection_timestamp: DateTime<Utc>,
}

impl SuspiciousPatternReport {
    pub fn total_findings(&self) -> usize {
        self.unusual_login_times.len()
            + self.high_volume_data_access.len()
            + self.failed_authentication_attempts.len()
            + self.rapid_successive_operations.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct UnusualLoginRow {
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub unusual_login_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct HighVolumeAccessRow {
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub total_records_accessed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct FailedAuthRow {
    pub user_email: Option<String>,
    pub ip_address: Option<String>,
    pub failed_attempts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct RapidOperationsRow {
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub operation_count: i64,
}

/// Bounded audit export for external compliance systems
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditExport {
    pub export_date: DateTime<Utc>,
    pub exported_by: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub format: String,
    pub total_records: usize,
    pub audit_logs: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_category_partition() {
        assert_eq!(RiskCategory::from_score(0.0), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(39.9), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(40.0), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(69.9), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(70.0), RiskCategory::High);
        assert_eq!(RiskCategory::from_score(100.0), RiskCategory::High);
    }

    #[test]
    fn test_severity_round_trip() {
        for severity in [
            AlertSeverity::Low,
            AlertSeverity::Medium,
            AlertSeverity::High,
            AlertSeverity::Critical,
        ] {
            assert_eq!(AlertSeverity::parse(severity.as_str()), severity);
        }
        // Unknown values degrade to medium rather than failing
        assert_eq!(AlertSeverity::parse("unknown"), AlertSeverity::Medium);
    }

    #[test]
    fn test_report_type_serialization_uses_regulator_codes() {
        assert_eq!(serde_json::to_string(&ReportType::Str).unwrap(), "\"STR\"");
        assert_eq!(serde_json::to_string(&ReportType::Ctr).unwrap(), "\"CTR\"");
    }

    #[test]
    fn test_audit_filter_count_ignores_limit() {
        let filter = AuditSearchFilter {
            event_category: Some("reporting".to_string()),
            action: Some("file".to_string()),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(filter.active_filter_count(), 2);
    }
}
