//! Audit sink and forensics
//!
//! The sink is injected into every component as a capability: no state-changing
//! operation completes without its audit write. `emit_in` lets the monitoring
//! engine commit the audit record in the same database transaction as the
//! business rows it describes.

use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use prodetect_common::{audit as audit_constants, Principal};
use prodetect_database::entities::{audit_log, AuditLog};
use prodetect_errors::Result;

use crate::models::{
    AuditExport, AuditSearchFilter, EventCategory, SuspiciousPatternReport, SystemActivityReport,
    UserActivitySummary,
};
use crate::repositories::AuditLogRepository;

/// A fully described business event, ready for durable recording
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: String,
    pub category: EventCategory,
    pub principal: Principal,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub resource_identifier: Option<String>,
    pub description: String,
    pub details: serde_json::Value,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub records_affected: Option<i32>,
    pub suspicious_activity: bool,
    pub regulatory_significance: bool,
    pub status: String,
}

impl AuditEvent {
    pub fn new(
        category: EventCategory,
        event_type: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        principal: &Principal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            category,
            principal: principal.clone(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            resource_identifier: None,
            description: description.into(),
            details: serde_json::json!({}),
            old_values: None,
            new_values: None,
            records_affected: None,
            suspicious_activity: false,
            regulatory_significance: true,
            status: "success".to_string(),
        }
    }

    pub fn with_resource(mut self, resource_id: Uuid) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn with_resource_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.resource_identifier = Some(identifier.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_change(
        mut self,
        old_values: serde_json::Value,
        new_values: serde_json::Value,
    ) -> Self {
        self.old_values = Some(old_values);
        self.new_values = Some(new_values);
        self
    }

    pub fn with_records_affected(mut self, count: i32) -> Self {
        self.records_affected = Some(count);
        self
    }

    pub fn suspicious(mut self) -> Self {
        self.suspicious_activity = true;
        self
    }
}

/// Append-only recorder for business events
pub struct AuditSink {
    db: DatabaseConnection,
    repository: Arc<AuditLogRepository>,
}

impl AuditSink {
    pub fn new(db: DatabaseConnection, repository: Arc<AuditLogRepository>) -> Self {
        Self { db, repository }
    }

    /// Durably record an event. A storage failure here fails the enclosing
    /// business operation.
    pub async fn emit(&self, event: AuditEvent) -> Result<AuditLog> {
        self.emit_in(&self.db, event).await
    }

    /// Record an event on a caller-owned connection or transaction, so the
    /// audit row commits atomically with the business write.
    pub async fn emit_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        event: AuditEvent,
    ) -> Result<AuditLog> {
        debug!(
            event_type = %event.event_type,
            category = %event.category.as_str(),
            "Recording audit event"
        );

        let now = Utc::now();
        let model = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            event_id: Set(Uuid::new_v4().to_string()),
            event_type: Set(event.event_type),
            event_category: Set(event.category.as_str().to_string()),
            user_id: Set(Some(event.principal.id)),
            user_email: Set(Some(event.principal.email)),
            user_role: Set(Some(event.principal.role)),
            impersonated_by: Set(None),
            action: Set(event.action),
            resource_type: Set(event.resource_type),
            resource_id: Set(event.resource_id),
            resource_identifier: Set(event.resource_identifier),
            description: Set(event.description),
            details: Set(event.details),
            ip_address: Set(None),
            user_agent: Set(None),
            session_id: Set(None),
            request_id: Set(None),
            correlation_id: Set(None),
            old_values: Set(event.old_values),
            new_values: Set(event.new_values),
            changed_fields: Set(None),
            risk_score: Set(None),
            suspicious_activity: Set(event.suspicious_activity),
            regulatory_significance: Set(event.regulatory_significance),
            retention_period: Set(audit_constants::RETENTION_YEARS),
            data_classification: Set("internal".to_string()),
            records_affected: Set(event.records_affected),
            status: Set(event.status),
            error_message: Set(None),
            timestamp: Set(now),
            reviewed: Set(false),
            reviewed_by: Set(None),
            review_date: Set(None),
            review_notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        self.repository.insert_in(conn, model).await
    }
}

/// Forensic queries over the audit trail
pub struct AuditService {
    repository: Arc<AuditLogRepository>,
    sink: Arc<AuditSink>,
}

impl AuditService {
    pub fn new(repository: Arc<AuditLogRepository>, sink: Arc<AuditSink>) -> Self {
        Self { repository, sink }
    }

    /// Search audit logs with the closed filter set, always bounded
    pub async fn search(
        &self,
        principal: &Principal,
        filter: AuditSearchFilter,
    ) -> Result<Vec<AuditLog>> {
        let results = self.repository.search(&filter).await?;

        self.sink
            .emit(
                AuditEvent::new(
                    EventCategory::AuditManagement,
                    "audit_access",
                    "search",
                    "audit_log",
                    principal,
                    format!(
                        "Audit log search performed with {} filters",
                        filter.active_filter_count()
                    ),
                )
                .with_details(serde_json::json!({
                    "filters": filter,
                    "results_count": results.len(),
                }))
                .with_records_affected(results.len() as i32),
            )
            .await?;

        Ok(results)
    }

    /// Activity summary for one user over a trailing window
    pub async fn user_activity_summary(
        &self,
        principal: &Principal,
        target_user_id: Uuid,
        days: i64,
    ) -> Result<UserActivitySummary> {
        let since = Utc::now() - Duration::days(days);

        let activity_breakdown = self.repository.activity_breakdown(target_user_id, since).await?;
        let login_summary = self.repository.login_summary(target_user_id, since).await?;
        let high_risk = self
            .repository
            .high_risk_activities(target_user_id, since, 20)
            .await?;

        let total_activities = activity_breakdown.iter().map(|row| row.count).sum();

        let summary = UserActivitySummary {
            user_id: target_user_id,
            analysis_period_days: days,
            activity_breakdown,
            login_summary,
            high_risk_activities: high_risk
                .into_iter()
                .map(|log| serde_json::to_value(log).unwrap_or_default())
                .collect(),
            total_activities,
            generated_at: Utc::now(),
        };

        self.sink
            .emit(
                AuditEvent::new(
                    EventCategory::AuditManagement,
                    "audit_access",
                    "search",
                    "audit_log",
                    principal,
                    format!("User activity summary generated for user {}", target_user_id),
                )
                .with_details(serde_json::json!({
                    "target_user": target_user_id,
                    "period_days": days,
                })),
            )
            .await?;

        Ok(summary)
    }

    /// System-wide activity report over a trailing window
    pub async fn system_activity_report(
        &self,
        principal: &Principal,
        days: i64,
    ) -> Result<SystemActivityReport> {
        let since = Utc::now() - Duration::days(days);

        let overall = self.repository.overall_statistics(since).await?;
        let by_category = self.repository.category_statistics(since).await?;
        let daily_trend = self.repository.daily_trend(since).await?;
        let top_users = self.repository.top_users(since, 10).await?;
        let failed_operations = self.repository.failed_operations(since).await?;

        let report = SystemActivityReport {
            report_period_days: days,
            total_events: overall.total_events,
            active_users: overall.active_users,
            regulatory_significant_events: overall.regulatory_significant_events,
            suspicious_events: overall.suspicious_events,
            activity_by_category: by_category,
            daily_activity_trend: daily_trend,
            top_active_users: top_users,
            failed_operations,
            generated_at: Utc::now(),
        };

        self.sink
            .emit(
                AuditEvent::new(
                    EventCategory::AuditManagement,
                    "audit_access",
                    "search",
                    "audit_log",
                    principal,
                    format!("System activity report generated for {} days", days),
                )
                .with_details(serde_json::json!({
                    "report_period": days,
                    "total_events": report.total_events,
                })),
            )
            .await?;

        Ok(report)
    }

    /// Complete chronological audit trail for one resource
    pub async fn compliance_audit_trail(
        &self,
        principal: &Principal,
        resource_type: &str,
        resource_id: Uuid,
    ) -> Result<Vec<AuditLog>> {
        let trail = self.repository.trail(resource_type, resource_id).await?;

        self.sink
            .emit(
                AuditEvent::new(
                    EventCategory::AuditManagement,
                    "audit_access",
                    "search",
                    "audit_log",
                    principal,
                    format!(
                        "Compliance audit trail accessed for {} {}",
                        resource_type, resource_id
                    ),
                )
                .with_details(serde_json::json!({
                    "resource_type": resource_type,
                    "resource_id": resource_id,
                    "trail_entries": trail.len(),
                })),
            )
            .await?;

        Ok(trail)
    }

    /// Scan the audit trail for suspicious user activity patterns
    pub async fn detect_suspicious_patterns(
        &self,
        principal: &Principal,
        days: i64,
    ) -> Result<SuspiciousPatternReport> {
        let since = Utc::now() - Duration::days(days);

        let report = SuspiciousPatternReport {
            analysis_period_days: days,
            unusual_login_times: self.repository.unusual_logins(since).await?,
            high_volume_data_access: self.repository.high_volume_access(since).await?,
            failed_authentication_attempts: self.repository.failed_auth_attempts(since).await?,
            rapid_successive_operations: self.repository.rapid_operations(since).await?,
            detection_timestamp: Utc::now(),
        };

        let findings = report.total_findings();
        if findings > 0 {
            info!(findings, "Suspicious audit activity patterns detected");
            self.sink
                .emit(
                    AuditEvent::new(
                        EventCategory::AuditManagement,
                        "audit_access",
                        "search",
                        "audit_log",
                        principal,
                        format!(
                            "Suspicious activity patterns detected: {} potential issues",
                            findings
                        ),
                    )
                    .with_details(serde_json::to_value(&report)?)
                    .suspicious(),
                )
                .await?;
        }

        Ok(report)
    }

    /// Export a bounded slice of the audit trail for external compliance systems
    pub async fn export(
        &self,
        principal: &Principal,
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
        format: &str,
        event_category: Option<&str>,
        regulatory_only: bool,
    ) -> Result<AuditExport> {
        let logs = self
            .repository
            .export_window(start, end, event_category, regulatory_only, 10_000)
            .await?;

        let export = AuditExport {
            export_date: Utc::now(),
            exported_by: principal.id,
            period_start: start,
            period_end: end,
            format: format.to_string(),
            total_records: logs.len(),
            audit_logs: logs
                .into_iter()
                .map(|log| serde_json::to_value(log).unwrap_or_default())
                .collect(),
        };

        self.sink
            .emit(
                AuditEvent::new(
                    EventCategory::AuditManagement,
                    "audit_export",
                    "export",
                    "audit_log",
                    principal,
                    format!(
                        "Audit logs exported: {} records from {} to {}",
                        export.total_records,
                        start.date_naive(),
                        end.date_naive()
                    ),
                )
                .with_details(serde_json::json!({
                    "export_format": format,
                    "record_count": export.total_records,
                    "event_category": event_category,
                    "regulatory_only": regulatory_only,
                }))
                .with_records_affected(export.total_records as i32),
            )
            .await?;

        Ok(export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder_defaults() {
        let principal = Principal::system();
        let event = AuditEvent::new(
            EventCategory::RulesManagement,
            "rule_created",
            "create",
            "rule",
            &principal,
            "AML rule created",
        );

        assert!(event.regulatory_significance);
        assert!(!event.suspicious_activity);
        assert_eq!(event.status, "success");
        assert!(event.resource_id.is_none());
    }

    #[test]
    fn test_event_builder_chaining() {
        let principal = Principal::system();
        let resource = Uuid::new_v4();
        let event = AuditEvent::new(
            EventCategory::CaseManagement,
            "case_closed",
            "close",
            "case",
            &principal,
            "Case closed",
        )
        .with_resource(resource)
        .with_change(
            serde_json::json!({"status": "open"}),
            serde_json::json!({"status": "closed"}),
        )
        .suspicious();

        assert_eq!(event.resource_id, Some(resource));
        assert!(event.suspicious_activity);
        assert!(event.old_values.is_some());
        assert!(event.new_values.is_some());
    }
}
