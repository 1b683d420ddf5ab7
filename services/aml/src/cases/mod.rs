//! Investigation case workflow
//!
//! Cases consolidate alerts, accumulate evidence and interviews under SLA
//! tracking, and propagate their closure decision back to every linked alert.

use chrono::{DateTime, Datelike, Duration, Utc};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use prodetect_common::Principal;
use prodetect_database::entities::{case_record, Alert, CaseRecord};
use prodetect_errors::{ProDetectError, Result};

use crate::audit::{AuditEvent, AuditSink};
use crate::models::{CaseStatus, CreateCaseRequest, EventCategory};
use crate::repositories::{AlertRepository, CaseClosure, CaseRepository, CaseStatusUpdate};

/// Case workflow service
pub struct CaseWorkflow {
    db: DatabaseConnection,
    cases: Arc<CaseRepository>,
    alerts: Arc<AlertRepository>,
    audit: Arc<AuditSink>,
}

impl CaseWorkflow {
    pub fn new(
        db: DatabaseConnection,
        cases: Arc<CaseRepository>,
        alerts: Arc<AlertRepository>,
        audit: Arc<AuditSink>,
    ) -> Self {
        Self {
            db,
            cases,
            alerts,
            audit,
        }
    }

    /// Open an investigation case consolidating one or more alerts.
    ///
    /// The first distinct customer across the alerts becomes the primary
    /// subject; the rest are recorded as related customers. Every source
    /// alert is escalated and linked to the new case in the same database
    /// transaction that assigns the case number.
    pub async fn create_from_alerts(
        &self,
        principal: &Principal,
        request: CreateCaseRequest,
    ) -> Result<CaseRecord> {
        use validator::Validate;
        request
            .validate()
            .map_err(|e| ProDetectError::validation(e.to_string(), "INVALID_CASE"))?;

        let mut alerts: Vec<Alert> = Vec::with_capacity(request.alert_ids.len());
        for alert_id in &request.alert_ids {
            alerts.push(self.alerts.get(*alert_id).await?);
        }

        let mut customer_ids: Vec<Uuid> = Vec::new();
        let mut transaction_ids: Vec<Uuid> = Vec::new();
        for alert in &alerts {
            if !customer_ids.contains(&alert.customer_id) {
                customer_ids.push(alert.customer_id);
            }
            if let Some(transaction_id) = alert.transaction_id {
                transaction_ids.push(transaction_id);
            }
        }
        let primary_customer = customer_ids[0];
        let related_customers: Vec<Uuid> = customer_ids[1..].to_vec();

        let max_risk = alerts.iter().map(|a| a.risk_score).fold(0.0f64, f64::max);
        let risk_level = determine_case_risk_level(max_risk, alerts.len());
        let now = Utc::now();
        let sla_deadline = calculate_sla_deadline(request.priority, &request.case_type, now);

        let txn = self.db.begin().await?;

        let sequence = self
            .cases
            .count_created_in_month(&txn, now.year(), now.month())
            .await?
            + 1;
        let case_number = format!("CASE-{}{:02}-{:04}", now.year(), now.month(), sequence);

        let case = self
            .cases
            .insert_in(
                &txn,
                case_record::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    case_number: Set(case_number.clone()),
                    case_type: Set(request.case_type.clone()),
                    case_category: Set("aml".to_string()),
                    customer_id: Set(primary_customer),
                    related_customers: Set(serde_json::to_value(&related_customers)?),
                    alert_ids: Set(serde_json::to_value(&request.alert_ids)?),
                    transaction_ids: Set(serde_json::to_value(&transaction_ids)?),
                    title: Set(request.title.clone()),
                    description: Set(request.description.clone()),
                    priority: Set(request.priority),
                    risk_level: Set(risk_level.to_string()),
                    status: Set("open".to_string()),
                    investigation_stage: Set("initial".to_string()),
                    assigned_to: Set(principal.id),
                    reviewer: Set(None),
                    approver: Set(None),
                    team_members: Set(serde_json::json!([])),
                    opened_at: Set(now),
                    assigned_at: Set(Some(now)),
                    investigation_started_at: Set(None),
                    review_started_at: Set(None),
                    closed_at: Set(None),
                    sla_deadline: Set(Some(sla_deadline)),
                    sla_extended: Set(false),
                    sla_extension_reason: Set(None),
                    sla_breached: Set(false),
                    investigation_notes: Set(
                        "Case created from alerts. Investigation pending.".to_string(),
                    ),
                    evidence_collected: Set(serde_json::json!({})),
                    interviews_conducted: Set(serde_json::json!([])),
                    external_inquiries: Set(serde_json::json!([])),
                    findings: Set(None),
                    recommendations: Set(None),
                    decision: Set(None),
                    actions_taken: Set(serde_json::json!([])),
                    str_required: Set(false),
                    str_filed: Set(false),
                    str_reference: Set(None),
                    str_filed_date: Set(None),
                    ctr_required: Set(false),
                    ctr_filed: Set(false),
                    qa_reviewed: Set(false),
                    qa_reviewer: Set(None),
                    qa_notes: Set(None),
                    qa_approved: Set(false),
                    closure_reason: Set(None),
                    closure_notes: Set(None),
                    closed_by: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                    created_by: Set(principal.id),
                },
            )
            .await?;

        for alert_id in &request.alert_ids {
            self.alerts.escalate_to_case_in(&txn, *alert_id, case.id).await?;
        }

        self.audit
            .emit_in(
                &txn,
                AuditEvent::new(
                    EventCategory::CaseManagement,
                    "case_created",
                    "create",
                    "case",
                    principal,
                    format!(
                        "Case {} created from {} alerts",
                        case_number,
                        request.alert_ids.len()
                    ),
                )
                .with_resource(case.id)
                .with_resource_identifier(case_number.clone())
                .with_details(serde_json::json!({ "alert_ids": request.alert_ids })),
            )
            .await?;

        txn.commit().await?;

        info!(case_number = %case.case_number, "Investigation case created");
        Ok(case)
    }

    /// Reassign a case to another investigator
    pub async fn assign(
        &self,
        principal: &Principal,
        case_id: Uuid,
        assigned_to: Uuid,
        notes: Option<&str>,
    ) -> Result<CaseRecord> {
        let case = self.cases.get(case_id).await?;
        let old_assignee = case.assigned_to;

        let mut investigation_notes = case.investigation_notes.clone();
        if let Some(notes) = notes {
            investigation_notes.push_str(&format!(
                "\n[{}] Assignment change: {}",
                stamp(Utc::now()),
                notes
            ));
        }

        let updated = self
            .cases
            .update_assignment(&case, assigned_to, investigation_notes)
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CaseManagement,
                    "case_assigned",
                    "update",
                    "case",
                    principal,
                    format!("Case {} reassigned", case.case_number),
                )
                .with_resource(case.id)
                .with_change(
                    serde_json::json!({ "assigned_to": old_assignee }),
                    serde_json::json!({ "assigned_to": assigned_to }),
                ),
            )
            .await?;

        Ok(updated)
    }

    /// Transition a case's workflow status. First entry into investigating,
    /// pending review or closed stamps the corresponding timestamp.
    pub async fn update_status(
        &self,
        principal: &Principal,
        case_id: Uuid,
        new_status: CaseStatus,
        notes: Option<&str>,
    ) -> Result<CaseRecord> {
        let case = self.cases.get(case_id).await?;
        let old_status = case.status.clone();
        let now = Utc::now();

        let mut update = CaseStatusUpdate {
            new_status: new_status.as_str().to_string(),
            investigation_notes: case.investigation_notes.clone(),
            ..Default::default()
        };

        match new_status {
            CaseStatus::Investigating if case.investigation_started_at.is_none() => {
                update.investigation_started_at = Some(now);
            }
            CaseStatus::PendingReview if case.review_started_at.is_none() => {
                update.review_started_at = Some(now);
            }
            CaseStatus::Closed if case.closed_at.is_none() => {
                update.closed_at = Some(now);
                update.closed_by = Some(principal.id);
            }
            _ => {}
        }

        if let Some(notes) = notes {
            update.investigation_notes.push_str(&format!(
                "\n[{}] Status changed to {}: {}",
                stamp(now),
                new_status.as_str(),
                notes
            ));
        }

        let updated = self.cases.update_status(&case, update).await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CaseManagement,
                    "case_status_updated",
                    "update",
                    "case",
                    principal,
                    format!(
                        "Case {} status changed from {} to {}",
                        case.case_number,
                        old_status,
                        new_status.as_str()
                    ),
                )
                .with_resource(case.id)
                .with_change(
                    serde_json::json!({ "status": old_status }),
                    serde_json::json!({ "status": new_status.as_str() }),
                ),
            )
            .await?;

        Ok(updated)
    }

    /// Attach a piece of evidence to the case's keyed evidence map
    pub async fn add_evidence(
        &self,
        principal: &Principal,
        case_id: Uuid,
        evidence_type: &str,
        evidence_description: &str,
        evidence_data: serde_json::Value,
    ) -> Result<CaseRecord> {
        let case = self.cases.get(case_id).await?;
        let now = Utc::now();

        let evidence_id = Uuid::new_v4().to_string();
        let entry = serde_json::json!({
            "id": &evidence_id,
            "type": evidence_type,
            "description": evidence_description,
            "data": evidence_data,
            "added_by": principal.id,
            "added_at": now,
        });

        let mut evidence = case
            .evidence_collected
            .as_object()
            .cloned()
            .unwrap_or_default();
        evidence.insert(evidence_id, entry.clone());

        let notes = format!(
            "{}\n[{}] Evidence added: {} - {}",
            case.investigation_notes,
            stamp(now),
            evidence_type,
            evidence_description
        );

        let updated = self
            .cases
            .update_artifacts(&case, Some(serde_json::Value::Object(evidence)), None, notes)
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CaseManagement,
                    "case_evidence_added",
                    "update",
                    "case",
                    principal,
                    format!("Evidence added to case {}: {}", case.case_number, evidence_type),
                )
                .with_resource(case.id)
                .with_details(entry),
            )
            .await?;

        Ok(updated)
    }

    /// Record a customer interview on the case's append-only interview list
    pub async fn conduct_interview(
        &self,
        principal: &Principal,
        case_id: Uuid,
        customer_id: Uuid,
        interview_method: &str,
        interview_notes: &str,
        outcome: &str,
    ) -> Result<CaseRecord> {
        let case = self.cases.get(case_id).await?;
        let now = Utc::now();

        let record = serde_json::json!({
            "id": Uuid::new_v4().to_string(),
            "customer_id": customer_id,
            "interviewer": principal.id,
            "interview_date": now,
            "method": interview_method,
            "notes": interview_notes,
            "outcome": outcome,
        });

        let mut interviews = case
            .interviews_conducted
            .as_array()
            .cloned()
            .unwrap_or_default();
        interviews.push(record.clone());

        let notes = format!(
            "{}\n[{}] Customer interview conducted via {}. Outcome: {}",
            case.investigation_notes,
            stamp(now),
            interview_method,
            outcome
        );

        let updated = self
            .cases
            .update_artifacts(&case, None, Some(serde_json::Value::Array(interviews)), notes)
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CaseManagement,
                    "customer_interview",
                    "interview",
                    "case",
                    principal,
                    format!("Customer interview conducted for case {}", case.case_number),
                )
                .with_resource(case.id)
                .with_details(record),
            )
            .await?;

        Ok(updated)
    }

    /// Close a case with its final decision and propagate the decision to
    /// every linked alert. Re-closing with the same arguments converges on
    /// the same final state.
    pub async fn close(
        &self,
        principal: &Principal,
        case_id: Uuid,
        closure_reason: &str,
        closure_notes: &str,
        decision: &str,
        actions_taken: Vec<String>,
    ) -> Result<CaseRecord> {
        let case = self.cases.get(case_id).await?;
        let now = Utc::now();

        let notes = format!(
            "{}\n[{}] Case closed. Decision: {}. Reason: {}",
            case.investigation_notes,
            stamp(now),
            decision,
            closure_reason
        );

        let updated = self
            .cases
            .close(
                &case,
                CaseClosure {
                    closure_reason: closure_reason.to_string(),
                    closure_notes: closure_notes.to_string(),
                    decision: decision.to_string(),
                    actions_taken: serde_json::to_value(&actions_taken)?,
                    investigation_notes: notes,
                    closed_by: principal.id,
                },
            )
            .await?;

        let alert_ids = updated.alert_id_list();
        self.alerts
            .close_for_case(&alert_ids, decision, closure_notes, principal.id)
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CaseManagement,
                    "case_closed",
                    "close",
                    "case",
                    principal,
                    format!("Case {} closed with decision: {}", case.case_number, decision),
                )
                .with_resource(case.id)
                .with_details(serde_json::json!({
                    "closure_reason": closure_reason,
                    "decision": decision,
                    "actions_taken": actions_taken,
                })),
            )
            .await?;

        info!(case_number = %updated.case_number, decision, "Case closed");
        Ok(updated)
    }

    /// Cases assigned to the caller, most urgent first
    pub async fn assigned_cases(
        &self,
        principal: &Principal,
        status: Option<CaseStatus>,
    ) -> Result<Vec<CaseRecord>> {
        let cases = self
            .cases
            .assigned_to(principal.id, status.map(|s| s.as_str()))
            .await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CaseManagement,
                    "assigned_cases_accessed",
                    "view",
                    "case",
                    principal,
                    format!("Accessed {} assigned cases", cases.len()),
                )
                .with_records_affected(cases.len() as i32),
            )
            .await?;

        Ok(cases)
    }

    /// Sweep for cases past their SLA deadline and flag them. Scheduled by
    /// an external timer; safe to re-run.
    pub async fn mark_overdue_cases(&self, principal: &Principal) -> Result<Vec<CaseRecord>> {
        let overdue = self.cases.overdue(Utc::now()).await?;
        let ids: Vec<Uuid> = overdue.iter().map(|case| case.id).collect();
        let newly_flagged = self.cases.mark_sla_breached(&ids).await?;

        self.audit
            .emit(
                AuditEvent::new(
                    EventCategory::CaseManagement,
                    "overdue_cases_accessed",
                    "view",
                    "case",
                    principal,
                    format!(
                        "Accessed {} overdue cases ({} newly flagged)",
                        overdue.len(),
                        newly_flagged
                    ),
                )
                .with_records_affected(overdue.len() as i32),
            )
            .await?;

        Ok(overdue)
    }
}

/// SLA hours by priority, halved (floor 4h) for sanctions and terrorism
/// financing investigations
pub fn sla_hours(priority: i32, case_type: &str) -> i64 {
    let hours = match priority {
        1 => 4,
        2 => 24,
        3 => 72,
        4 => 168,
        5 => 336,
        _ => 72,
    };

    if matches!(case_type, "sanctions_investigation" | "terrorism_financing") {
        (hours / 2).max(4)
    } else {
        hours
    }
}

pub fn calculate_sla_deadline(
    priority: i32,
    case_type: &str,
    from: DateTime<Utc>,
) -> DateTime<Utc> {
    from + Duration::hours(sla_hours(priority, case_type))
}

/// Case risk level from the maximum alert score and the alert count
pub fn determine_case_risk_level(max_risk_score: f64, alert_count: usize) -> &'static str {
    if max_risk_score >= 80.0 || alert_count >= 5 {
        "critical"
    } else if max_risk_score >= 60.0 || alert_count >= 3 {
        "high"
    } else if max_risk_score >= 40.0 || alert_count >= 2 {
        "medium"
    } else {
        "low"
    }
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sla_hours_by_priority() {
        assert_eq!(sla_hours(1, "suspicious_activity"), 4);
        assert_eq!(sla_hours(2, "suspicious_activity"), 24);
        assert_eq!(sla_hours(3, "suspicious_activity"), 72);
        assert_eq!(sla_hours(4, "suspicious_activity"), 168);
        assert_eq!(sla_hours(5, "suspicious_activity"), 336);
        assert_eq!(sla_hours(9, "suspicious_activity"), 72);
    }

    #[test]
    fn test_sla_halved_for_urgent_case_types() {
        assert_eq!(sla_hours(3, "sanctions_investigation"), 36);
        assert_eq!(sla_hours(5, "terrorism_financing"), 168);
        // Halving never drops below the four hour floor
        assert_eq!(sla_hours(1, "terrorism_financing"), 4);
    }

    #[test]
    fn test_case_risk_level_partition() {
        assert_eq!(determine_case_risk_level(85.0, 1), "critical");
        assert_eq!(determine_case_risk_level(30.0, 5), "critical");
        assert_eq!(determine_case_risk_level(65.0, 1), "high");
        assert_eq!(determine_case_risk_level(10.0, 3), "high");
        assert_eq!(determine_case_risk_level(45.0, 1), "medium");
        assert_eq!(determine_case_risk_level(10.0, 2), "medium");
        assert_eq!(determine_case_risk_level(10.0, 1), "low");
    }

    #[test]
    fn test_sla_deadline_offsets_from_reference_instant() {
        let from = Utc::now();
        let deadline = calculate_sla_deadline(2, "suspicious_activity", from);
        assert_eq!(deadline - from, Duration::hours(24));
    }
}
