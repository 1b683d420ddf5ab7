//! Data access repositories for the AML core
//!
//! All query construction lives here. Writes to Case, Report and Rule rows go
//! through an optimistic-concurrency guard on `updated_at`; a lost race
//! surfaces as a retryable `STALE_WRITE` conflict.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
};
use uuid::Uuid;

use prodetect_config::AmlConfig;
use prodetect_database::entities::{
    alert, audit_log, case_record, customer, report, rule, transaction, Alert, AuditLog,
    CaseRecord, Customer, Report, Rule, Transaction,
};
use prodetect_errors::{ProDetectError, Result};

use crate::models::{
    ActivityBreakdownRow, AuditSearchFilter, CategoryActivityRow, CustomerActivity,
    DailyActivityRow, FailedAuthRow, FailedOperationRow, HighVolumeAccessRow, LoginSummary,
    RapidOperationsRow, TopUserRow, UnusualLoginRow,
};

/// Customer repository
pub struct CustomerRepository {
    db: DatabaseConnection,
}

impl CustomerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, customer_id: Uuid) -> Result<Customer> {
        customer::Entity::find_by_id(customer_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ProDetectError::not_found("customer", customer_id))
    }

    pub async fn insert(&self, model: customer::ActiveModel) -> Result<Customer> {
        Ok(model.insert(&self.db).await?)
    }

    /// Persist a recalculated risk score and category
    pub async fn update_risk(
        &self,
        customer_id: Uuid,
        risk_score: f64,
        risk_category: &str,
    ) -> Result<Customer> {
        let now = Utc::now();
        let result = customer::Entity::update_many()
            .col_expr(customer::Column::RiskScore, Expr::value(risk_score))
            .col_expr(
                customer::Column::RiskCategory,
                Expr::value(risk_category.to_string()),
            )
            .col_expr(customer::Column::LastRiskAssessment, Expr::value(Some(now)))
            .col_expr(customer::Column::UpdatedAt, Expr::value(now))
            .filter(customer::Column::Id.eq(customer_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ProDetectError::not_found("customer", customer_id));
        }
        self.get(customer_id).await
    }

    /// Persist the outcome of a sanctions/PEP screening pass
    pub async fn update_screening(
        &self,
        customer_id: Uuid,
        pep_status: bool,
        risk_score: Option<f64>,
        risk_category: Option<String>,
        requires_enhanced_dd: bool,
    ) -> Result<Customer> {
        let mut query = customer::Entity::update_many()
            .col_expr(customer::Column::SanctionsChecked, Expr::value(true))
            .col_expr(customer::Column::PepStatus, Expr::value(pep_status))
            .col_expr(customer::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(customer::Column::Id.eq(customer_id));

        if let Some(score) = risk_score {
            query = query.col_expr(customer::Column::RiskScore, Expr::value(score));
        }
        if let Some(category) = risk_category {
            query = query.col_expr(customer::Column::RiskCategory, Expr::value(category));
        }
        if requires_enhanced_dd {
            query = query.col_expr(customer::Column::RequiresEnhancedDd, Expr::value(true));
        }

        let result = query.exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(ProDetectError::not_found("customer", customer_id));
        }
        self.get(customer_id).await
    }

    /// High-risk customers ordered by score, stalest assessment first
    pub async fn high_risk(&self, limit: u64) -> Result<Vec<Customer>> {
        Ok(customer::Entity::find()
            .filter(customer::Column::RiskCategory.eq("high"))
            .order_by_desc(customer::Column::RiskScore)
            .order_by_asc(customer::Column::LastRiskAssessment)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}

#[derive(FromQueryResult)]
struct VelocityRow {
    transaction_count: i64,
    total_amount: Option<Decimal>,
}

#[derive(FromQueryResult)]
struct AverageRow {
    average_amount: Option<Decimal>,
}

/// Transaction repository
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, transaction_id: Uuid) -> Result<Transaction> {
        transaction::Entity::find_by_id(transaction_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ProDetectError::not_found("transaction", transaction_id))
    }

    pub async fn insert_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: transaction::ActiveModel,
    ) -> Result<Transaction> {
        Ok(model.insert(conn).await?)
    }

    pub async fn by_customer_since(
        &self,
        customer_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        Ok(transaction::Entity::find()
            .filter(transaction::Column::CustomerId.eq(customer_id))
            .filter(transaction::Column::TransactionDate.gte(since))
            .order_by_desc(transaction::Column::TransactionDate)
            .all(&self.db)
            .await?)
    }

    pub async fn by_ids(&self, ids: &[Uuid]) -> Result<Vec<Transaction>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(transaction::Entity::find()
            .filter(transaction::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?)
    }

    /// Restrict the given ids to transactions at or above the CTR threshold
    pub async fn by_ids_above_ctr(&self, ids: &[Uuid]) -> Result<Vec<Transaction>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(transaction::Entity::find()
            .filter(transaction::Column::Id.is_in(ids.iter().copied()))
            .filter(transaction::Column::AboveCtrThreshold.eq(true))
            .all(&self.db)
            .await?)
    }

    /// Suspicious transactions for review, highest risk first
    pub async fn suspicious(&self, days: i64, limit: u64) -> Result<Vec<Transaction>> {
        let since = Utc::now() - Duration::days(days);
        Ok(transaction::Entity::find()
            .filter(transaction::Column::IsSuspicious.eq(true))
            .filter(transaction::Column::TransactionDate.gte(since))
            .order_by_desc(transaction::Column::RiskScore)
            .order_by_desc(transaction::Column::TransactionDate)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// Aggregates the evaluator needs for velocity, structuring and
    /// unusual-amount detection, loaded once per monitored transaction.
    pub async fn customer_activity(
        &self,
        customer_id: Uuid,
        as_of: DateTime<Utc>,
        config: &AmlConfig,
    ) -> Result<CustomerActivity> {
        let window_start = as_of - Duration::hours(24);

        let velocity = VelocityRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT COUNT(*) AS transaction_count, SUM(amount) AS total_amount
               FROM transactions
               WHERE customer_id = $1 AND transaction_date >= $2"#,
            [customer_id.into(), window_start.into()],
        ))
        .one(&self.db)
        .await?
        .unwrap_or(VelocityRow {
            transaction_count: 0,
            total_amount: None,
        });

        let ctr = config.ctr_threshold as f64;
        let band_low =
            Decimal::from_f64_retain(ctr * config.structuring_band_low).unwrap_or_default();
        let band_high =
            Decimal::from_f64_retain(ctr * config.structuring_band_high).unwrap_or_default();

        let structuring = VelocityRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT COUNT(*) AS transaction_count, SUM(amount) AS total_amount
               FROM transactions
               WHERE customer_id = $1 AND transaction_date >= $2
               AND amount BETWEEN $3 AND $4"#,
            [
                customer_id.into(),
                window_start.into(),
                band_low.into(),
                band_high.into(),
            ],
        ))
        .one(&self.db)
        .await?
        .unwrap_or(VelocityRow {
            transaction_count: 0,
            total_amount: None,
        });

        let average = AverageRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT AVG(amount) AS average_amount
               FROM transactions
               WHERE customer_id = $1 AND transaction_date >= $2"#,
            [customer_id.into(), (as_of - Duration::days(30)).into()],
        ))
        .one(&self.db)
        .await?;

        Ok(CustomerActivity {
            count_24h: velocity.transaction_count.max(0) as u64,
            total_24h: velocity.total_amount.unwrap_or_default(),
            structuring_count: structuring.transaction_count.max(0) as usize,
            structuring_total: structuring.total_amount.unwrap_or_default(),
            average_30d: average.and_then(|row| row.average_amount),
        })
    }

    /// Historical transactions joined with their customers for rule
    /// back-testing, newest first, scoped by the rule's filters.
    pub async fn history_for_rule_test(
        &self,
        rule: &Rule,
        since: DateTime<Utc>,
        cap: u64,
    ) -> Result<Vec<(Transaction, Option<Customer>)>> {
        let mut query = transaction::Entity::find()
            .find_also_related(customer::Entity)
            .filter(transaction::Column::TransactionDate.gte(since));

        if rule.applies_to != "all" {
            let segments = Rule::scope_list(&rule.customer_segments);
            if !segments.is_empty() {
                query = query.filter(customer::Column::RiskCategory.is_in(segments));
            }
        }

        let transaction_types = Rule::scope_list(&rule.transaction_types);
        if !transaction_types.is_empty() {
            query = query.filter(transaction::Column::TransactionType.is_in(transaction_types));
        }

        let channels = Rule::scope_list(&rule.channels);
        if !channels.is_empty() {
            query = query.filter(transaction::Column::Channel.is_in(channels));
        }

        Ok(query
            .order_by_desc(transaction::Column::TransactionDate)
            .limit(cap)
            .all(&self.db)
            .await?)
    }
}

#[derive(FromQueryResult)]
pub struct AlertAggregateRow {
    pub total_alerts: i64,
    pub average_risk_score: Option<f64>,
    pub resolved_alerts: i64,
    pub false_positives: i64,
    pub escalated_alerts: i64,
}

/// Alert repository
pub struct AlertRepository {
    db: DatabaseConnection,
}

impl AlertRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, alert_id: Uuid) -> Result<Alert> {
        alert::Entity::find_by_id(alert_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ProDetectError::not_found("alert", alert_id))
    }

    pub async fn insert_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: alert::ActiveModel,
    ) -> Result<Alert> {
        Ok(model.insert(conn).await?)
    }

    pub async fn by_customer_since(
        &self,
        customer_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        Ok(alert::Entity::find()
            .filter(alert::Column::CustomerId.eq(customer_id))
            .filter(alert::Column::TriggeredAt.gte(since))
            .all(&self.db)
            .await?)
    }

    /// Attach an alert to a case and mark it escalated
    pub async fn escalate_to_case_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        alert_id: Uuid,
        case_id: Uuid,
    ) -> Result<()> {
        alert::Entity::update_many()
            .col_expr(alert::Column::Status, Expr::value("escalated"))
            .col_expr(alert::Column::CaseId, Expr::value(Some(case_id)))
            .col_expr(alert::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(alert::Column::Id.eq(alert_id))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Close every alert linked to a closing case, carrying the case decision
    /// as the alert resolution. Safe to re-run.
    pub async fn close_for_case(
        &self,
        alert_ids: &[Uuid],
        resolution: &str,
        resolution_notes: &str,
        resolved_by: Uuid,
    ) -> Result<u64> {
        if alert_ids.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let result = alert::Entity::update_many()
            .col_expr(alert::Column::Status, Expr::value("closed"))
            .col_expr(alert::Column::Resolution, Expr::value(Some(resolution.to_string())))
            .col_expr(
                alert::Column::ResolutionNotes,
                Expr::value(Some(resolution_notes.to_string())),
            )
            .col_expr(alert::Column::ResolvedAt, Expr::value(Some(now)))
            .col_expr(alert::Column::ResolvedBy, Expr::value(Some(resolved_by)))
            .col_expr(alert::Column::UpdatedAt, Expr::value(now))
            .filter(alert::Column::Id.is_in(alert_ids.iter().copied()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Aggregates over alerts generated by one rule within a window
    pub async fn rule_performance(
        &self,
        rule_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<AlertAggregateRow> {
        let row = AlertAggregateRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT
                   COUNT(*) AS total_alerts,
                   AVG(risk_score) AS average_risk_score,
                   COUNT(*) FILTER (WHERE status = 'closed') AS resolved_alerts,
                   COUNT(*) FILTER (WHERE resolution = 'false_positive') AS false_positives,
                   COUNT(*) FILTER (WHERE case_id IS NOT NULL) AS escalated_alerts
               FROM alerts
               WHERE rule_id = $1 AND triggered_at >= $2"#,
            [rule_id.into(), since.into()],
        ))
        .one(&self.db)
        .await?;

        Ok(row.unwrap_or(AlertAggregateRow {
            total_alerts: 0,
            average_risk_score: None,
            resolved_alerts: 0,
            false_positives: 0,
            escalated_alerts: 0,
        }))
    }

    /// Window aggregates for compliance statistics
    pub async fn window_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AlertAggregateRow> {
        let row = AlertAggregateRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT
                   COUNT(*) AS total_alerts,
                   AVG(risk_score) AS average_risk_score,
                   COUNT(*) FILTER (WHERE status = 'closed') AS resolved_alerts,
                   COUNT(*) FILTER (WHERE resolution = 'false_positive') AS false_positives,
                   COUNT(*) FILTER (WHERE case_id IS NOT NULL) AS escalated_alerts
               FROM alerts
               WHERE triggered_at BETWEEN $1 AND $2"#,
            [start.into(), end.into()],
        ))
        .one(&self.db)
        .await?;

        Ok(row.unwrap_or(AlertAggregateRow {
            total_alerts: 0,
            average_risk_score: None,
            resolved_alerts: 0,
            false_positives: 0,
            escalated_alerts: 0,
        }))
    }
}

/// Field updates applied to a case when its workflow status changes
#[derive(Debug, Default)]
pub struct CaseStatusUpdate {
    pub new_status: String,
    pub investigation_notes: String,
    pub investigation_started_at: Option<DateTime<Utc>>,
    pub review_started_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<Uuid>,
}

/// Closure fields applied when a case is closed
#[derive(Debug)]
pub struct CaseClosure {
    pub closure_reason: String,
    pub closure_notes: String,
    pub decision: String,
    pub actions_taken: serde_json::Value,
    pub investigation_notes: String,
    pub closed_by: Uuid,
}

#[derive(FromQueryResult)]
pub struct CaseAggregateRow {
    pub total_cases: i64,
    pub closed_cases: i64,
    pub sla_breached_cases: i64,
}

/// Case repository
pub struct CaseRepository {
    db: DatabaseConnection,
}

impl CaseRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, case_id: Uuid) -> Result<CaseRecord> {
        case_record::Entity::find_by_id(case_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ProDetectError::not_found("case", case_id))
    }

    pub async fn insert_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: case_record::ActiveModel,
    ) -> Result<CaseRecord> {
        Ok(model.insert(conn).await?)
    }

    /// Cases created in the given month; read inside the numbering
    /// transaction so concurrent creations serialise.
    pub async fn count_created_in_month<C: ConnectionTrait>(
        &self,
        conn: &C,
        year: i32,
        month: u32,
    ) -> Result<u64> {
        let (start, end) = month_bounds(year, month)?;
        Ok(case_record::Entity::find()
            .filter(case_record::Column::CreatedAt.gte(start))
            .filter(case_record::Column::CreatedAt.lt(end))
            .count(conn)
            .await?)
    }

    async fn guarded_update(
        &self,
        case_id: Uuid,
        expected_updated_at: DateTime<Utc>,
        sets: Vec<(case_record::Column, SimpleExpr)>,
    ) -> Result<CaseRecord> {
        let mut query = case_record::Entity::update_many()
            .filter(case_record::Column::Id.eq(case_id))
            .filter(case_record::Column::UpdatedAt.eq(expected_updated_at));
        for (column, expr) in sets {
            query = query.col_expr(column, expr);
        }
        query = query.col_expr(case_record::Column::UpdatedAt, Expr::value(Utc::now()));

        let result = query.exec(&self.db).await?;
        if result.rows_affected == 0 {
            // Distinguish a vanished row from a lost race
            self.get(case_id).await?;
            return Err(ProDetectError::stale_write("case", case_id));
        }
        self.get(case_id).await
    }

    pub async fn update_assignment(
        &self,
        case: &CaseRecord,
        assigned_to: Uuid,
        investigation_notes: String,
    ) -> Result<CaseRecord> {
        self.guarded_update(
            case.id,
            case.updated_at,
            vec![
                (case_record::Column::AssignedTo, Expr::value(assigned_to)),
                (case_record::Column::AssignedAt, Expr::value(Some(Utc::now()))),
                (
                    case_record::Column::InvestigationNotes,
                    Expr::value(investigation_notes),
                ),
            ],
        )
        .await
    }

    pub async fn update_status(
        &self,
        case: &CaseRecord,
        update: CaseStatusUpdate,
    ) -> Result<CaseRecord> {
        let mut sets = vec![
            (case_record::Column::Status, Expr::value(update.new_status)),
            (
                case_record::Column::InvestigationNotes,
                Expr::value(update.investigation_notes),
            ),
        ];
        if let Some(at) = update.investigation_started_at {
            sets.push((
                case_record::Column::InvestigationStartedAt,
                Expr::value(Some(at)),
            ));
        }
        if let Some(at) = update.review_started_at {
            sets.push((case_record::Column::ReviewStartedAt, Expr::value(Some(at))));
        }
        if let Some(at) = update.closed_at {
            sets.push((case_record::Column::ClosedAt, Expr::value(Some(at))));
        }
        if let Some(by) = update.closed_by {
            sets.push((case_record::Column::ClosedBy, Expr::value(Some(by))));
        }
        self.guarded_update(case.id, case.updated_at, sets).await
    }

    /// Replace the investigation artefact columns after an append
    pub async fn update_artifacts(
        &self,
        case: &CaseRecord,
        evidence_collected: Option<serde_json::Value>,
        interviews_conducted: Option<serde_json::Value>,
        investigation_notes: String,
    ) -> Result<CaseRecord> {
        let mut sets = vec![(
            case_record::Column::InvestigationNotes,
            Expr::value(investigation_notes),
        )];
        if let Some(evidence) = evidence_collected {
            sets.push((case_record::Column::EvidenceCollected, Expr::value(evidence)));
        }
        if let Some(interviews) = interviews_conducted {
            sets.push((
                case_record::Column::InterviewsConducted,
                Expr::value(interviews),
            ));
        }
        self.guarded_update(case.id, case.updated_at, sets).await
    }

    pub async fn close(&self, case: &CaseRecord, closure: CaseClosure) -> Result<CaseRecord> {
        let now = Utc::now();
        self.guarded_update(
            case.id,
            case.updated_at,
            vec![
                (case_record::Column::Status, Expr::value("closed")),
                (case_record::Column::ClosedAt, Expr::value(Some(case.closed_at.unwrap_or(now)))),
                (case_record::Column::ClosedBy, Expr::value(Some(closure.closed_by))),
                (
                    case_record::Column::ClosureReason,
                    Expr::value(Some(closure.closure_reason)),
                ),
                (
                    case_record::Column::ClosureNotes,
                    Expr::value(Some(closure.closure_notes)),
                ),
                (case_record::Column::Decision, Expr::value(Some(closure.decision))),
                (case_record::Column::ActionsTaken, Expr::value(closure.actions_taken)),
                (
                    case_record::Column::InvestigationNotes,
                    Expr::value(closure.investigation_notes),
                ),
            ],
        )
        .await
    }

    pub async fn set_str_required(&self, case: &CaseRecord) -> Result<CaseRecord> {
        self.guarded_update(
            case.id,
            case.updated_at,
            vec![
                (case_record::Column::StrRequired, Expr::value(true)),
                (case_record::Column::StrFiled, Expr::value(false)),
            ],
        )
        .await
    }

    pub async fn mark_str_filed(
        &self,
        case: &CaseRecord,
        filing_reference: &str,
        filed_at: DateTime<Utc>,
    ) -> Result<CaseRecord> {
        self.guarded_update(
            case.id,
            case.updated_at,
            vec![
                (case_record::Column::StrFiled, Expr::value(true)),
                (
                    case_record::Column::StrReference,
                    Expr::value(Some(filing_reference.to_string())),
                ),
                (case_record::Column::StrFiledDate, Expr::value(Some(filed_at))),
            ],
        )
        .await
    }

    /// Unclosed cases whose SLA deadline has elapsed
    pub async fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<CaseRecord>> {
        Ok(case_record::Entity::find()
            .filter(case_record::Column::SlaDeadline.lt(now))
            .filter(case_record::Column::Status.ne("closed"))
            .order_by_asc(case_record::Column::SlaDeadline)
            .all(&self.db)
            .await?)
    }

    /// Flag overdue cases; repeated runs are no-ops for already-flagged rows
    pub async fn mark_sla_breached(&self, case_ids: &[Uuid]) -> Result<u64> {
        if case_ids.is_empty() {
            return Ok(0);
        }
        let result = case_record::Entity::update_many()
            .col_expr(case_record::Column::SlaBreached, Expr::value(true))
            .filter(case_record::Column::Id.is_in(case_ids.iter().copied()))
            .filter(case_record::Column::SlaBreached.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn assigned_to(
        &self,
        assignee: Uuid,
        status: Option<&str>,
    ) -> Result<Vec<CaseRecord>> {
        let mut query =
            case_record::Entity::find().filter(case_record::Column::AssignedTo.eq(assignee));
        if let Some(status) = status {
            query = query.filter(case_record::Column::Status.eq(status));
        }
        Ok(query
            .order_by_asc(case_record::Column::Priority)
            .order_by_asc(case_record::Column::SlaDeadline)
            .all(&self.db)
            .await?)
    }

    pub async fn window_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CaseAggregateRow> {
        let row = CaseAggregateRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT
                   COUNT(*) AS total_cases,
                   COUNT(*) FILTER (WHERE status = 'closed') AS closed_cases,
                   COUNT(*) FILTER (WHERE sla_breached) AS sla_breached_cases
               FROM cases
               WHERE created_at BETWEEN $1 AND $2"#,
            [start.into(), end.into()],
        ))
        .one(&self.db)
        .await?;

        Ok(row.unwrap_or(CaseAggregateRow {
            total_cases: 0,
            closed_cases: 0,
            sla_breached_cases: 0,
        }))
    }
}

#[derive(FromQueryResult)]
pub struct ReportAggregateRow {
    pub total_reports: i64,
    pub filed_reports: i64,
    pub average_filing_hours: Option<f64>,
}

/// Report repository
pub struct ReportRepository {
    db: DatabaseConnection,
}

impl ReportRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, report_id: Uuid) -> Result<Report> {
        report::Entity::find_by_id(report_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ProDetectError::not_found("report", report_id))
    }

    pub async fn insert_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: report::ActiveModel,
    ) -> Result<Report> {
        Ok(model.insert(conn).await?)
    }

    pub async fn count_type_in_month<C: ConnectionTrait>(
        &self,
        conn: &C,
        report_type: &str,
        year: i32,
        month: u32,
    ) -> Result<u64> {
        let (start, end) = month_bounds(year, month)?;
        Ok(report::Entity::find()
            .filter(report::Column::ReportType.eq(report_type))
            .filter(report::Column::CreatedAt.gte(start))
            .filter(report::Column::CreatedAt.lt(end))
            .count(conn)
            .await?)
    }

    async fn guarded_update(
        &self,
        report_id: Uuid,
        expected_updated_at: DateTime<Utc>,
        sets: Vec<(report::Column, SimpleExpr)>,
    ) -> Result<Report> {
        let mut query = report::Entity::update_many()
            .filter(report::Column::Id.eq(report_id))
            .filter(report::Column::UpdatedAt.eq(expected_updated_at));
        for (column, expr) in sets {
            query = query.col_expr(column, expr);
        }
        query = query.col_expr(report::Column::UpdatedAt, Expr::value(Utc::now()));

        let result = query.exec(&self.db).await?;
        if result.rows_affected == 0 {
            self.get(report_id).await?;
            return Err(ProDetectError::stale_write("report", report_id));
        }
        self.get(report_id).await
    }

    pub async fn update_review(
        &self,
        report: &Report,
        reviewer: Uuid,
        notes: &str,
        approved: bool,
    ) -> Result<Report> {
        let status = if approved { "approved" } else { "review" };
        self.guarded_update(
            report.id,
            report.updated_at,
            vec![
                (report::Column::Status, Expr::value(status)),
                (report::Column::ReviewedBy, Expr::value(Some(reviewer))),
                (report::Column::QaReviewed, Expr::value(true)),
                (report::Column::QaReviewer, Expr::value(Some(reviewer))),
                (report::Column::QaNotes, Expr::value(Some(notes.to_string()))),
                (report::Column::QaApproved, Expr::value(approved)),
            ],
        )
        .await
    }

    pub async fn update_filing(
        &self,
        report: &Report,
        filing_reference: &str,
        filing_method: &str,
        filed_by: Uuid,
        filed_at: DateTime<Utc>,
        export_data: serde_json::Value,
    ) -> Result<Report> {
        self.guarded_update(
            report.id,
            report.updated_at,
            vec![
                (report::Column::Filed, Expr::value(true)),
                (report::Column::FilingDate, Expr::value(Some(filed_at))),
                (
                    report::Column::FilingMethod,
                    Expr::value(Some(filing_method.to_string())),
                ),
                (
                    report::Column::FilingReference,
                    Expr::value(Some(filing_reference.to_string())),
                ),
                (report::Column::FiledBy, Expr::value(Some(filed_by))),
                (report::Column::Status, Expr::value("filed")),
                (report::Column::ExportData, Expr::value(Some(export_data))),
            ],
        )
        .await
    }

    /// Reports awaiting review or filing
    pub async fn pending(&self, report_type: Option<&str>) -> Result<Vec<Report>> {
        let mut query = report::Entity::find()
            .filter(report::Column::Status.is_in(["draft", "review", "approved"]))
            .filter(report::Column::Filed.eq(false));
        if let Some(report_type) = report_type {
            query = query.filter(report::Column::ReportType.eq(report_type));
        }
        Ok(query
            .order_by_desc(report::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn filed(&self, days: i64) -> Result<Vec<Report>> {
        let since = Utc::now() - Duration::days(days);
        Ok(report::Entity::find()
            .filter(report::Column::Filed.eq(true))
            .filter(report::Column::FilingDate.gte(since))
            .order_by_desc(report::Column::FilingDate)
            .all(&self.db)
            .await?)
    }

    pub async fn window_statistics(
        &self,
        report_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ReportAggregateRow> {
        let row = ReportAggregateRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT
                   COUNT(*) AS total_reports,
                   COUNT(*) FILTER (WHERE filed) AS filed_reports,
                   CAST(AVG(EXTRACT(EPOCH FROM (filing_date - created_at)) / 3600.0) AS DOUBLE PRECISION) AS average_filing_hours
               FROM reports
               WHERE report_type = $1 AND created_at BETWEEN $2 AND $3"#,
            [report_type.into(), start.into(), end.into()],
        ))
        .one(&self.db)
        .await?;

        Ok(row.unwrap_or(ReportAggregateRow {
            total_reports: 0,
            filed_reports: 0,
            average_filing_hours: None,
        }))
    }
}

/// Rule repository
pub struct RuleRepository {
    db: DatabaseConnection,
}

impl RuleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, rule_id: Uuid) -> Result<Rule> {
        rule::Entity::find_by_id(rule_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ProDetectError::not_found("rule", rule_id))
    }

    pub async fn code_exists(&self, rule_code: &str) -> Result<bool> {
        let count = rule::Entity::find()
            .filter(rule::Column::RuleCode.eq(rule_code))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn insert(&self, model: rule::ActiveModel) -> Result<Rule> {
        Ok(model.insert(&self.db).await?)
    }

    /// Active rules, optionally restricted to one rule type, ordered by code
    pub async fn active(&self, rule_type: Option<&str>) -> Result<Vec<Rule>> {
        let mut query = rule::Entity::find().filter(rule::Column::Status.eq("active"));
        if let Some(rule_type) = rule_type {
            query = query.filter(rule::Column::RuleType.eq(rule_type));
        }
        Ok(query.order_by_asc(rule::Column::RuleCode).all(&self.db).await?)
    }

    pub async fn update_test_results(
        &self,
        rule_id: Uuid,
        test_results: serde_json::Value,
        false_positive_rate: f64,
        effectiveness_score: f64,
    ) -> Result<Rule> {
        let now = Utc::now();
        let result = rule::Entity::update_many()
            .col_expr(rule::Column::TestResults, Expr::value(test_results))
            .col_expr(
                rule::Column::FalsePositiveRate,
                Expr::value(Some(false_positive_rate)),
            )
            .col_expr(
                rule::Column::EffectivenessScore,
                Expr::value(Some(effectiveness_score)),
            )
            .col_expr(rule::Column::LastTested, Expr::value(Some(now)))
            .col_expr(rule::Column::UpdatedAt, Expr::value(now))
            .filter(rule::Column::Id.eq(rule_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ProDetectError::not_found("rule", rule_id));
        }
        self.get(rule_id).await
    }

    async fn guarded_update(
        &self,
        rule_id: Uuid,
        expected_updated_at: DateTime<Utc>,
        sets: Vec<(rule::Column, SimpleExpr)>,
    ) -> Result<Rule> {
        let mut query = rule::Entity::update_many()
            .filter(rule::Column::Id.eq(rule_id))
            .filter(rule::Column::UpdatedAt.eq(expected_updated_at));
        for (column, expr) in sets {
            query = query.col_expr(column, expr);
        }
        query = query.col_expr(rule::Column::UpdatedAt, Expr::value(Utc::now()));

        let result = query.exec(&self.db).await?;
        if result.rows_affected == 0 {
            self.get(rule_id).await?;
            return Err(ProDetectError::stale_write("rule", rule_id));
        }
        self.get(rule_id).await
    }

    pub async fn set_status(
        &self,
        rule: &Rule,
        status: &str,
        effective_date: Option<DateTime<Utc>>,
        modified_by: Uuid,
    ) -> Result<Rule> {
        let mut sets = vec![
            (rule::Column::Status, Expr::value(status.to_string())),
            (rule::Column::LastModifiedBy, Expr::value(Some(modified_by))),
        ];
        if let Some(effective) = effective_date {
            sets.push((rule::Column::EffectiveDate, Expr::value(Some(effective))));
        }
        self.guarded_update(rule.id, rule.updated_at, sets).await
    }

    pub async fn update_thresholds(
        &self,
        rule: &Rule,
        thresholds: serde_json::Value,
        version: &str,
        modified_by: Uuid,
    ) -> Result<Rule> {
        self.guarded_update(
            rule.id,
            rule.updated_at,
            vec![
                (rule::Column::Thresholds, Expr::value(thresholds)),
                (rule::Column::Version, Expr::value(version.to_string())),
                (rule::Column::TuningRequired, Expr::value(false)),
                (rule::Column::LastModifiedBy, Expr::value(Some(modified_by))),
            ],
        )
        .await
    }

    pub async fn set_performance_review(
        &self,
        rule_id: Uuid,
        tuning_required: bool,
    ) -> Result<()> {
        let now = Utc::now();
        rule::Entity::update_many()
            .col_expr(rule::Column::PerformanceReviewed, Expr::value(Some(now)))
            .col_expr(rule::Column::TuningRequired, Expr::value(tuning_required))
            .col_expr(rule::Column::UpdatedAt, Expr::value(now))
            .filter(rule::Column::Id.eq(rule_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Bump trigger/alert counters under a row-level conditional update
    pub async fn record_trigger_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        rule_id: Uuid,
        alerts_generated: i32,
    ) -> Result<()> {
        rule::Entity::update_many()
            .col_expr(
                rule::Column::TotalTriggers,
                Expr::col(rule::Column::TotalTriggers).add(1),
            )
            .col_expr(
                rule::Column::AlertsGenerated,
                Expr::col(rule::Column::AlertsGenerated).add(alerts_generated),
            )
            .col_expr(rule::Column::LastTriggered, Expr::value(Some(Utc::now())))
            .filter(rule::Column::Id.eq(rule_id))
            .exec(conn)
            .await?;
        Ok(())
    }
}

/// Audit log repository
pub struct AuditLogRepository {
    db: DatabaseConnection,
}

impl AuditLogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn insert_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: audit_log::ActiveModel,
    ) -> Result<AuditLog> {
        Ok(model.insert(conn).await?)
    }

    /// Search with the closed filter set, newest first, always bounded
    pub async fn search(&self, filter: &AuditSearchFilter) -> Result<Vec<AuditLog>> {
        let mut query = audit_log::Entity::find();

        if let Some(start) = filter.start_date {
            query = query.filter(audit_log::Column::Timestamp.gte(start));
        }
        if let Some(end) = filter.end_date {
            query = query.filter(audit_log::Column::Timestamp.lte(end));
        }
        if let Some(event_type) = &filter.event_type {
            query = query.filter(audit_log::Column::EventType.eq(event_type));
        }
        if let Some(category) = &filter.event_category {
            query = query.filter(audit_log::Column::EventCategory.eq(category));
        }
        if let Some(email) = &filter.user_email {
            query = query.filter(audit_log::Column::UserEmail.eq(email));
        }
        if let Some(resource_type) = &filter.resource_type {
            query = query.filter(audit_log::Column::ResourceType.eq(resource_type));
        }
        if let Some(resource_id) = filter.resource_id {
            query = query.filter(audit_log::Column::ResourceId.eq(resource_id));
        }
        if let Some(action) = &filter.action {
            query = query.filter(audit_log::Column::Action.eq(action));
        }

        let limit = filter
            .limit
            .unwrap_or(prodetect_common::audit::DEFAULT_SEARCH_LIMIT);

        Ok(query
            .order_by_desc(audit_log::Column::Timestamp)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// Full chronological event stream for one resource
    pub async fn trail(&self, resource_type: &str, resource_id: Uuid) -> Result<Vec<AuditLog>> {
        Ok(audit_log::Entity::find()
            .filter(audit_log::Column::ResourceType.eq(resource_type))
            .filter(audit_log::Column::ResourceId.eq(resource_id))
            .order_by_asc(audit_log::Column::Timestamp)
            .all(&self.db)
            .await?)
    }

    /// Bounded export slice for external compliance systems
    pub async fn export_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        event_category: Option<&str>,
        regulatory_only: bool,
        limit: u64,
    ) -> Result<Vec<AuditLog>> {
        let mut query = audit_log::Entity::find()
            .filter(audit_log::Column::Timestamp.gte(start))
            .filter(audit_log::Column::Timestamp.lte(end));
        if let Some(category) = event_category {
            query = query.filter(audit_log::Column::EventCategory.eq(category));
        }
        if regulatory_only {
            query = query.filter(audit_log::Column::RegulatorySignificance.eq(true));
        }
        Ok(query
            .order_by_asc(audit_log::Column::Timestamp)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn activity_breakdown(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityBreakdownRow>> {
        Ok(ActivityBreakdownRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT event_category, action, COUNT(*) AS count, MAX(timestamp) AS last_activity
               FROM audit_logs
               WHERE user_id = $1 AND timestamp >= $2
               GROUP BY event_category, action
               ORDER BY count DESC"#,
            [user_id.into(), since.into()],
        ))
        .all(&self.db)
        .await?)
    }

    pub async fn login_summary(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<LoginSummary> {
        let row = LoginSummary::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT
                   COUNT(*) FILTER (WHERE action = 'login') AS total_logins,
                   COUNT(*) FILTER (WHERE action = 'logout') AS total_logouts,
                   MAX(timestamp) FILTER (WHERE action = 'login') AS last_login,
                   COUNT(DISTINCT DATE(timestamp)) AS active_days
               FROM audit_logs
               WHERE user_id = $1 AND timestamp >= $2 AND event_category = 'authentication'"#,
            [user_id.into(), since.into()],
        ))
        .one(&self.db)
        .await?;
        Ok(row.unwrap_or_default())
    }

    pub async fn high_risk_activities(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<AuditLog>> {
        Ok(audit_log::Entity::find()
            .filter(audit_log::Column::UserId.eq(user_id))
            .filter(audit_log::Column::Timestamp.gte(since))
            .filter(
                Condition::any()
                    .add(audit_log::Column::RegulatorySignificance.eq(true))
                    .add(audit_log::Column::SuspiciousActivity.eq(true)),
            )
            .order_by_desc(audit_log::Column::Timestamp)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn overall_statistics(&self, since: DateTime<Utc>) -> Result<OverallAuditRow> {
        let row = OverallAuditRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT
                   COUNT(*) AS total_events,
                   COUNT(DISTINCT user_id) AS active_users,
                   COUNT(*) FILTER (WHERE regulatory_significance) AS regulatory_significant_events,
                   COUNT(*) FILTER (WHERE suspicious_activity) AS suspicious_events
               FROM audit_logs
               WHERE timestamp >= $1"#,
            [since.into()],
        ))
        .one(&self.db)
        .await?;

        Ok(row.unwrap_or(OverallAuditRow {
            total_events: 0,
            active_users: 0,
            regulatory_significant_events: 0,
            suspicious_events: 0,
        }))
    }

    pub async fn category_statistics(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<CategoryActivityRow>> {
        Ok(CategoryActivityRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT event_category, COUNT(*) AS event_count, COUNT(DISTINCT user_id) AS unique_users
               FROM audit_logs
               WHERE timestamp >= $1
               GROUP BY event_category
               ORDER BY event_count DESC"#,
            [since.into()],
        ))
        .all(&self.db)
        .await?)
    }

    pub async fn daily_trend(&self, since: DateTime<Utc>) -> Result<Vec<DailyActivityRow>> {
        Ok(DailyActivityRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT DATE(timestamp) AS activity_date, COUNT(*) AS event_count,
                      COUNT(DISTINCT user_id) AS unique_users
               FROM audit_logs
               WHERE timestamp >= $1
               GROUP BY DATE(timestamp)
               ORDER BY activity_date"#,
            [since.into()],
        ))
        .all(&self.db)
        .await?)
    }

    pub async fn top_users(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<TopUserRow>> {
        Ok(TopUserRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT user_id, user_email, COUNT(*) AS activity_count, MAX(timestamp) AS last_activity
               FROM audit_logs
               WHERE timestamp >= $1 AND user_id IS NOT NULL
               GROUP BY user_id, user_email
               ORDER BY activity_count DESC
               LIMIT $2"#,
            [since.into(), limit.into()],
        ))
        .all(&self.db)
        .await?)
    }

    pub async fn failed_operations(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<FailedOperationRow>> {
        Ok(FailedOperationRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT action, resource_type, COUNT(*) AS failure_count
               FROM audit_logs
               WHERE timestamp >= $1 AND status = 'failure'
               GROUP BY action, resource_type
               ORDER BY failure_count DESC"#,
            [since.into()],
        ))
        .all(&self.db)
        .await?)
    }

    /// Users logging in outside business hours more than five times
    pub async fn unusual_logins(&self, since: DateTime<Utc>) -> Result<Vec<UnusualLoginRow>> {
        Ok(UnusualLoginRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT user_id, user_email, COUNT(*) AS unusual_login_count
               FROM audit_logs
               WHERE timestamp >= $1 AND action = 'login'
               AND (EXTRACT(HOUR FROM timestamp) < 6 OR EXTRACT(HOUR FROM timestamp) > 22)
               GROUP BY user_id, user_email
               HAVING COUNT(*) > 5
               ORDER BY unusual_login_count DESC"#,
            [since.into()],
        ))
        .all(&self.db)
        .await?)
    }

    /// Users whose view actions touched more than a thousand records
    pub async fn high_volume_access(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<HighVolumeAccessRow>> {
        Ok(HighVolumeAccessRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT user_id, user_email, SUM(records_affected) AS total_records_accessed
               FROM audit_logs
               WHERE timestamp >= $1 AND action = 'view' AND records_affected IS NOT NULL
               GROUP BY user_id, user_email
               HAVING SUM(records_affected) > 1000
               ORDER BY total_records_accessed DESC"#,
            [since.into()],
        ))
        .all(&self.db)
        .await?)
    }

    /// Principals or addresses with more than ten authentication failures
    pub async fn failed_auth_attempts(&self, since: DateTime<Utc>) -> Result<Vec<FailedAuthRow>> {
        Ok(FailedAuthRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT user_email, ip_address, COUNT(*) AS failed_attempts
               FROM audit_logs
               WHERE timestamp >= $1 AND event_category = 'authentication' AND status = 'failure'
               GROUP BY user_email, ip_address
               HAVING COUNT(*) > 10
               ORDER BY failed_attempts DESC"#,
            [since.into()],
        ))
        .all(&self.db)
        .await?)
    }

    /// Users bursting past a hundred operations within a single hour
    pub async fn rapid_operations(&self, since: DateTime<Utc>) -> Result<Vec<RapidOperationsRow>> {
        Ok(RapidOperationsRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT user_id, user_email, COUNT(*) AS operation_count
               FROM audit_logs
               WHERE timestamp >= $1
               GROUP BY user_id, user_email, DATE(timestamp), EXTRACT(HOUR FROM timestamp)
               HAVING COUNT(*) > 100
               ORDER BY operation_count DESC"#,
            [since.into()],
        ))
        .all(&self.db)
        .await?)
    }
}

#[derive(FromQueryResult)]
pub struct OverallAuditRow {
    pub total_events: i64,
    pub active_users: i64,
    pub regulatory_significant_events: i64,
    pub suspicious_events: i64,
}

/// First instant of the month and of the following month
fn month_bounds(year: i32, month: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ProDetectError::Internal {
            message: format!("invalid month boundary {}-{}", year, month),
            source_detail: None,
            code: "INVALID_MONTH".to_string(),
        })?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ProDetectError::Internal {
            message: format!("invalid month boundary {}-{}", next_year, next_month),
            source_detail: None,
            code: "INVALID_MONTH".to_string(),
        })?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds_rollover() {
        let (start, end) = month_bounds(2024, 12).unwrap();
        assert_eq!(start.year(), 2024);
        assert_eq!(start.month(), 12);
        assert_eq!(end.year(), 2025);
        assert_eq!(end.month(), 1);
    }

    #[test]
    fn test_month_bounds_rejects_invalid_month() {
        assert!(month_bounds(2024, 13).is_err());
    }
}
