//! Main AML service orchestrator

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

use prodetect_config::AmlConfig;
use prodetect_errors::Result;

use crate::audit::{AuditService, AuditSink};
use crate::cases::CaseWorkflow;
use crate::monitoring::MonitoringEngine;
use crate::reporting::ReportingService;
use crate::repositories::{
    AlertRepository, AuditLogRepository, CaseRepository, CustomerRepository, ReportRepository,
    RuleRepository, TransactionRepository,
};
use crate::risk_scoring::CustomerRiskService;
use crate::rules::RuleRegistry;
use crate::screening::{SanctionsScreeningProvider, StaticScreeningProvider};

/// Wires the AML core's components over one database connection.
///
/// Each component owns its queries and emits its own audit events through
/// the shared sink; callers reach the operations through the accessors.
pub struct AmlService {
    monitoring: MonitoringEngine,
    rules: RuleRegistry,
    risk: CustomerRiskService,
    cases: CaseWorkflow,
    reporting: ReportingService,
    audit: AuditService,
    db: DatabaseConnection,
}

impl AmlService {
    pub fn new(db: DatabaseConnection, config: AmlConfig) -> Self {
        Self::with_screener(db, config, Arc::new(StaticScreeningProvider::default()))
    }

    /// Construct with a custom sanctions screening boundary
    pub fn with_screener(
        db: DatabaseConnection,
        config: AmlConfig,
        screener: Arc<dyn SanctionsScreeningProvider>,
    ) -> Self {
        info!("Initializing AML service");

        let customers = Arc::new(CustomerRepository::new(db.clone()));
        let transactions = Arc::new(TransactionRepository::new(db.clone()));
        let alerts = Arc::new(AlertRepository::new(db.clone()));
        let cases_repo = Arc::new(CaseRepository::new(db.clone()));
        let reports = Arc::new(ReportRepository::new(db.clone()));
        let rules_repo = Arc::new(RuleRepository::new(db.clone()));
        let audit_repo = Arc::new(AuditLogRepository::new(db.clone()));

        let sink = Arc::new(AuditSink::new(db.clone(), audit_repo.clone()));

        let monitoring = MonitoringEngine::new(
            db.clone(),
            customers.clone(),
            transactions.clone(),
            alerts.clone(),
            rules_repo.clone(),
            sink.clone(),
            config.clone(),
        );

        let rules = RuleRegistry::new(
            rules_repo,
            transactions.clone(),
            alerts.clone(),
            sink.clone(),
            config.clone(),
        );

        let risk = CustomerRiskService::new(
            customers.clone(),
            transactions.clone(),
            alerts.clone(),
            sink.clone(),
            screener,
        );

        let cases = CaseWorkflow::new(db.clone(), cases_repo.clone(), alerts.clone(), sink.clone());

        let reporting = ReportingService::new(
            db.clone(),
            reports,
            cases_repo,
            customers,
            transactions,
            alerts,
            sink.clone(),
            config,
        );

        let audit = AuditService::new(audit_repo, sink);

        info!("AML service initialized");

        Self {
            monitoring,
            rules,
            risk,
            cases,
            reporting,
            audit,
            db,
        }
    }

    pub fn monitoring(&self) -> &MonitoringEngine {
        &self.monitoring
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn customer_risk(&self) -> &CustomerRiskService {
        &self.risk
    }

    pub fn cases(&self) -> &CaseWorkflow {
        &self.cases
    }

    pub fn reporting(&self) -> &ReportingService {
        &self.reporting
    }

    pub fn audit(&self) -> &AuditService {
        &self.audit
    }

    /// Probe database connectivity
    pub async fn health_check(&self) -> Result<bool> {
        use sea_orm::{ConnectionTrait, Statement};

        let result = self
            .db
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT 1".to_string(),
            ))
            .await;

        Ok(result.is_ok())
    }
}
