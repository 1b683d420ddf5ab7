//! Database connection management

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use tracing::{info, warn};

use prodetect_config::DatabaseConfig;
use prodetect_errors::ProDetectError;

/// Database connection manager
pub struct DatabaseManager {
    config: DatabaseConfig,
    connection: Option<DatabaseConnection>,
}

impl DatabaseManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    /// Establish the database connection pool
    pub async fn connect(&mut self) -> Result<(), ProDetectError> {
        info!("Connecting to database: {}", self.config.masked_url());

        let mut options = sea_orm::ConnectOptions::new(&self.config.url);
        options
            .max_connections(self.config.max_connections)
            .min_connections(self.config.min_connections)
            .acquire_timeout(self.config.acquire_timeout_duration())
            .idle_timeout(self.config.idle_timeout_duration())
            .sqlx_logging(self.config.log_queries);

        if let Some(max_lifetime) = self.config.max_lifetime_duration() {
            options.max_lifetime(max_lifetime);
        }

        let connection = Database::connect(options).await?;
        test_connection(&connection).await?;
        self.connection = Some(connection);

        info!("Database connection established");
        Ok(())
    }

    /// Get the active connection
    pub fn connection(&self) -> Result<&DatabaseConnection, ProDetectError> {
        self.connection.as_ref().ok_or_else(|| ProDetectError::Database {
            message: "Database connection not established".to_string(),
            operation: "get_connection".to_string(),
            code: "DATABASE_NOT_CONNECTED".to_string(),
        })
    }

    /// Probe the connection with a trivial round-trip
    pub async fn health_check(&self) -> Result<bool, ProDetectError> {
        let conn = self.connection()?;
        test_connection(conn).await.map(|_| true)
    }

    /// Close the pool
    pub async fn close(&mut self) -> Result<(), ProDetectError> {
        if let Some(connection) = self.connection.take() {
            connection.close().await?;
            info!("Database connection closed");
        }
        Ok(())
    }
}

async fn test_connection(conn: &DatabaseConnection) -> Result<(), ProDetectError> {
    let result = conn
        .execute(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("Database connection test failed: {}", e);
            Err(ProDetectError::Database {
                message: format!("Connection test failed: {}", e),
                operation: "connection_test".to_string(),
                code: "DATABASE_CONNECTION_TEST_FAILED".to_string(),
            })
        }
    }
}

/// Create a database connection with the given configuration
pub async fn create_connection(config: &DatabaseConfig) -> Result<DatabaseConnection, ProDetectError> {
    let mut manager = DatabaseManager::new(config.clone());
    manager.connect().await?;
    Ok(manager.connection()?.clone())
}

/// Create a connection to the local test database
pub async fn create_test_connection() -> Result<DatabaseConnection, ProDetectError> {
    create_connection(&DatabaseConfig::test_config()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_not_connected_initially() {
        let manager = DatabaseManager::new(DatabaseConfig::test_config());
        assert!(manager.connection().is_err());
    }
}
