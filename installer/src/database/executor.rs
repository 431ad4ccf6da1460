// SQL execution transport
//
// `SqlExecutor` is pointed at one target at a time and runs whole files (multi-statement text).
// Failures are `ExecutionError`: recoverable, handled by failure recovery, never fatal by
// themselves.

use super::connection::ConnectionTarget;
use crate::utils::logging::redact_values;
use async_trait::async_trait;
use log::{debug, info};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Same error with every occurrence of `sensitive` values replaced by `***`.
    pub fn redacted(&self, sensitive: &[String]) -> Self {
        Self::new(redact_values(&self.message, sensitive))
    }
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| format!(" (SQLSTATE {})", c)).unwrap_or_default();
                ExecutionError::new(format!("{}{}", db.message(), code))
            }
            _ => ExecutionError::new(err.to_string()),
        }
    }
}

#[async_trait]
pub trait SqlExecutor: Send {
    /// Point subsequent executions at `target`, dropping connections to any previous one.
    async fn set_target(&mut self, target: &ConnectionTarget) -> anyhow::Result<()>;

    async fn execute(&mut self, sql: &str) -> Result<(), ExecutionError>;

    /// Release every open connection. Must be safe to call when nothing is open.
    async fn close_all(&mut self);
}

/// PostgreSQL executor on a lazily connected single-connection sqlx pool.
pub struct PostgresExecutor {
    pool: Option<Pool<Postgres>>,
    acquire_timeout: Duration,
}

impl Default for PostgresExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

impl PostgresExecutor {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            pool: None,
            acquire_timeout,
        }
    }

    fn connect_options(target: &ConnectionTarget) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.user)
            .password(&target.password)
            .database(&target.database_name)
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    async fn set_target(&mut self, target: &ConnectionTarget) -> anyhow::Result<()> {
        self.close_all().await;

        // Lazy: connection problems surface on the first execute and go through recovery.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.acquire_timeout)
            .connect_lazy_with(Self::connect_options(target));

        info!(
            "[PHASE: database] [STEP: set_target] Executor target: {}",
            target.masked()
        );
        self.pool = Some(pool);
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<(), ExecutionError> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| ExecutionError::new("No database target selected"))?;

        let result = sqlx::raw_sql(sql).execute(pool).await?;
        debug!(
            "[PHASE: database] [STEP: execute] Statement batch done ({} row(s) affected)",
            result.rows_affected()
        );
        Ok(())
    }

    async fn close_all(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            debug!("[PHASE: database] [STEP: close_all] Connection pool closed");
        }
    }
}
