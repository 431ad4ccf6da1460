// Per-run connection context
//
// Owned by one installation attempt: remembers the current target and guarantees the executor's
// connections are released once, whatever way the attempt ends.

use super::connection::ConnectionTarget;
use super::executor::{ExecutionError, SqlExecutor};
use log::{debug, warn};

pub struct RunContext<'a> {
    executor: &'a mut Box<dyn SqlExecutor>,
    target: Option<ConnectionTarget>,
    released: bool,
}

impl<'a> RunContext<'a> {
    pub fn new(executor: &'a mut Box<dyn SqlExecutor>) -> Self {
        Self {
            executor,
            target: None,
            released: false,
        }
    }

    pub fn target(&self) -> Option<&ConnectionTarget> {
        self.target.as_ref()
    }

    /// Switch to `target` unless it is already the current one.
    pub async fn point_at(&mut self, target: ConnectionTarget) -> anyhow::Result<()> {
        if self.target.as_ref() == Some(&target) {
            debug!(
                "[PHASE: database] [STEP: point_at] Reusing target {}",
                target.masked()
            );
            return Ok(());
        }
        self.executor.set_target(&target).await?;
        self.target = Some(target);
        Ok(())
    }

    pub async fn execute(&mut self, sql: &str) -> Result<(), ExecutionError> {
        self.executor.execute(sql).await
    }

    /// Close every connection. Later calls are no-ops.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.target = None;
        self.executor.close_all().await;
        debug!("[PHASE: database] [STEP: release] Run connections released");
    }
}

impl Drop for RunContext<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!("[PHASE: database] [STEP: release] Run context dropped without releasing connections");
        }
    }
}
