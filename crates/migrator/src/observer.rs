//! Execution observers
//!
//! The migrator reports what it does through an [`ExecutionObserver`] handed
//! to it at construction. [`TracingObserver`] forwards everything to
//! `tracing`; [`NoopObserver`] discards it.

use tracing::{debug, error, info};

use crate::error::HandlerError;
use crate::script::ScriptEntry;

/// Sink for execution progress. Every method defaults to doing nothing.
pub trait ExecutionObserver: Send + Sync {
    fn database_recreated(&self, _db_nickname: &str, _db_name: &str) {}

    fn tracking_table_ensured(&self, _db_nickname: &str) {}

    fn script_started(&self, _script: &ScriptEntry, _tracked: bool) {}

    fn script_skipped(&self, _script: &ScriptEntry) {}

    fn script_failed(&self, _script: &ScriptEntry, _error: &HandlerError) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

/// Observer emitting `tracing` events under the `dbmigrator` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn database_recreated(&self, db_nickname: &str, db_name: &str) {
        info!(target: "dbmigrator", db_nickname, "Dropping and recreating {}", db_name);
    }

    fn tracking_table_ensured(&self, db_nickname: &str) {
        debug!(target: "dbmigrator", db_nickname, "Tracking table present");
    }

    fn script_started(&self, script: &ScriptEntry, tracked: bool) {
        info!(target: "dbmigrator", tracked, "Execute {} on {}", script.filename, script.db_nickname);
    }

    fn script_skipped(&self, script: &ScriptEntry) {
        debug!(
            target: "dbmigrator",
            "Skipping {} on {}, already applied",
            script.filename,
            script.db_nickname
        );
    }

    fn script_failed(&self, script: &ScriptEntry, err: &HandlerError) {
        error!(
            target: "dbmigrator",
            "Executing {} on {} failed: {}",
            script.filename,
            script.db_nickname,
            err
        );
    }
}
