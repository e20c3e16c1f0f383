//! Script Runner - Executes queued scripts against a database handler
//!
//! Scripts run strictly one at a time in the queue's canonical order. With
//! tracking enabled, each script is looked up in its database's tracking
//! table first and recorded after it succeeds, so a tracked script is applied
//! at most once. The first failure stops the whole batch; anything already
//! executed stays applied.
//!
//! The check/execute/record sequence is not atomic: two runs against the same
//! database at the same time can both execute a script that neither sees
//! recorded. Callers must not run concurrently against one database.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::connection::ConnectionDescriptor;
use crate::error::{MigratorError, MigratorResult};
use crate::handler::DatabaseHandler;
use crate::observer::{ExecutionObserver, TracingObserver};
use crate::script::{QueuedScriptCollection, ScriptEntry};

/// Databases whose tracking table is known to exist during this session
#[derive(Debug, Clone, Default)]
pub struct TrackingSession {
    confirmed: HashSet<String>,
}

impl TrackingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_confirmed(&self, db_nickname: &str) -> bool {
        self.confirmed.contains(db_nickname)
    }

    pub fn confirm(&mut self, db_nickname: &str) {
        self.confirmed.insert(db_nickname.to_string());
    }

    /// Drop the confirmation, e.g. after the database was recreated
    pub fn forget(&mut self, db_nickname: &str) {
        self.confirmed.remove(db_nickname);
    }

    pub fn clear(&mut self) {
        self.confirmed.clear();
    }
}

/// Outcome of a successful [`ScriptRunner::execute`] call
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Scripts that ran, in execution order
    pub executed: Vec<ScriptEntry>,
    /// Tracked scripts skipped because they were already recorded
    pub skipped: Vec<ScriptEntry>,
    pub execution_time_ms: u128,
}

impl ExecutionReport {
    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Fold another batch into this report
    pub fn merge(&mut self, other: ExecutionReport) {
        self.executed.extend(other.executed);
        self.skipped.extend(other.skipped);
        self.execution_time_ms += other.execution_time_ms;
    }
}

/// Collects scripts for several databases and executes them in order
pub struct ScriptRunner {
    connections: HashMap<String, ConnectionDescriptor>,
    handler: Arc<dyn DatabaseHandler>,
    observer: Arc<dyn ExecutionObserver>,
    queue: QueuedScriptCollection,
    session: TrackingSession,
}

impl ScriptRunner {
    /// Create a runner for the given nickname → descriptor map
    pub fn new(
        connections: HashMap<String, ConnectionDescriptor>,
        handler: Arc<dyn DatabaseHandler>,
    ) -> Self {
        Self {
            connections,
            handler,
            observer: Arc::new(TracingObserver),
            queue: QueuedScriptCollection::new(),
            session: TrackingSession::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Continue an existing tracking session instead of starting empty
    pub fn with_session(mut self, session: TrackingSession) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    /// Consume the runner, handing back its tracking session
    pub fn into_session(self) -> TrackingSession {
        self.session
    }

    pub fn queued(&self) -> &QueuedScriptCollection {
        &self.queue
    }

    /// Queue a script for a known database
    pub fn add_script(&mut self, filename: &str, db_nickname: &str, sql: &str) -> MigratorResult<()> {
        self.connection(db_nickname)?;
        self.queue.add(filename, db_nickname, sql)
    }

    /// Drop all queued scripts. Tracking-table confirmations are kept.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    fn connection(&self, db_nickname: &str) -> MigratorResult<&ConnectionDescriptor> {
        self.connections
            .get(db_nickname)
            .ok_or_else(|| MigratorError::MissingConnection {
                db_nickname: db_nickname.to_string(),
            })
    }

    /// Execute every queued script in `(filename, db_nickname)` order.
    ///
    /// With `track` set, scripts already in their database's tracking table
    /// are skipped and newly executed ones are recorded.
    pub async fn execute(&mut self, track: bool) -> MigratorResult<ExecutionReport> {
        let start_time = Instant::now();
        let mut report = ExecutionReport::default();

        for script in self.queue.sorted() {
            let connection = self.connection(&script.db_nickname)?.clone();

            if !track {
                self.run_script(&connection, &script, false).await?;
                report.executed.push(script);
                continue;
            }

            self.ensure_tracking_table(&connection, &script.db_nickname).await?;

            let applied = self
                .handler
                .is_in_tracking_table(&connection, &script.filename)
                .await
                .map_err(|e| MigratorError::handler("is_in_tracking_table", &script.db_nickname, e))?;

            if applied {
                self.observer.script_skipped(&script);
                report.skipped.push(script);
                continue;
            }

            self.run_script(&connection, &script, true).await?;
            self.handler
                .record_script_in_tracking_table(&connection, &script.filename)
                .await
                .map_err(|e| {
                    MigratorError::handler("record_script_in_tracking_table", &script.db_nickname, e)
                })?;
            report.executed.push(script);
        }

        report.execution_time_ms = start_time.elapsed().as_millis();
        Ok(report)
    }

    async fn run_script(
        &self,
        connection: &ConnectionDescriptor,
        script: &ScriptEntry,
        tracked: bool,
    ) -> MigratorResult<()> {
        self.observer.script_started(script, tracked);
        self.handler.execute(connection, &script.sql).await.map_err(|source| {
            self.observer.script_failed(script, &source);
            MigratorError::ScriptExecution {
                script_name: script.filename.clone(),
                db_nickname: script.db_nickname.clone(),
                source,
            }
        })
    }

    async fn ensure_tracking_table(
        &mut self,
        connection: &ConnectionDescriptor,
        db_nickname: &str,
    ) -> MigratorResult<()> {
        if self.session.is_confirmed(db_nickname) {
            return Ok(());
        }

        self.handler
            .create_tracking_table(connection)
            .await
            .map_err(|e| MigratorError::handler("create_tracking_table", db_nickname, e))?;
        self.session.confirm(db_nickname);
        self.observer.tracking_table_ensured(db_nickname);
        Ok(())
    }
}
