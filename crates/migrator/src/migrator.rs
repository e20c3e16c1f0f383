//! Migrator - Facade over a database source and a database handler
//!
//! Each script-running action gathers the category's files for every
//! requested nickname into ONE queue and executes it, so the global
//! `(filename, nickname)` order interleaves databases rather than finishing
//! one database before starting the next. An empty nickname list is a no-op.

use std::sync::Arc;

use tracing::info;

use crate::error::{MigratorError, MigratorResult, SourceError};
use crate::handler::{DatabaseHandler, TrackingRecord};
use crate::observer::{ExecutionObserver, TracingObserver};
use crate::runner::{ExecutionReport, ScriptRunner, TrackingSession};
use crate::source::{DatabaseSource, ScriptCategory};

/// Which actions [`Migrator::run_actions`] performs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionSet {
    pub delete_make_new: bool,
    pub baseline_schema: bool,
    pub migrations: bool,
    pub code_definitions: bool,
    pub reference_data: bool,
}

impl ActionSet {
    /// Migrations, code and reference data: the usual upgrade of an existing database
    pub fn update() -> Self {
        Self {
            migrations: true,
            code_definitions: true,
            reference_data: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Coordinates sources, handler and runner for the five database actions
pub struct Migrator {
    source: Arc<dyn DatabaseSource>,
    handler: Arc<dyn DatabaseHandler>,
    observer: Arc<dyn ExecutionObserver>,
    session: TrackingSession,
}

impl Migrator {
    pub fn new(source: Arc<dyn DatabaseSource>, handler: Arc<dyn DatabaseHandler>) -> Self {
        Self {
            source,
            handler,
            observer: Arc::new(TracingObserver),
            session: TrackingSession::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// DELETES each database and creates it empty, in order. Performs no checks
    /// on the existing database. Stops at the first failure.
    pub async fn delete_make_new<S: AsRef<str>>(&mut self, db_nicknames: &[S]) -> MigratorResult<()> {
        for db_nickname in db_nicknames {
            let db_nickname = db_nickname.as_ref();
            let db_name = self.source.get_db_name_from_nickname(db_nickname).await?;
            let system_connection = self.source.get_system_connection_hash().await?;

            self.observer.database_recreated(db_nickname, &db_name);
            self.handler
                .delete_make_new(&system_connection, &db_name)
                .await
                .map_err(|e| MigratorError::handler("delete_make_new", db_nickname, e))?;
            self.session.forget(db_nickname);
        }
        Ok(())
    }

    /// Run baseline schema on empty databases.
    ///
    /// Every database is checked before anything runs: if any of them already
    /// has user-defined tables, nothing is executed on any of them.
    pub async fn run_baseline_schema<S: AsRef<str>>(
        &mut self,
        db_nicknames: &[S],
    ) -> MigratorResult<ExecutionReport> {
        for db_nickname in db_nicknames {
            let db_nickname = db_nickname.as_ref();
            let connection = self
                .source
                .get_connection_hash(db_nickname)
                .await
                .map_err(|e| match e {
                    SourceError::UnknownNickname { nickname } => MigratorError::MissingConnection {
                        db_nickname: nickname,
                    },
                    other => other.into(),
                })?;

            let populated = self
                .handler
                .user_defined_tables_exist(&connection)
                .await
                .map_err(|e| MigratorError::handler("user_defined_tables_exist", db_nickname, e))?;
            if populated {
                return Err(MigratorError::AlreadyInitialized {
                    db_nickname: db_nickname.to_string(),
                });
            }
        }

        self.build_script_list_and_execute(ScriptCategory::BaselineSchema, db_nicknames)
            .await
    }

    /// Run migrations, recording them in each database's tracking table
    pub async fn run_migrations<S: AsRef<str>>(&mut self, db_nicknames: &[S]) -> MigratorResult<ExecutionReport> {
        self.build_script_list_and_execute(ScriptCategory::Migrations, db_nicknames)
            .await
    }

    /// Run code definitions (views, functions, stored procedures). Not tracked.
    pub async fn run_code_definitions<S: AsRef<str>>(
        &mut self,
        db_nicknames: &[S],
    ) -> MigratorResult<ExecutionReport> {
        self.build_script_list_and_execute(ScriptCategory::Code, db_nicknames)
            .await
    }

    /// Run idempotent reference data scripts. Not tracked.
    pub async fn run_reference_data<S: AsRef<str>>(
        &mut self,
        db_nicknames: &[S],
    ) -> MigratorResult<ExecutionReport> {
        self.build_script_list_and_execute(ScriptCategory::ReferenceData, db_nicknames)
            .await
    }

    /// Run the selected actions in order: new, schema, migrations, code, data
    pub async fn run_actions<S: AsRef<str>>(
        &mut self,
        actions: &ActionSet,
        db_nicknames: &[S],
    ) -> MigratorResult<ExecutionReport> {
        let mut report = ExecutionReport::default();
        if db_nicknames.is_empty() {
            return Ok(report);
        }

        if actions.delete_make_new {
            self.delete_make_new(db_nicknames).await?;
        }
        if actions.baseline_schema {
            report.merge(self.run_baseline_schema(db_nicknames).await?);
        }
        if actions.migrations {
            report.merge(self.run_migrations(db_nicknames).await?);
        }
        if actions.code_definitions {
            report.merge(self.run_code_definitions(db_nicknames).await?);
        }
        if actions.reference_data {
            report.merge(self.run_reference_data(db_nicknames).await?);
        }
        Ok(report)
    }

    /// Tracked scripts already applied to a database, oldest first
    pub async fn applied_scripts(&mut self, db_nickname: &str) -> MigratorResult<Vec<TrackingRecord>> {
        let connection = self
            .source
            .get_connection_hashes()
            .await?
            .remove(db_nickname)
            .ok_or_else(|| MigratorError::MissingConnection {
                db_nickname: db_nickname.to_string(),
            })?;

        if !self.session.is_confirmed(db_nickname) {
            self.handler
                .create_tracking_table(&connection)
                .await
                .map_err(|e| MigratorError::handler("create_tracking_table", db_nickname, e))?;
            self.session.confirm(db_nickname);
        }

        self.handler
            .tracking_records(&connection)
            .await
            .map_err(|e| MigratorError::handler("tracking_records", db_nickname, e))
    }

    /// Queue the category's scripts for every nickname in one runner, then execute
    async fn build_script_list_and_execute<S: AsRef<str>>(
        &mut self,
        category: ScriptCategory,
        db_nicknames: &[S],
    ) -> MigratorResult<ExecutionReport> {
        let connections = self.source.get_connection_hashes().await?;
        let mut runner = ScriptRunner::new(connections, self.handler.clone())
            .with_observer(self.observer.clone())
            .with_session(std::mem::take(&mut self.session));

        let result = self
            .queue_and_execute(&mut runner, category, db_nicknames)
            .await;
        self.session = runner.into_session();

        let report = result?;
        info!(
            target: "dbmigrator",
            executed = report.executed_count(),
            skipped = report.skipped_count(),
            "Finished {} in {}ms",
            category,
            report.execution_time_ms
        );
        Ok(report)
    }

    async fn queue_and_execute<S: AsRef<str>>(
        &self,
        runner: &mut ScriptRunner,
        category: ScriptCategory,
        db_nicknames: &[S],
    ) -> MigratorResult<ExecutionReport> {
        for db_nickname in db_nicknames {
            let db_nickname = db_nickname.as_ref();
            for (filename, sql) in self.source.get_files(category, db_nickname).await? {
                runner.add_script(&filename, db_nickname, &sql)?;
            }
        }
        runner.execute(category.is_tracked()).await
    }
}
