//! Fake source and handler for tests
//!
//! [`FakeDatabaseHandler`] records every call as a line of text (e.g.
//! `"execute a_sql in db_1"`) so tests can assert on exact call order.
//! Connections are identified by their `conn` attribute, falling back to
//! `dbname`.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::connection::ConnectionDescriptor;
use crate::error::{HandlerError, HandlerResult, SourceError, SourceResult};
use crate::handler::{DatabaseHandler, TrackingRecord};
use crate::source::{DatabaseSource, ScriptFiles};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn conn_name(connection: &ConnectionDescriptor) -> String {
    connection
        .get("conn")
        .or_else(|| connection.get("dbname"))
        .unwrap_or("?")
        .to_string()
}

#[derive(Default)]
struct FakeState {
    history: Vec<String>,
    fail_on: HashSet<String>,
    fail_tracking_table: HashSet<String>,
    fail_record: HashSet<String>,
    populated: HashSet<String>,
    all_populated: bool,
    tracked: HashMap<String, Vec<TrackingRecord>>,
}

/// In-memory handler recording its call history
#[derive(Default)]
pub struct FakeDatabaseHandler {
    state: Mutex<FakeState>,
}

impl FakeDatabaseHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `execute` fail for this exact script body
    pub fn simulate_exception_on(&self, sql: &str) {
        lock(&self.state).fail_on.insert(sql.to_string());
    }

    /// Make `create_tracking_table` fail on this connection
    pub fn simulate_tracking_table_failure_on(&self, conn: &str) {
        lock(&self.state).fail_tracking_table.insert(conn.to_string());
    }

    /// Make `record_script_in_tracking_table` fail for this script name
    pub fn simulate_record_failure_on(&self, script_name: &str) {
        lock(&self.state).fail_record.insert(script_name.to_string());
    }

    /// Report user-defined tables in every database
    pub fn set_contains_user_defined_tables(&self, value: bool) {
        lock(&self.state).all_populated = value;
    }

    /// Report user-defined tables in one database only
    pub fn set_populated(&self, conn: &str) {
        lock(&self.state).populated.insert(conn.to_string());
    }

    pub fn call_history(&self) -> Vec<String> {
        lock(&self.state).history.clone()
    }

    /// Call history joined with `"; "`
    pub fn get_history(&self) -> String {
        self.call_history().join("; ")
    }

    /// Number of history lines equal to `line`
    pub fn count(&self, line: &str) -> usize {
        lock(&self.state).history.iter().filter(|h| *h == line).count()
    }

    pub fn clear_history(&self) {
        lock(&self.state).history.clear();
    }
}

#[async_trait]
impl DatabaseHandler for FakeDatabaseHandler {
    async fn delete_make_new(
        &self,
        _system_connection: &ConnectionDescriptor,
        database_name: &str,
    ) -> HandlerResult<()> {
        let mut state = lock(&self.state);
        if state.fail_on.contains(database_name) {
            return Err(HandlerError::failed(format!("cannot create {}", database_name)));
        }
        state.history.push(format!("create {}", database_name));
        state.tracked.remove(database_name);
        state.populated.remove(database_name);
        Ok(())
    }

    async fn create_tracking_table(&self, connection: &ConnectionDescriptor) -> HandlerResult<()> {
        let conn = conn_name(connection);
        let mut state = lock(&self.state);
        if state.fail_tracking_table.contains(&conn) {
            return Err(HandlerError::failed(format!("permission denied in {}", conn)));
        }
        state.history.push(format!("create_track_tbl in {}", conn));
        state.tracked.entry(conn).or_default();
        Ok(())
    }

    async fn user_defined_tables_exist(&self, connection: &ConnectionDescriptor) -> HandlerResult<bool> {
        let state = lock(&self.state);
        Ok(state.all_populated || state.populated.contains(&conn_name(connection)))
    }

    async fn is_in_tracking_table(
        &self,
        connection: &ConnectionDescriptor,
        script_name: &str,
    ) -> HandlerResult<bool> {
        let conn = conn_name(connection);
        let mut state = lock(&self.state);
        state.history.push(format!("check {} in {}", script_name, conn));
        let records = state.tracked.get(&conn).ok_or_else(|| {
            HandlerError::failed(format!("relation \"__schema_migrations\" does not exist in {}", conn))
        })?;
        Ok(records.iter().any(|r| r.script_name == script_name))
    }

    async fn record_script_in_tracking_table(
        &self,
        connection: &ConnectionDescriptor,
        script_name: &str,
    ) -> HandlerResult<()> {
        let conn = conn_name(connection);
        let mut state = lock(&self.state);
        if state.fail_record.contains(script_name) {
            return Err(HandlerError::failed(format!("cannot record {}", script_name)));
        }
        state.history.push(format!("record {} in {}", script_name, conn));
        state.tracked.entry(conn).or_default().push(TrackingRecord {
            script_name: script_name.to_string(),
            applied_at: Utc::now().naive_utc(),
        });
        Ok(())
    }

    async fn tracking_records(&self, connection: &ConnectionDescriptor) -> HandlerResult<Vec<TrackingRecord>> {
        let state = lock(&self.state);
        Ok(state.tracked.get(&conn_name(connection)).cloned().unwrap_or_default())
    }

    async fn execute(&self, connection: &ConnectionDescriptor, sql: &str) -> HandlerResult<()> {
        let mut state = lock(&self.state);
        if state.fail_on.contains(sql) {
            return Err(HandlerError::failed("bad sql"));
        }
        state.history.push(format!("execute {} in {}", sql, conn_name(connection)));
        Ok(())
    }
}

/// In-memory script provider keyed by nickname
#[derive(Debug, Clone, Default)]
pub struct FakeDatabaseSource {
    pub connections: HashMap<String, ConnectionDescriptor>,
    pub system_connection: ConnectionDescriptor,
    pub baseline_schema: HashMap<String, ScriptFiles>,
    pub code: HashMap<String, ScriptFiles>,
    pub migrations: HashMap<String, ScriptFiles>,
    pub reference_data: HashMap<String, ScriptFiles>,
}

impl FakeDatabaseSource {
    pub fn new() -> Self {
        Self {
            system_connection: ConnectionDescriptor::new().with("conn", "sys"),
            ..Self::default()
        }
    }

    /// Register a database whose `dbname` and `conn` are both `db_name`
    pub fn with_database(mut self, nickname: &str, db_name: &str) -> Self {
        self.connections.insert(
            nickname.to_string(),
            ConnectionDescriptor::new().with("dbname", db_name).with("conn", db_name),
        );
        self
    }

    fn files(&self, category: &HashMap<String, ScriptFiles>, nickname: &str) -> SourceResult<ScriptFiles> {
        if !self.connections.contains_key(nickname) {
            return Err(SourceError::unknown_nickname(nickname));
        }
        Ok(category.get(nickname).cloned().unwrap_or_default())
    }
}

/// Build a `(filename, content)` list from string pairs
pub fn script_files(pairs: &[(&str, &str)]) -> ScriptFiles {
    pairs
        .iter()
        .map(|(name, sql)| (name.to_string(), sql.to_string()))
        .collect()
}

#[async_trait]
impl DatabaseSource for FakeDatabaseSource {
    async fn get_db_name_from_nickname(&self, nickname: &str) -> SourceResult<String> {
        let conn = self
            .connections
            .get(nickname)
            .ok_or_else(|| SourceError::unknown_nickname(nickname))?;
        conn.get("dbname")
            .map(str::to_string)
            .ok_or_else(|| SourceError::MissingAttribute {
                nickname: nickname.to_string(),
                attribute: "dbname".to_string(),
            })
    }

    async fn get_system_connection_hash(&self) -> SourceResult<ConnectionDescriptor> {
        Ok(self.system_connection.clone())
    }

    async fn get_connection_hashes(&self) -> SourceResult<HashMap<String, ConnectionDescriptor>> {
        Ok(self.connections.clone())
    }

    async fn get_baseline_schema_files(&self, nickname: &str) -> SourceResult<ScriptFiles> {
        self.files(&self.baseline_schema, nickname)
    }

    async fn get_code_files(&self, nickname: &str) -> SourceResult<ScriptFiles> {
        self.files(&self.code, nickname)
    }

    async fn get_migrations_files(&self, nickname: &str) -> SourceResult<ScriptFiles> {
        self.files(&self.migrations, nickname)
    }

    async fn get_reference_data_files(&self, nickname: &str) -> SourceResult<ScriptFiles> {
        self.files(&self.reference_data, nickname)
    }
}
