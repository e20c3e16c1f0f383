//! Database Handlers - Platform-specific database operations
//!
//! A [`DatabaseHandler`] owns everything vendor-specific: opening connections,
//! creating and dropping databases, the tracking table, and splitting a
//! script into statements. The runner and facade only ever talk to the trait.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionDescriptor;
use crate::error::HandlerResult;

/// Name of the per-database table recording applied tracked scripts
pub const TRACKING_TABLE: &str = "__schema_migrations";

/// Tracking table DDL. The column layout is shared with existing deployments
/// and must not change.
pub const CREATE_TRACKING_TABLE_SQL: &str = "create table if not exists __schema_migrations
(
  migration_id serial primary key,
  script_name varchar(255),
  date_applied timestamp not null default CURRENT_TIMESTAMP
)";

/// One row of the tracking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub script_name: String,
    pub applied_at: NaiveDateTime,
}

/// Database operations required by the migrator
#[async_trait]
pub trait DatabaseHandler: Send + Sync {
    /// Drop `database_name` if it exists, then create it empty.
    /// Runs on the system connection, never on the target database's own.
    async fn delete_make_new(
        &self,
        system_connection: &ConnectionDescriptor,
        database_name: &str,
    ) -> HandlerResult<()>;

    /// Create the tracking table if it is absent
    async fn create_tracking_table(&self, connection: &ConnectionDescriptor) -> HandlerResult<()>;

    /// True if the database already holds user-defined tables
    async fn user_defined_tables_exist(&self, connection: &ConnectionDescriptor) -> HandlerResult<bool>;

    /// True if `script_name` has been recorded (assumes the table exists)
    async fn is_in_tracking_table(
        &self,
        connection: &ConnectionDescriptor,
        script_name: &str,
    ) -> HandlerResult<bool>;

    async fn record_script_in_tracking_table(
        &self,
        connection: &ConnectionDescriptor,
        script_name: &str,
    ) -> HandlerResult<()>;

    /// Applied tracked scripts, oldest first (assumes the table exists)
    async fn tracking_records(&self, connection: &ConnectionDescriptor) -> HandlerResult<Vec<TrackingRecord>>;

    /// Execute a script, splitting it on the platform's batch separators.
    /// Any failing statement is an error, even if earlier statements of the
    /// same script were already applied.
    async fn execute(&self, connection: &ConnectionDescriptor, sql: &str) -> HandlerResult<()>;
}
