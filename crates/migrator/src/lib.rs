//! # dbmigrator: ordered SQL scripts for one or more databases
//!
//! Applies four categories of scripts (baseline schema, migrations, code
//! definitions, reference data) to databases referred to by nickname.
//! Migrations are recorded in a `__schema_migrations` table inside each
//! database so re-running is safe; the other categories re-run every time and
//! are expected to be idempotent.
//!
//! - [`QueuedScriptCollection`] validates and orders pending scripts
//! - [`ScriptRunner`] executes them, enforcing at-most-once for tracked scripts
//! - [`Migrator`] is the facade exposing the five actions
//!
//! Scripts and connection descriptors come from a [`DatabaseSource`]; all
//! platform work goes through a [`DatabaseHandler`].

pub mod backends;
pub mod connection;
pub mod default_source;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod handler;
pub mod migrator;
pub mod observer;
pub mod runner;
pub mod script;
pub mod source;

pub use backends::{MySqlDatabaseHandler, Platform, PostgresDatabaseHandler};
pub use connection::ConnectionDescriptor;
pub use default_source::{DefaultDatabaseSource, MigratorConfig, MigratorSettings, DEFAULT_CONFIG_FILE};
pub use error::{HandlerError, HandlerResult, MigratorError, MigratorResult, SourceError, SourceResult};
pub use handler::{DatabaseHandler, TrackingRecord, TRACKING_TABLE};
pub use migrator::{ActionSet, Migrator};
pub use observer::{ExecutionObserver, NoopObserver, TracingObserver};
pub use runner::{ExecutionReport, ScriptRunner, TrackingSession};
pub use script::{QueuedScriptCollection, ScriptEntry, MAX_SCRIPT_NAME_LENGTH};
pub use source::{DatabaseSource, ScriptCategory, ScriptFiles};
