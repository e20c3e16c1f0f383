//! Database Sources - Where scripts and connection descriptors come from
//!
//! A [`DatabaseSource`] maps database nicknames to real database names,
//! connection descriptors and the four categories of scripts. Different
//! directory layouts plug in by implementing the trait; projects following
//! the conventional layout can use
//! [`DefaultDatabaseSource`](crate::default_source::DefaultDatabaseSource).

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::connection::ConnectionDescriptor;
use crate::error::{SourceError, SourceResult};

/// `(filename, content)` pairs. Order is irrelevant; the queue re-sorts.
pub type ScriptFiles = Vec<(String, String)>;

/// The four kinds of scripts a database carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptCategory {
    /// Schema for an empty database; guarded by an emptiness check
    BaselineSchema,
    /// Versioned changes, recorded in the tracking table
    Migrations,
    /// Views, functions and stored procedures; re-created every run
    Code,
    /// Idempotent bootstrap data; re-applied every run
    ReferenceData,
}

impl ScriptCategory {
    pub const ALL: [ScriptCategory; 4] = [
        ScriptCategory::BaselineSchema,
        ScriptCategory::Migrations,
        ScriptCategory::Code,
        ScriptCategory::ReferenceData,
    ];

    /// Directory holding this category's scripts in the conventional layout
    pub fn dir_name(&self) -> &'static str {
        match self {
            ScriptCategory::BaselineSchema => "baseline_schema",
            ScriptCategory::Migrations => "migrations",
            ScriptCategory::Code => "code",
            ScriptCategory::ReferenceData => "reference_data",
        }
    }

    /// Whether scripts of this category are recorded and skipped once applied
    pub fn is_tracked(&self) -> bool {
        matches!(self, ScriptCategory::Migrations)
    }
}

impl fmt::Display for ScriptCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Supplies scripts and connection descriptors, keyed by database nickname
#[async_trait]
pub trait DatabaseSource: Send + Sync {
    /// Real database name for a nickname
    async fn get_db_name_from_nickname(&self, nickname: &str) -> SourceResult<String>;

    /// Descriptor used to create and drop databases
    async fn get_system_connection_hash(&self) -> SourceResult<ConnectionDescriptor>;

    /// Descriptors for every known database, keyed by nickname
    async fn get_connection_hashes(&self) -> SourceResult<HashMap<String, ConnectionDescriptor>>;

    /// Descriptor for a single nickname
    async fn get_connection_hash(&self, nickname: &str) -> SourceResult<ConnectionDescriptor> {
        self.get_connection_hashes()
            .await?
            .remove(nickname)
            .ok_or_else(|| SourceError::unknown_nickname(nickname))
    }

    async fn get_baseline_schema_files(&self, nickname: &str) -> SourceResult<ScriptFiles>;

    async fn get_code_files(&self, nickname: &str) -> SourceResult<ScriptFiles>;

    async fn get_migrations_files(&self, nickname: &str) -> SourceResult<ScriptFiles>;

    async fn get_reference_data_files(&self, nickname: &str) -> SourceResult<ScriptFiles>;

    /// Dispatch to the category-specific getter
    async fn get_files(&self, category: ScriptCategory, nickname: &str) -> SourceResult<ScriptFiles> {
        match category {
            ScriptCategory::BaselineSchema => self.get_baseline_schema_files(nickname).await,
            ScriptCategory::Migrations => self.get_migrations_files(nickname).await,
            ScriptCategory::Code => self.get_code_files(nickname).await,
            ScriptCategory::ReferenceData => self.get_reference_data_files(nickname).await,
        }
    }
}
