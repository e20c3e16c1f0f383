//! Script Queue - Pending scripts and their canonical execution order
//!
//! Scripts are keyed by `(filename, db_nickname)`. Migration filenames are
//! expected to carry a sortable version prefix (e.g. `20130427_add_size.sql`),
//! so ascending filename order is execution order. The nickname is the
//! secondary key so that batches spanning several databases always run in
//! the same order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MigratorError, MigratorResult};

/// Scripts are recorded by name in the tracking table, whose column is
/// `varchar(255)`.
pub const MAX_SCRIPT_NAME_LENGTH: usize = 255;

/// A single script queued for execution against one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEntry {
    /// Script file name; recorded in the tracking table for tracked runs
    pub filename: String,
    /// Nickname of the database the script runs on
    pub db_nickname: String,
    /// Script body
    pub sql: String,
}

impl ScriptEntry {
    pub fn new(
        filename: impl Into<String>,
        db_nickname: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            db_nickname: db_nickname.into(),
            sql: sql.into(),
        }
    }
}

/// Queue of pending scripts with duplicate and name length validation.
///
/// Entries are only exposed through [`QueuedScriptCollection::sorted`], which
/// orders by filename then nickname, independent of insertion order.
#[derive(Debug, Clone, Default)]
pub struct QueuedScriptCollection {
    scripts: BTreeMap<(String, String), String>,
}

impl QueuedScriptCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script. Fails if the name is too long to be tracked, or if the
    /// same file is already queued for the same database; the queue is left
    /// untouched on failure.
    pub fn add(&mut self, filename: &str, db_nickname: &str, sql: &str) -> MigratorResult<()> {
        if filename.len() > MAX_SCRIPT_NAME_LENGTH {
            return Err(MigratorError::ScriptNameTooLong {
                filename: filename.to_string(),
                length: filename.len(),
            });
        }

        let key = (filename.to_string(), db_nickname.to_string());
        if self.scripts.contains_key(&key) {
            return Err(MigratorError::DuplicateScript {
                filename: key.0,
                db_nickname: key.1,
            });
        }

        self.scripts.insert(key, sql.to_string());
        Ok(())
    }

    /// All queued scripts ordered by `(filename, db_nickname)` ascending
    pub fn sorted(&self) -> Vec<ScriptEntry> {
        self.scripts
            .iter()
            .map(|((filename, db_nickname), sql)| ScriptEntry::new(filename, db_nickname, sql))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn clear(&mut self) {
        self.scripts.clear();
    }
}
