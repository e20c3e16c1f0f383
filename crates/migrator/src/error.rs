//! Error types for the migrator
//!
//! Three layers of errors: [`SourceError`] for script/configuration sources,
//! [`HandlerError`] for platform database handlers, and [`MigratorError`] which
//! is what every queue, runner and facade operation returns.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migrator operations
pub type MigratorResult<T> = Result<T, MigratorError>;

/// Result type alias for database handler operations
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Result type alias for database source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised by queue, runner and facade operations
#[derive(Debug, Error)]
pub enum MigratorError {
    #[error("Already have file {filename} for database {db_nickname}")]
    DuplicateScript {
        filename: String,
        db_nickname: String,
    },

    #[error("Script name {filename} has length {length}, exceeds max length {}", crate::script::MAX_SCRIPT_NAME_LENGTH)]
    ScriptNameTooLong { filename: String, length: usize },

    #[error("Missing connection hash for {db_nickname}")]
    MissingConnection { db_nickname: String },

    #[error("Can't run baseline script in non-empty database {db_nickname}")]
    AlreadyInitialized { db_nickname: String },

    #[error("Error executing {script_name} on {db_nickname}: {source}")]
    ScriptExecution {
        script_name: String,
        db_nickname: String,
        #[source]
        source: HandlerError,
    },

    #[error("Database handler failed during '{operation}' on {db_nickname}: {source}")]
    Handler {
        operation: &'static str,
        db_nickname: String,
        #[source]
        source: HandlerError,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl MigratorError {
    /// Create a handler error for a non-script operation
    pub fn handler(
        operation: &'static str,
        db_nickname: impl Into<String>,
        source: HandlerError,
    ) -> Self {
        Self::Handler {
            operation,
            db_nickname: db_nickname.into(),
            source,
        }
    }

    /// Name of the script whose execution failed, if this is an execution error
    pub fn failed_script(&self) -> Option<&str> {
        match self {
            Self::ScriptExecution { script_name, .. } => Some(script_name),
            _ => None,
        }
    }
}

/// Errors raised by [`DatabaseHandler`](crate::handler::DatabaseHandler) implementations
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid connection descriptor: {message}")]
    InvalidConnection { message: String },

    #[error("Invalid database identifier '{name}'")]
    InvalidIdentifier { name: String },

    #[error("{message}")]
    Failed { message: String },
}

impl HandlerError {
    /// Create a generic handler failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Create an invalid connection error
    pub fn invalid_connection(message: impl Into<String>) -> Self {
        Self::InvalidConnection {
            message: message.into(),
        }
    }
}

/// Errors raised by [`DatabaseSource`](crate::source::DatabaseSource) implementations
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parsing error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Missing config file at {path}")]
    MissingConfig { path: PathBuf },

    #[error("Unknown database nickname '{nickname}'")]
    UnknownNickname { nickname: String },

    #[error("Database '{nickname}' is missing required attribute '{attribute}'")]
    MissingAttribute { nickname: String, attribute: String },
}

impl SourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn unknown_nickname(nickname: impl Into<String>) -> Self {
        Self::UnknownNickname {
            nickname: nickname.into(),
        }
    }
}
