//! Database Backends - `DatabaseHandler` implementations for supported platforms
//!
//! Both handlers open one connection per operation and close it afterwards;
//! nothing is pooled.

pub mod mysql;
pub mod postgres;
pub mod split;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{HandlerError, HandlerResult};
use crate::handler::DatabaseHandler;

pub use mysql::MySqlDatabaseHandler;
pub use postgres::PostgresDatabaseHandler;
pub use split::split_sql_statements;

/// Supported database platforms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,
    MySql,
}

impl Platform {
    /// Construct the handler for this platform
    pub fn handler(&self) -> Arc<dyn DatabaseHandler> {
        match self {
            Platform::Postgres => Arc::new(PostgresDatabaseHandler::new()),
            Platform::MySql => Arc::new(MySqlDatabaseHandler::new()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Postgres => f.write_str("postgres"),
            Platform::MySql => f.write_str("mysql"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Platform::Postgres),
            "mysql" => Ok(Platform::MySql),
            other => Err(format!("unsupported platform '{}' (expected postgres or mysql)", other)),
        }
    }
}

/// Database names are spliced into `create/drop database`, so only plain
/// identifiers are allowed.
pub(crate) fn validate_identifier(name: &str) -> HandlerResult<&str> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(HandlerError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// Parse the optional `port` attribute
pub(crate) fn parse_port(value: Option<&str>) -> HandlerResult<Option<u16>> {
    value
        .map(|port| {
            port.parse::<u16>()
                .map_err(|_| HandlerError::invalid_connection(format!("invalid port '{}'", port)))
        })
        .transpose()
}
