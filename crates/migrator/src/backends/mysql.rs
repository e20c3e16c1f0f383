//! MySQL handler
//!
//! Same descriptor attributes as the PostgreSQL handler. `dbname` doubles as
//! the schema searched for user-defined tables.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlparser::dialect::MySqlDialect;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Executor, Row};

use super::{parse_port, split_sql_statements, validate_identifier};
use crate::connection::ConnectionDescriptor;
use crate::error::HandlerResult;
use crate::handler::{DatabaseHandler, TrackingRecord, CREATE_TRACKING_TABLE_SQL};

const USER_TABLES_SQL: &str = "select table_name
from information_schema.tables
where (table_type = 'BASE TABLE' and table_schema = ?)
limit 1";

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDatabaseHandler;

impl MySqlDatabaseHandler {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(connection: &ConnectionDescriptor) -> HandlerResult<MySqlConnectOptions> {
        let mut options = MySqlConnectOptions::new()
            .host(connection.require("host")?)
            .username(connection.require("user")?)
            .database(connection.require("dbname")?);
        if let Some(password) = connection.get("password") {
            options = options.password(password);
        }
        if let Some(port) = parse_port(connection.get("port"))? {
            options = options.port(port);
        }
        Ok(options)
    }

    async fn open(connection: &ConnectionDescriptor) -> HandlerResult<MySqlConnection> {
        let options = Self::connect_options(connection)?;
        Ok(MySqlConnection::connect_with(&options).await?)
    }
}

#[async_trait]
impl DatabaseHandler for MySqlDatabaseHandler {
    async fn delete_make_new(
        &self,
        system_connection: &ConnectionDescriptor,
        database_name: &str,
    ) -> HandlerResult<()> {
        let database_name = validate_identifier(database_name)?;
        let mut conn = Self::open(system_connection).await?;

        let drop_sql = format!("drop database if exists {}", database_name);
        conn.execute(drop_sql.as_str()).await?;
        let create_sql = format!("create database {}", database_name);
        conn.execute(create_sql.as_str()).await?;

        conn.close().await?;
        Ok(())
    }

    async fn create_tracking_table(&self, connection: &ConnectionDescriptor) -> HandlerResult<()> {
        let mut conn = Self::open(connection).await?;
        conn.execute(CREATE_TRACKING_TABLE_SQL).await?;
        conn.close().await?;
        Ok(())
    }

    async fn user_defined_tables_exist(&self, connection: &ConnectionDescriptor) -> HandlerResult<bool> {
        let schema = connection.require("dbname")?;
        let mut conn = Self::open(connection).await?;
        let row = sqlx::query(USER_TABLES_SQL)
            .bind(schema)
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;
        Ok(row.is_some())
    }

    async fn is_in_tracking_table(
        &self,
        connection: &ConnectionDescriptor,
        script_name: &str,
    ) -> HandlerResult<bool> {
        let mut conn = Self::open(connection).await?;
        let row = sqlx::query("select script_name from __schema_migrations where script_name = ?")
            .bind(script_name)
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;
        Ok(row.is_some())
    }

    async fn record_script_in_tracking_table(
        &self,
        connection: &ConnectionDescriptor,
        script_name: &str,
    ) -> HandlerResult<()> {
        let mut conn = Self::open(connection).await?;
        sqlx::query("insert into __schema_migrations(script_name) values (?)")
            .bind(script_name)
            .execute(&mut conn)
            .await?;
        conn.close().await?;
        Ok(())
    }

    async fn tracking_records(&self, connection: &ConnectionDescriptor) -> HandlerResult<Vec<TrackingRecord>> {
        let mut conn = Self::open(connection).await?;
        let rows = sqlx::query(
            "select script_name, date_applied from __schema_migrations order by migration_id",
        )
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let script_name: Option<String> = row.try_get("script_name")?;
            let applied_at: NaiveDateTime = row.try_get("date_applied")?;
            records.push(TrackingRecord {
                script_name: script_name.unwrap_or_default(),
                applied_at,
            });
        }
        Ok(records)
    }

    async fn execute(&self, connection: &ConnectionDescriptor, sql: &str) -> HandlerResult<()> {
        let mut conn = Self::open(connection).await?;
        for statement in split_sql_statements(&MySqlDialect {}, sql) {
            if let Err(e) = conn.execute(statement.as_str()).await {
                tracing::error!(target: "dbmigrator", "Executing sql: {}", e);
                return Err(e.into());
            }
        }
        conn.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_require_host_user_and_dbname() {
        let incomplete = ConnectionDescriptor::new().with("host", "localhost");
        assert!(MySqlDatabaseHandler::connect_options(&incomplete).is_err());

        let complete = ConnectionDescriptor::new()
            .with("host", "localhost")
            .with("user", "root")
            .with("password", "secret")
            .with("dbname", "app")
            .with("port", "3306");
        assert!(MySqlDatabaseHandler::connect_options(&complete).is_ok());

        let bad_port = complete.with("port", "none");
        assert!(MySqlDatabaseHandler::connect_options(&bad_port).is_err());
    }

    #[tokio::test]
    async fn test_delete_make_new_rejects_unsafe_names() {
        let handler = MySqlDatabaseHandler::new();
        let system = ConnectionDescriptor::new().with("host", "localhost");
        let err = handler
            .delete_make_new(&system, "app`; drop database mysql")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::HandlerError::InvalidIdentifier { .. }));
    }
}
