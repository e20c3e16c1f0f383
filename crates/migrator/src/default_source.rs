//! Default Database Source - TOML configuration plus a conventional directory layout
//!
//! Script directories are laid out as:
//!
//! ```text
//! <root>/
//!   <nickname>/
//!     baseline_schema/*.sql
//!     migrations/*.sql
//!     code/*.sql
//!     reference_data/*.sql
//! ```
//!
//! and connections come from a configuration file:
//!
//! ```toml
//! [migrator]
//! platform = "postgres"
//! default_database = "app"
//!
//! [server]
//! host = "localhost"
//! user = "postgres"
//! password = "secret"
//! dbname = "postgres"
//!
//! [databases.app]
//! host = "localhost"
//! user = "postgres"
//! password = "secret"
//! dbname = "app_dev"
//! ```
//!
//! Directory names under the root are nicknames (the `databases.*` keys),
//! not real database names.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::backends::Platform;
use crate::connection::ConnectionDescriptor;
use crate::error::{SourceError, SourceResult};
use crate::source::{DatabaseSource, ScriptCategory, ScriptFiles};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "dbmigrator.toml";

/// `[migrator]` section of the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigratorSettings {
    /// Script root; relative paths resolve against the config file's directory
    pub root: Option<PathBuf>,
    pub platform: Option<Platform>,
    /// Nickname used when none is given on the command line
    pub default_database: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    migrator: MigratorSettings,
    #[serde(default)]
    server: toml::Table,
    #[serde(default)]
    databases: BTreeMap<String, toml::Table>,
}

/// Parsed configuration file
#[derive(Debug, Clone, Default)]
pub struct MigratorConfig {
    pub migrator: MigratorSettings,
    pub server: ConnectionDescriptor,
    pub databases: BTreeMap<String, ConnectionDescriptor>,
}

impl MigratorConfig {
    /// Parse configuration text. Scalar values (strings, integers, booleans)
    /// become descriptor attributes; nested tables and arrays are ignored.
    pub fn parse(text: &str) -> SourceResult<Self> {
        let raw: RawConfig = toml::from_str(text)?;
        Ok(Self {
            migrator: raw.migrator,
            server: descriptor_from_table(&raw.server),
            databases: raw
                .databases
                .iter()
                .map(|(nickname, table)| (nickname.clone(), descriptor_from_table(table)))
                .collect(),
        })
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> SourceResult<Self> {
        if !path.exists() {
            return Err(SourceError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(|e| SourceError::io(path, e))?;
        Self::parse(&text)
    }
}

fn descriptor_from_table(table: &toml::Table) -> ConnectionDescriptor {
    table
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect()
}

/// Source for projects following the conventional layout
#[derive(Debug, Clone)]
pub struct DefaultDatabaseSource {
    config: MigratorConfig,
    root_dir: PathBuf,
}

impl DefaultDatabaseSource {
    /// Load `config_file` and read scripts from under `root_directory`
    pub fn new(config_file: impl AsRef<Path>, root_directory: impl Into<PathBuf>) -> SourceResult<Self> {
        let config = MigratorConfig::load(config_file.as_ref())?;
        Ok(Self::from_config(config, root_directory))
    }

    pub fn from_config(config: MigratorConfig, root_directory: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root_dir: root_directory.into(),
        }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn get_files(&self, nickname: &str, category: ScriptCategory) -> SourceResult<ScriptFiles> {
        let dir = self.root_dir.join(nickname).join(category.dir_name());
        if !dir.is_dir() {
            tracing::debug!(target: "dbmigrator", "No {} directory at {}", category, dir.display());
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| SourceError::io(&dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SourceError::io(&dir, e))?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(target: "dbmigrator", "Skipping non UTF-8 script name {}", path.display());
                continue;
            };
            let content = fs::read_to_string(&path).map_err(|e| SourceError::io(&path, e))?;
            files.push((name.to_string(), content));
        }
        Ok(files)
    }
}

#[async_trait]
impl DatabaseSource for DefaultDatabaseSource {
    async fn get_db_name_from_nickname(&self, nickname: &str) -> SourceResult<String> {
        let connection = self
            .config
            .databases
            .get(nickname)
            .ok_or_else(|| SourceError::unknown_nickname(nickname))?;
        connection
            .get("dbname")
            .map(str::to_string)
            .ok_or_else(|| SourceError::MissingAttribute {
                nickname: nickname.to_string(),
                attribute: "dbname".to_string(),
            })
    }

    async fn get_system_connection_hash(&self) -> SourceResult<ConnectionDescriptor> {
        Ok(self.config.server.clone())
    }

    async fn get_connection_hashes(&self) -> SourceResult<HashMap<String, ConnectionDescriptor>> {
        Ok(self
            .config
            .databases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn get_baseline_schema_files(&self, nickname: &str) -> SourceResult<ScriptFiles> {
        self.get_files(nickname, ScriptCategory::BaselineSchema)
    }

    async fn get_code_files(&self, nickname: &str) -> SourceResult<ScriptFiles> {
        self.get_files(nickname, ScriptCategory::Code)
    }

    async fn get_migrations_files(&self, nickname: &str) -> SourceResult<ScriptFiles> {
        self.get_files(nickname, ScriptCategory::Migrations)
    }

    async fn get_reference_data_files(&self, nickname: &str) -> SourceResult<ScriptFiles> {
        self.get_files(nickname, ScriptCategory::ReferenceData)
    }
}
