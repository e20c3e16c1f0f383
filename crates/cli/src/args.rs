use std::path::{Path, PathBuf};

use clap::Parser;
use dbmigrator::{ActionSet, MigratorSettings, Platform, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "dbmigrator")]
#[command(about = "Migrate one or more databases, or the configured default database")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Create new (empty) databases, DELETING any existing ones
    #[arg(short = 'n', long = "new")]
    pub new: bool,

    /// Run baseline schema scripts on empty databases
    #[arg(short, long)]
    pub schema: bool,

    /// Run pending migrations
    #[arg(short, long)]
    pub migrations: bool,

    /// Run code definitions (views, functions, procedures)
    #[arg(short, long)]
    pub code: bool,

    /// Run reference data scripts
    #[arg(short, long)]
    pub data: bool,

    /// Update an existing database; same as -mcd
    #[arg(short, long)]
    pub update: bool,

    /// List applied migrations after running
    #[arg(short, long)]
    pub list: bool,

    /// Configuration file
    #[arg(long, env = "DBMIGRATOR_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Script root directory (overrides [migrator].root)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Database platform (overrides [migrator].platform)
    #[arg(long)]
    pub platform: Option<Platform>,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Database nicknames
    #[arg(value_name = "DB")]
    pub databases: Vec<String>,
}

impl Cli {
    /// Actions selected by the flags; `-u` expands to migrations, code and data
    pub fn actions(&self) -> ActionSet {
        ActionSet {
            delete_make_new: self.new,
            baseline_schema: self.schema,
            migrations: self.migrations || self.update,
            code_definitions: self.code || self.update,
            reference_data: self.data || self.update,
        }
    }

    /// Named databases, else the configured default, else nothing
    pub fn resolve_databases(&self, default_database: Option<&str>) -> Vec<String> {
        if !self.databases.is_empty() {
            return self.databases.clone();
        }
        match default_database {
            Some(db) if !db.trim().is_empty() => vec![db.trim().to_string()],
            _ => Vec::new(),
        }
    }

    /// `--root`, else `[migrator].root` relative to the config file, else the config file's directory
    pub fn resolve_root(&self, settings: &MigratorSettings) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        let config_dir = match self.config.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        match &settings.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => config_dir.join(root),
            None => config_dir,
        }
    }

    pub fn resolve_platform(&self, settings: &MigratorSettings) -> Platform {
        self.platform.or(settings.platform).unwrap_or_default()
    }

    pub fn config_path(&self) -> &Path {
        &self.config
    }
}
