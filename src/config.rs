use std::path::{Path, PathBuf};

use crate::db::DB_FILE;

pub const WORKSPACE_ENV: &str = "CLASSBOARD_WORKSPACE";

/// Where a migration run keeps its database, backups and log.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub workspace: PathBuf,
    /// Undo completed groups when a later group fails to insert.
    pub compensate_on_failure: bool,
}

impl MigrationConfig {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            compensate_on_failure: false,
        }
    }

    /// Workspace from `CLASSBOARD_WORKSPACE`, falling back to the current directory.
    pub fn from_env() -> Self {
        let workspace = std::env::var_os(WORKSPACE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(workspace)
    }

    pub fn with_compensation(mut self, on: bool) -> Self {
        self.compensate_on_failure = on;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn db_path(&self) -> PathBuf {
        self.workspace.join(DB_FILE)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.workspace.join("backups")
    }

    pub fn log_path(&self) -> PathBuf {
        self.workspace.join("logs").join("migration.log")
    }
}
