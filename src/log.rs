use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::MigrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Append-only status log for migration runs (`logs/migration.log`).
///
/// Every line is mirrored to `tracing`. Write failures are reported through
/// `tracing` and otherwise ignored so they never abort a run.
pub struct MigrationLog {
    path: PathBuf,
    file: File,
}

impl MigrationLog {
    pub fn open(path: &Path) -> Result<Self, MigrationError> {
        let log_err = |source: std::io::Error| MigrationError::Log {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(log_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(log_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.write(Level::Info, message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.write(Level::Warn, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.write(Level::Error, message.as_ref());
    }

    fn write(&mut self, level: Level, message: &str) {
        match level {
            Level::Info => tracing::info!("{}", message),
            Level::Warn => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let res = writeln!(self.file, "[{}] {} {}", ts, level.as_str(), message)
            .and_then(|_| self.file.flush());
        if let Err(e) = res {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to append migration log");
        }
    }
}
