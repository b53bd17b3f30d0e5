use serde::Serialize;
use std::collections::BTreeMap;

use crate::backup;
use crate::config::MigrationConfig;
use crate::digest::payload_checksum;
use crate::error::MigrationError;
use crate::log::MigrationLog;
use crate::model::{EntityGroup, MigrationPayload};
use crate::saga::InsertSaga;
use crate::store::Store;
use crate::validate::{validate_input_data, ValidationError};

/// Outcome of `migrate_all_data`. Validation failures come back here with
/// `success: false`; I/O and persistence failures are `Err` instead.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl MigrationResult {
    fn invalid(errors: &[ValidationError]) -> Self {
        Self {
            success: false,
            errors: Some(errors.iter().map(|e| e.to_string()).collect()),
            message: Some(format!(
                "validation failed with {} error(s); nothing was written",
                errors.len()
            )),
            ..Default::default()
        }
    }
}

pub struct Migrator {
    store: Store,
    config: MigrationConfig,
    log: MigrationLog,
}

impl Migrator {
    pub fn new(store: Store, config: MigrationConfig) -> Result<Self, MigrationError> {
        let log = MigrationLog::open(&config.log_path())?;
        Ok(Self { store, config, log })
    }

    /// Open the workspace database named by `config` and build a migrator on it.
    pub fn open(config: MigrationConfig) -> Result<Self, MigrationError> {
        let store = Store::open(config.workspace())?;
        Self::new(store, config)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Validate against the payload and the ids already persisted.
    pub fn validate_input_data(
        &self,
        payload: &MigrationPayload,
    ) -> Result<Vec<ValidationError>, MigrationError> {
        let existing = self
            .store
            .existing_ids()
            .map_err(|e| MigrationError::persistence("load existing ids", e))?;
        Ok(validate_input_data(payload, &existing))
    }

    pub fn create_backup(&mut self) -> Result<String, MigrationError> {
        let dir = self.config.backups_dir();
        match backup::create_backup(&self.store, &dir) {
            Ok(id) => {
                self.log.info(format!("backup created: {}", id));
                Ok(id)
            }
            Err(e) => {
                self.log.error(format!("backup failed: {}", e));
                Err(e)
            }
        }
    }

    /// Validate, back up, then insert every group in dependency order.
    pub fn migrate_all_data(
        &mut self,
        payload: &MigrationPayload,
    ) -> Result<MigrationResult, MigrationError> {
        let checksum = payload_checksum(payload)?;
        self.log
            .info(format!("migration started (payload checksum {})", checksum));

        let violations = self.validate_input_data(payload)?;
        if !violations.is_empty() {
            self.log.warn(format!(
                "validation failed with {} error(s)",
                violations.len()
            ));
            for v in &violations {
                self.log.warn(format!("  {}", v));
            }
            return Ok(MigrationResult {
                checksum: Some(checksum),
                ..MigrationResult::invalid(&violations)
            });
        }
        self.log.info("validation passed");

        let backup_id = self.create_backup()?;

        let mut saga = InsertSaga::new(payload);
        let inserted = match saga.run(
            &mut self.store,
            &mut self.log,
            self.config.compensate_on_failure,
        ) {
            Ok(v) => v,
            Err(failure) => {
                let state = if failure.compensated {
                    "earlier groups were undone".to_string()
                } else {
                    format!("restore with backup {}", backup_id)
                };
                self.log.error(format!(
                    "migration aborted at {} ({})",
                    failure.group, state
                ));
                return Err(MigrationError::persistence(
                    format!("insert {}", failure.group),
                    failure.source,
                ));
            }
        };

        let summary: BTreeMap<String, usize> = EntityGroup::ALL
            .iter()
            .map(|g| {
                (
                    g.summary_key().to_string(),
                    inserted.get(g).copied().unwrap_or(0),
                )
            })
            .collect();
        let total: usize = summary.values().sum();
        self.log
            .info(format!("migration completed: {} records written", total));

        Ok(MigrationResult {
            success: true,
            summary: Some(summary),
            errors: None,
            message: Some(format!("migrated {} records", total)),
            backup_id: Some(backup_id),
            checksum: Some(checksum),
        })
    }

    /// Replace the persisted state with the contents of a backup.
    pub fn rollback(&mut self, backup_id: &str) -> Result<(), MigrationError> {
        self.log.info(format!("rollback started from {}", backup_id));
        let doc = match backup::read_backup(&self.config.backups_dir(), backup_id) {
            Ok(doc) => doc,
            Err(e) => {
                self.log.error(format!("rollback failed: {}", e));
                return Err(e);
            }
        };
        if let Err(e) = self.store.replace_all(&doc.data) {
            self.log.error(format!("rollback failed: {}", e));
            return Err(MigrationError::persistence("rollback", e));
        }
        self.log.info(format!("rollback completed from {}", backup_id));
        Ok(())
    }

    /// Smoke check after a run: core tables populated, no orphaned rows,
    /// no class over capacity.
    pub fn validate_migration(&mut self) -> Result<bool, MigrationError> {
        let counts = self
            .store
            .counts()
            .map_err(|e| MigrationError::persistence("count rows", e))?;
        let mut ok = true;
        for group in [EntityGroup::Students, EntityGroup::Classes] {
            if counts.get(&group).copied().unwrap_or(0) == 0 {
                self.log.warn(format!("post-check: no {} persisted", group));
                ok = false;
            }
        }

        let conn = self.store.conn();
        let mut problems = Vec::new();
        for (label, sql) in ORPHAN_CHECKS {
            let n: i64 = conn
                .query_row(sql, [], |r| r.get(0))
                .map_err(|e| MigrationError::persistence("post-check", e))?;
            if n > 0 {
                problems.push(format!("post-check: {} orphaned {}", n, label));
            }
        }
        let over: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM classes c
                 WHERE (SELECT COUNT(*) FROM class_enrollments e WHERE e.class_id = c.id) > c.capacity",
                [],
                |r| r.get(0),
            )
            .map_err(|e| MigrationError::persistence("post-check", e))?;
        if over > 0 {
            problems.push(format!("post-check: {} classes over capacity", over));
        }

        for p in &problems {
            self.log.warn(p);
        }
        ok = ok && problems.is_empty();
        self.log.info(format!(
            "post-check {}",
            if ok { "passed" } else { "failed" }
        ));
        Ok(ok)
    }
}

const ORPHAN_CHECKS: [(&str, &str); 9] = [
    (
        "enrollments",
        "SELECT COUNT(*) FROM class_enrollments e
         WHERE NOT EXISTS (SELECT 1 FROM classes c WHERE c.id = e.class_id)
            OR NOT EXISTS (SELECT 1 FROM students s WHERE s.id = e.student_id)",
    ),
    (
        "schedules",
        "SELECT COUNT(*) FROM schedules x
         WHERE NOT EXISTS (SELECT 1 FROM classes c WHERE c.id = x.class_id)",
    ),
    (
        "schedule exceptions",
        "SELECT COUNT(*) FROM schedule_exceptions x
         WHERE NOT EXISTS (SELECT 1 FROM schedules s WHERE s.id = x.schedule_id)",
    ),
    (
        "attendance entries",
        "SELECT COUNT(*) FROM attendance_entries x
         WHERE NOT EXISTS (SELECT 1 FROM attendance_records a WHERE a.id = x.record_id)
            OR NOT EXISTS (SELECT 1 FROM students s WHERE s.id = x.student_id)",
    ),
    (
        "notes",
        "SELECT COUNT(*) FROM class_notes x
         WHERE NOT EXISTS (SELECT 1 FROM classes c WHERE c.id = x.class_id)",
    ),
    (
        "tests",
        "SELECT COUNT(*) FROM tests x
         WHERE NOT EXISTS (SELECT 1 FROM classes c WHERE c.id = x.class_id)",
    ),
    (
        "test results",
        "SELECT COUNT(*) FROM test_results x
         WHERE NOT EXISTS (SELECT 1 FROM tests t WHERE t.id = x.test_id)
            OR NOT EXISTS (SELECT 1 FROM students s WHERE s.id = x.student_id)",
    ),
    (
        "homework assignments",
        "SELECT COUNT(*) FROM homework_assignments x
         WHERE NOT EXISTS (SELECT 1 FROM classes c WHERE c.id = x.class_id)",
    ),
    (
        "submissions",
        "SELECT COUNT(*) FROM homework_submissions x
         WHERE NOT EXISTS (SELECT 1 FROM homework_assignments h WHERE h.id = x.assignment_id)
            OR NOT EXISTS (SELECT 1 FROM students s WHERE s.id = x.student_id)",
    ),
];
