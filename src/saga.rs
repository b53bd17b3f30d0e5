//! Group-by-group insert with compensating undo steps.
//!
//! Each entity group is inserted in its own transaction. A step that commits
//! is recorded; if a later step fails, the completed steps can be undone in
//! reverse order by deleting exactly the rows they wrote.

use std::collections::BTreeMap;

use crate::log::MigrationLog;
use crate::model::{EntityGroup, MigrationPayload};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaPhase {
    Pending,
    Inserting,
    Completed,
    Compensated,
    Failed,
}

/// A failed step, with the outcome of compensation if it was attempted.
#[derive(Debug)]
pub struct StepFailure {
    pub group: EntityGroup,
    pub source: rusqlite::Error,
    pub compensated: bool,
    /// Undo steps that themselves failed; earlier writes may remain.
    pub compensation_errors: Vec<(EntityGroup, rusqlite::Error)>,
}

pub struct InsertSaga<'a> {
    payload: &'a MigrationPayload,
    completed: Vec<(EntityGroup, usize)>,
    phase: SagaPhase,
}

impl<'a> InsertSaga<'a> {
    pub fn new(payload: &'a MigrationPayload) -> Self {
        Self {
            payload,
            completed: Vec::new(),
            phase: SagaPhase::Pending,
        }
    }

    pub fn phase(&self) -> SagaPhase {
        self.phase
    }

    pub fn completed(&self) -> &[(EntityGroup, usize)] {
        &self.completed
    }

    /// Insert every group in dependency order. On failure, undo what was
    /// written when `compensate` is set; otherwise leave it for `rollback`.
    pub fn run(
        &mut self,
        store: &mut Store,
        log: &mut MigrationLog,
        compensate: bool,
    ) -> Result<BTreeMap<EntityGroup, usize>, StepFailure> {
        self.phase = SagaPhase::Inserting;
        for group in EntityGroup::ALL {
            match store.insert_group(group, self.payload) {
                Ok(n) => {
                    log.info(format!("inserted {} {}", n, group));
                    self.completed.push((group, n));
                }
                Err(source) => {
                    log.error(format!("failed to insert {}: {}", group, source));
                    let mut failure = StepFailure {
                        group,
                        source,
                        compensated: false,
                        compensation_errors: Vec::new(),
                    };
                    if compensate {
                        failure.compensation_errors = self.compensate(store, log);
                        failure.compensated = failure.compensation_errors.is_empty();
                        self.phase = if failure.compensated {
                            SagaPhase::Compensated
                        } else {
                            SagaPhase::Failed
                        };
                    } else {
                        log.warn(format!(
                            "{} earlier groups left in place; restore from backup to recover",
                            self.completed.len()
                        ));
                        self.phase = SagaPhase::Failed;
                    }
                    return Err(failure);
                }
            }
        }
        self.phase = SagaPhase::Completed;
        Ok(self.completed.iter().copied().collect())
    }

    fn compensate(
        &mut self,
        store: &mut Store,
        log: &mut MigrationLog,
    ) -> Vec<(EntityGroup, rusqlite::Error)> {
        let mut errors = Vec::new();
        while let Some((group, _)) = self.completed.pop() {
            match store.delete_group(group, self.payload) {
                Ok(n) => log.info(format!("compensated {}: removed {} rows", group, n)),
                Err(e) => {
                    log.error(format!("compensation for {} failed: {}", group, e));
                    errors.push((group, e));
                }
            }
        }
        errors
    }
}
