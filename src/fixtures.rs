use std::path::Path;

use crate::error::MigrationError;
use crate::model::MigrationPayload;

/// Mock seed data used when no input file is given.
pub const DEMO_FIXTURE: &str = include_str!("../fixtures/demo.json");

pub fn demo_payload() -> Result<MigrationPayload, MigrationError> {
    Ok(serde_json::from_str(DEMO_FIXTURE)?)
}

pub fn load_payload(path: &Path) -> Result<MigrationPayload, MigrationError> {
    let text = std::fs::read_to_string(path).map_err(|source| MigrationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// The demo fixture with three independent defects injected: a malformed
/// email, a zero-capacity class and a result for an unknown student.
pub fn broken_demo_payload() -> Result<MigrationPayload, MigrationError> {
    let mut p = demo_payload()?;
    if let Some(s) = p.students.first_mut() {
        s.email = "not-an-email".to_string();
    }
    if let Some(c) = p.classes.first_mut() {
        c.capacity = 0;
    }
    if let Some(r) = p.test_results.first_mut() {
        r.student_id = "nonexistent".to_string();
    }
    Ok(p)
}
