use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::digest::payload_checksum;
use crate::error::MigrationError;
use crate::model::{EntityGroup, MigrationPayload};
use crate::store::Store;

pub const BACKUP_FORMAT_V1: &str = "classboard-backup-v1";
const BACKUP_PREFIX: &str = "backup-";

/// On-disk backup document. `data` holds every persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub format: String,
    pub version: u32,
    pub backup_id: String,
    pub created_at: String,
    pub checksum: String,
    pub counts: BTreeMap<String, usize>,
    pub data: MigrationPayload,
}

pub fn backup_path(dir: &Path, backup_id: &str) -> PathBuf {
    dir.join(format!("{}.json", backup_id))
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> MigrationError + '_ {
    move |source| MigrationError::BackupIo {
        path: path.to_path_buf(),
        source,
    }
}

/// Snapshot the store into `dir/backup-<timestamp>.json` and return the id.
pub fn create_backup(store: &Store, dir: &Path) -> Result<String, MigrationError> {
    let data = store
        .snapshot()
        .map_err(|e| MigrationError::persistence("backup snapshot", e))?;
    write_backup(&data, dir)
}

pub fn write_backup(data: &MigrationPayload, dir: &Path) -> Result<String, MigrationError> {
    std::fs::create_dir_all(dir).map_err(io_err(dir))?;

    let now = Utc::now();
    let stem = format!("{}{}", BACKUP_PREFIX, now.format("%Y%m%d-%H%M%S-%3f"));
    let mut backup_id = stem.clone();
    let mut suffix = 1;
    while backup_path(dir, &backup_id).exists() {
        backup_id = format!("{}-{}", stem, suffix);
        suffix += 1;
    }

    let counts = EntityGroup::ALL
        .iter()
        .map(|g| (g.summary_key().to_string(), data.group_len(*g)))
        .collect();
    let doc = BackupFile {
        format: BACKUP_FORMAT_V1.to_string(),
        version: 1,
        backup_id: backup_id.clone(),
        created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        checksum: payload_checksum(data)?,
        counts,
        data: data.clone(),
    };
    let text = serde_json::to_string_pretty(&doc)?;

    let dst = backup_path(dir, &backup_id);
    let tmp = dir.join(format!("{}.json.writing", backup_id));
    {
        let mut out = File::create(&tmp).map_err(io_err(&tmp))?;
        out.write_all(text.as_bytes()).map_err(io_err(&tmp))?;
        out.sync_all().map_err(io_err(&tmp))?;
    }
    std::fs::rename(&tmp, &dst).map_err(io_err(&dst))?;

    tracing::debug!(backup_id = %backup_id, path = %dst.display(), "backup written");
    Ok(backup_id)
}

/// Load a backup and check its format tag and data checksum.
pub fn read_backup(dir: &Path, backup_id: &str) -> Result<BackupFile, MigrationError> {
    if backup_id.is_empty()
        || backup_id.contains('/')
        || backup_id.contains('\\')
        || backup_id.contains("..")
    {
        return Err(MigrationError::NotFound(backup_id.to_string()));
    }
    let path = backup_path(dir, backup_id);
    if !path.is_file() {
        return Err(MigrationError::NotFound(backup_id.to_string()));
    }

    let text = std::fs::read_to_string(&path).map_err(io_err(&path))?;
    let doc: BackupFile =
        serde_json::from_str(&text).map_err(|source| MigrationError::BackupFormat {
            path: path.clone(),
            source,
        })?;
    if doc.format != BACKUP_FORMAT_V1 {
        return Err(MigrationError::UnsupportedBackup {
            path,
            format: doc.format,
        });
    }

    let actual = payload_checksum(&doc.data)?;
    if actual != doc.checksum {
        return Err(MigrationError::ChecksumMismatch {
            id: backup_id.to_string(),
            expected: doc.checksum,
            actual,
        });
    }
    Ok(doc)
}

/// Backup ids in `dir`, newest first. A missing directory has no backups.
pub fn list_backups(dir: &Path) -> Result<Vec<String>, MigrationError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for ent in std::fs::read_dir(dir).map_err(io_err(dir))? {
        let p = ent.map_err(io_err(dir))?.path();
        if !p.is_file() || p.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = p.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with(BACKUP_PREFIX) {
            ids.push(stem.to_string());
        }
    }
    ids.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
    Ok(ids)
}

/// Timestamp stem plus the numeric collision suffix, so `-10` sorts after `-9`.
fn sort_key(id: &str) -> (&str, u64) {
    let stamp_len = BACKUP_PREFIX.len() + "YYYYMMDD-HHMMSS-mmm".len();
    match id.get(..stamp_len) {
        Some(stem) => {
            let suffix = id[stamp_len..]
                .strip_prefix('-')
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            (stem, suffix)
        }
        None => (id, 0),
    }
}
