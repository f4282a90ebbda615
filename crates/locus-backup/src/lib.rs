//! locus-backup - LocalBackupStore.
//!
//! A failed batch is written to `{root}/pending/` as its own JSON file,
//! named by `locus_core::naming::backup_file_name`, via write-temp-then-
//! rename so a crash mid-write never leaves a half-written entry behind.
//! A backup that exhausts its retry budget is moved, not deleted, to
//! `{root}/quarantine/` for manual inspection: it is retried at most
//! `max_retries` times.

use chrono::Utc;
use locus_config::BackupConfig;
use locus_core::naming::backup_file_name;
use locus_core::types::{BackupEntry, BackupStatus, Family, Record};
use locus_core::PipelineError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct LocalBackupStore {
    root: PathBuf,
    pending_dir: PathBuf,
    quarantine_dir: PathBuf,
    max_retries: u32,
    next_id: AtomicU64,
    /// Serializes concurrent operations against the same backup id. Keyed
    /// locks are created lazily and never removed; the process lifetime of
    /// one cycle never creates enough distinct ids for that to matter.
    locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl LocalBackupStore {
    /// Scans `root` for existing entries to pick a starting id that can't
    /// collide with one already on disk (a restart must not reuse an id).
    pub async fn open(config: &BackupConfig) -> Result<Self, PipelineError> {
        let root = PathBuf::from(&config.root);
        let pending_dir = root.join("pending");
        let quarantine_dir = root.join("quarantine");

        for dir in [&pending_dir, &quarantine_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                PipelineError::BackupPersistFatal {
                    message: format!("creating {}: {e}", dir.display()),
                }
            })?;
        }

        let max_seen = max_backup_id_in(&pending_dir)
            .await?
            .max(max_backup_id_in(&quarantine_dir).await?);

        Ok(Self {
            root,
            pending_dir,
            quarantine_dir,
            max_retries: config.max_retries,
            next_id: AtomicU64::new(max_seen + 1),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn lock_for(&self, backup_id: u64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(backup_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Persists a failed batch as a new, durable backup entry. Returns its id.
    pub async fn create(
        &self,
        family: Family,
        records: Vec<Record>,
        last_error: Option<String>,
    ) -> Result<u64, PipelineError> {
        let backup_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created_at = Utc::now();
        let entry = BackupEntry {
            backup_id,
            family,
            records,
            created_at,
            retry_count: 0,
            max_retries: self.max_retries,
            last_error,
            status: BackupStatus::Pending,
        };

        let name = backup_file_name(family, created_at, backup_id);
        write_entry_atomically(&self.pending_dir, &name, &entry).await?;
        Ok(backup_id)
    }

    /// All pending entries, oldest first. Replay is FIFO.
    pub async fn list_pending(&self) -> Result<Vec<BackupEntry>, PipelineError> {
        let mut entries = read_all_entries(&self.pending_dir).await?;
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    /// Records the outcome of one replay attempt against `backup_id`.
    /// On success the entry is deleted. On failure its retry count is
    /// incremented; once it reaches `max_retries` the entry is moved to
    /// quarantine and marked exhausted.
    pub async fn mark_attempt(
        &self,
        backup_id: u64,
        success: bool,
        error: Option<String>,
    ) -> Result<BackupEntry, PipelineError> {
        let guard = self.lock_for(backup_id).await;
        let _permit = guard.lock().await;

        let (path, mut entry) = find_entry(&self.pending_dir, backup_id)
            .await?
            .ok_or_else(|| PipelineError::BackupPersistFatal {
                message: format!("backup {backup_id} not found in pending store"),
            })?;

        if success {
            tokio::fs::remove_file(&path).await.map_err(|e| {
                PipelineError::BackupPersistFatal {
                    message: format!("removing {}: {e}", path.display()),
                }
            })?;
            entry.status = BackupStatus::Pending; // value returned for logging only; file is gone
            return Ok(entry);
        }

        entry.retry_count += 1;
        entry.last_error = error;

        if entry.retry_count > entry.max_retries {
            entry.status = BackupStatus::Exhausted;
            let name = backup_file_name(entry.family, entry.created_at, entry.backup_id);
            write_entry_atomically(&self.quarantine_dir, &name, &entry).await?;
            tokio::fs::remove_file(&path).await.map_err(|e| {
                PipelineError::BackupPersistFatal {
                    message: format!("removing {}: {e}", path.display()),
                }
            })?;
        } else {
            entry.status = BackupStatus::Pending;
            write_entry_atomically(&self.pending_dir, &filename(&path), &entry).await?;
        }

        Ok(entry)
    }

    /// All entries that exhausted their retry budget, for inspection tooling.
    pub async fn list_quarantined(&self) -> Result<Vec<BackupEntry>, PipelineError> {
        read_all_entries(&self.quarantine_dir).await
    }
}

fn filename(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

async fn max_backup_id_in(dir: &Path) -> Result<u64, PipelineError> {
    let entries = read_all_entries(dir).await?;
    Ok(entries.iter().map(|e| e.backup_id).max().unwrap_or(0))
}

async fn find_entry(
    dir: &Path,
    backup_id: u64,
) -> Result<Option<(PathBuf, BackupEntry)>, PipelineError> {
    let mut read_dir = tokio::fs::read_dir(dir).await.map_err(|e| {
        PipelineError::BackupPersistFatal {
            message: format!("reading {}: {e}", dir.display()),
        }
    })?;

    while let Some(entry) = read_dir.next_entry().await.map_err(|e| {
        PipelineError::BackupPersistFatal {
            message: format!("reading {}: {e}", dir.display()),
        }
    })? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let backup = load_entry(&path).await?;
        if backup.backup_id == backup_id {
            return Ok(Some((path, backup)));
        }
    }
    Ok(None)
}

async fn read_all_entries(dir: &Path) -> Result<Vec<BackupEntry>, PipelineError> {
    let mut read_dir = tokio::fs::read_dir(dir).await.map_err(|e| {
        PipelineError::BackupPersistFatal {
            message: format!("reading {}: {e}", dir.display()),
        }
    })?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(|e| {
        PipelineError::BackupPersistFatal {
            message: format!("reading {}: {e}", dir.display()),
        }
    })? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            entries.push(load_entry(&path).await?);
        }
    }
    Ok(entries)
}

async fn load_entry(path: &Path) -> Result<BackupEntry, PipelineError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        PipelineError::BackupPersistFatal {
            message: format!("reading {}: {e}", path.display()),
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| PipelineError::BackupPersistFatal {
        message: format!("parsing {}: {e}", path.display()),
    })
}

/// Write-temp-then-rename: a crash mid-write leaves only an orphaned
/// `.tmp` file, never a truncated or partially-written backup entry.
async fn write_entry_atomically(
    dir: &Path,
    name: &str,
    entry: &BackupEntry,
) -> Result<(), PipelineError> {
    let final_path = dir.join(name);
    let tmp_path = dir.join(format!("{name}.tmp"));

    let bytes = serde_json::to_vec_pretty(entry).map_err(|e| PipelineError::BackupPersistFatal {
        message: format!("encoding backup entry: {e}"),
    })?;

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| PipelineError::BackupPersistFatal {
            message: format!("writing {}: {e}", tmp_path.display()),
        })?;
    tokio::fs::rename(&tmp_path, &final_path)
        .await
        .map_err(|e| PipelineError::BackupPersistFatal {
            message: format!("renaming {} to {}: {e}", tmp_path.display(), final_path.display()),
        })?;
    Ok(())
}
