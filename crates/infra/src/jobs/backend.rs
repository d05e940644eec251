//! Durable media for the job store.
//!
//! The whole record set is loaded and saved as one document. There are no
//! partial writes: the file backend writes a sibling temp file and renames it
//! over the target.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use jobkeeper_core::{Job, JobId};

use super::store::JobStoreError;

/// The canonical record set, keyed by job id.
pub type JobMap = BTreeMap<JobId, Job>;

/// Current layout version written by [`JsonFileBackend`].
pub const SCHEMA_VERSION: u32 = 1;

/// Whole-collection persistence.
pub trait StoreBackend: Send + Sync {
    /// Load the persisted record set. `Ok(None)` means nothing has been
    /// persisted yet.
    fn load(&self) -> Result<Option<JobMap>, JobStoreError>;

    /// Replace the persisted record set.
    fn save(&self, jobs: &JobMap) -> Result<(), JobStoreError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

#[derive(Serialize)]
struct StoreDocumentRef<'a> {
    version: u32,
    jobs: &'a JobMap,
}

#[derive(Deserialize)]
struct StoreDocument {
    version: u32,
    jobs: BTreeMap<String, Value>,
}

/// A decoded document plus the number of records that had to be dropped.
#[derive(Debug)]
struct Decoded {
    jobs: JobMap,
    skipped: usize,
}

/// JSON document on the local filesystem.
///
/// Layout: `{"version": 1, "jobs": {"<id>": {..job..}}}`. A bare
/// `{"<id>": {..job..}}` map (the pre-versioned layout) is also accepted.
///
/// Records that do not decode are skipped with a warning. Whenever the file
/// cannot be taken in whole, it is first copied to `<name>.corrupt` so the
/// next save does not destroy the only copy.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path()
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "jobs.json".into());
        name.push(suffix);
        self.path().with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    /// Where an unreadable store file is preserved.
    pub fn corrupt_path(&self) -> PathBuf {
        self.sibling(".corrupt")
    }

    fn preserve_unreadable(&self) {
        let backup = self.corrupt_path();
        match fs::copy(self.path(), &backup) {
            Ok(_) => tracing::warn!(
                store = %self.path().display(),
                backup = %backup.display(),
                "kept a copy of the store file before it is rewritten"
            ),
            Err(e) => tracing::error!(
                store = %self.path().display(),
                backup = %backup.display(),
                error = %e,
                "failed to copy unreadable store file"
            ),
        }
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<JobMap>, JobStoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(JobStoreError::Load(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };

        match decode_document(&raw) {
            Ok(decoded) => {
                if decoded.skipped > 0 {
                    self.preserve_unreadable();
                }
                Ok(Some(decoded.jobs))
            }
            Err(e) => {
                self.preserve_unreadable();
                Err(JobStoreError::Load(format!("{}: {e}", self.path.display())))
            }
        }
    }

    fn save(&self, jobs: &JobMap) -> Result<(), JobStoreError> {
        let persistence = |e: std::io::Error| {
            JobStoreError::Persistence(format!("{}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(persistence)?;
            }
        }

        let doc = StoreDocumentRef {
            version: SCHEMA_VERSION,
            jobs,
        };
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| JobStoreError::Persistence(e.to_string()))?;

        let tmp = self.temp_path();
        fs::write(&tmp, bytes).map_err(persistence)?;
        fs::rename(&tmp, &self.path).map_err(persistence)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Decode either layout and re-key records by their own id.
///
/// Only a document whose outer shape is unreadable fails; a record that does
/// not decode is skipped.
fn decode_document(raw: &[u8]) -> Result<Decoded, String> {
    let value: Value = serde_json::from_slice(raw).map_err(|e| e.to_string())?;

    let versioned = value
        .as_object()
        .is_some_and(|o| o.get("version").is_some_and(Value::is_u64) && o.contains_key("jobs"));

    let by_key: BTreeMap<String, Value> = if versioned {
        let doc: StoreDocument = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if doc.version > SCHEMA_VERSION {
            return Err(format!(
                "unsupported store version {} (newest known is {SCHEMA_VERSION})",
                doc.version
            ));
        }
        doc.jobs
    } else {
        serde_json::from_value(value).map_err(|e| e.to_string())?
    };

    let mut jobs = JobMap::new();
    let mut skipped = 0;
    for (key, record) in by_key {
        let job: Job = match serde_json::from_value(record) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "skipping unreadable job record");
                skipped += 1;
                continue;
            }
        };
        if key != job.id.as_str() {
            tracing::warn!(key = %key, job_id = %job.id, "stored key differs from job id; using job id");
        }
        jobs.insert(job.id.clone(), job);
    }
    Ok(Decoded { jobs, skipped })
}

/// In-memory backend for tests/dev.
///
/// Counts writes and can be told to fail them.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    saved: Mutex<Option<JobMap>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already-persisted record set.
    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let map = jobs.into_iter().map(|j| (j.id.clone(), j)).collect();
        Self {
            saved: Mutex::new(Some(map)),
            ..Self::default()
        }
    }

    /// Number of successful saves.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Last persisted record set.
    pub fn snapshot(&self) -> Option<JobMap> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StoreBackend for InMemoryBackend {
    fn load(&self) -> Result<Option<JobMap>, JobStoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, jobs: &JobMap) -> Result<(), JobStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(JobStoreError::Persistence("write refused".to_string()));
        }
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(jobs.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
