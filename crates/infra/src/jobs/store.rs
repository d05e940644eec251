//! Job record store.
//!
//! The store owns the canonical in-memory record set and its durable copy.
//! Every read, modify and persist step runs under one mutex, so request
//! handlers and cleanup sweeps never observe or produce a torn state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{error, info};

use jobkeeper_core::{Job, JobId};

use super::backend::{InMemoryBackend, JobMap, JsonFileBackend, StoreBackend};

/// Job store abstraction.
pub trait JobStore: Send + Sync {
    /// Copy of every record, keyed by id.
    fn all(&self) -> JobMap;

    /// Get a job by id.
    fn get(&self, id: &str) -> Option<Job>;

    /// Insert a new job. Fails if the id is taken.
    fn create(&self, job: Job) -> Result<Job, JobStoreError>;

    /// Replace an existing job. `None` if there is no job with that id.
    fn update(&self, id: &JobId, job: Job) -> Option<Job>;

    /// Delete a job. `false` if there was nothing to delete.
    fn delete(&self, id: &str) -> bool;

    /// Remove every job matching `predicate` as one batch.
    ///
    /// Ids are snapshotted before anything is removed, and the result is
    /// persisted at most once.
    fn remove_where(&self, predicate: &mut dyn FnMut(&Job) -> bool) -> Removal;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Job store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobStoreError {
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("failed to load job store: {0}")]
    Load(String),
    #[error("failed to persist job store: {0}")]
    Persistence(String),
}

/// Outcome of [`JobStore::remove_where`].
#[derive(Debug, Clone, Default)]
pub struct Removal {
    /// Removed records, in id order.
    pub removed: Vec<Job>,
    /// Whether the post-removal write succeeded. `true` when nothing was
    /// removed (no write was needed).
    pub persisted: bool,
}

/// Job store backed by a [`StoreBackend`].
///
/// Persistence failures are logged and do not undo the in-memory change; the
/// next successful write carries it to disk.
#[derive(Debug)]
pub struct DurableJobStore<B: StoreBackend> {
    backend: B,
    jobs: Mutex<JobMap>,
}

/// File-backed store used by the service.
pub type FileJobStore = DurableJobStore<JsonFileBackend>;

/// In-memory store for tests/dev.
pub type InMemoryJobStore = DurableJobStore<InMemoryBackend>;

impl<B: StoreBackend> DurableJobStore<B> {
    /// Load whatever the backend holds. A missing or unreadable store starts
    /// empty; this never fails.
    pub fn open(backend: B) -> Self {
        let jobs = match backend.load() {
            Ok(Some(jobs)) => {
                info!(store = %backend.describe(), jobs = jobs.len(), "loaded job store");
                jobs
            }
            Ok(None) => {
                info!(store = %backend.describe(), "no persisted jobs; starting empty");
                JobMap::new()
            }
            Err(e) => {
                error!(store = %backend.describe(), error = %e, "job store unreadable; starting empty");
                JobMap::new()
            }
        };

        Self {
            backend,
            jobs: Mutex::new(jobs),
        }
    }

    pub fn arc(backend: B) -> Arc<Self> {
        Arc::new(Self::open(backend))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn lock(&self) -> MutexGuard<'_, JobMap> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the full record set. Called with the lock held.
    fn persist(&self, jobs: &JobMap) -> bool {
        match self.backend.save(jobs) {
            Ok(()) => true,
            Err(e) => {
                error!(store = %self.backend.describe(), error = %e, "failed to save jobs");
                false
            }
        }
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::open(InMemoryBackend::new())
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: StoreBackend> JobStore for DurableJobStore<B> {
    fn all(&self) -> JobMap {
        self.lock().clone()
    }

    fn get(&self, id: &str) -> Option<Job> {
        self.lock().get(id).cloned()
    }

    fn create(&self, mut job: Job) -> Result<Job, JobStoreError> {
        let mut jobs = self.lock();
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        job.last_updated = Some(Utc::now());
        jobs.insert(job.id.clone(), job.clone());
        self.persist(&jobs);
        Ok(job)
    }

    fn update(&self, id: &JobId, mut job: Job) -> Option<Job> {
        let mut jobs = self.lock();
        let slot = jobs.get_mut(id)?;
        job.id = id.clone();
        job.last_updated = Some(Utc::now());
        *slot = job.clone();
        self.persist(&jobs);
        Some(job)
    }

    fn delete(&self, id: &str) -> bool {
        let mut jobs = self.lock();
        if jobs.remove(id).is_none() {
            return false;
        }
        self.persist(&jobs);
        true
    }

    fn remove_where(&self, predicate: &mut dyn FnMut(&Job) -> bool) -> Removal {
        let mut jobs = self.lock();

        let ids: Vec<JobId> = jobs.keys().cloned().collect();
        let mut removed = Vec::new();
        for id in ids {
            let matches = jobs.get(&id).is_some_and(|job| predicate(job));
            if matches {
                if let Some(job) = jobs.remove(&id) {
                    removed.push(job);
                }
            }
        }

        let persisted = removed.is_empty() || self.persist(&jobs);
        Removal { removed, persisted }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    fn all(&self) -> JobMap {
        (**self).all()
    }

    fn get(&self, id: &str) -> Option<Job> {
        (**self).get(id)
    }

    fn create(&self, job: Job) -> Result<Job, JobStoreError> {
        (**self).create(job)
    }

    fn update(&self, id: &JobId, job: Job) -> Option<Job> {
        (**self).update(id, job)
    }

    fn delete(&self, id: &str) -> bool {
        (**self).delete(id)
    }

    fn remove_where(&self, predicate: &mut dyn FnMut(&Job) -> bool) -> Removal {
        (**self).remove_where(predicate)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}
