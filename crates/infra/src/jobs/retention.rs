//! Retention sweeper: deletes jobs whose retention window has elapsed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use jobkeeper_core::{JobId, RetentionPolicy};

use super::store::JobStore;

/// Result of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// The instant every job was evaluated against.
    pub swept_at: DateTime<Utc>,
    /// Ids removed by this sweep.
    pub removed: Vec<JobId>,
    /// `false` if the post-sweep write failed. The removals stand regardless.
    pub persisted: bool,
}

impl SweepReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Scans the whole store and removes expired jobs in one batch.
///
/// `now` is read once per sweep, so every record in a sweep is judged against
/// the same instant.
#[derive(Debug)]
pub struct RetentionSweeper<S: JobStore> {
    store: S,
    policy: RetentionPolicy,
}

impl<S: JobStore> RetentionSweeper<S> {
    pub fn new(store: S, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Sweep against the current wall-clock time.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    /// Sweep against a fixed instant.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let policy = self.policy;
        let removal = self
            .store
            .remove_where(&mut |job| policy.is_expired(job, now));

        for job in &removal.removed {
            info!(job_id = %job.id, name = %job.name, "deleting expired job");
        }

        let count = removal.removed.len();
        if count > 0 {
            info!(action = "cleanup", removed = count, persisted = removal.persisted, "cleanup complete");
            if !removal.persisted {
                warn!(removed = count, "expired jobs removed in memory only; store write failed");
            }
        } else {
            debug!(action = "cleanup", removed = 0, "no expired jobs");
        }

        SweepReport {
            swept_at: now,
            removed: removal.removed.into_iter().map(|j| j.id).collect(),
            persisted: removal.persisted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, TimeZone};
    use jobkeeper_core::Job;

    use crate::jobs::backend::InMemoryBackend;
    use crate::jobs::store::{DurableJobStore, InMemoryJobStore};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn job(id: &str) -> Job {
        Job::new(JobId::new(id).unwrap(), format!("job {id}"))
    }

    /// Ends at 2024-01-01T01:10Z, deletable from 2024-01-02T01:10Z.
    fn kiln(id: &str) -> Job {
        job(id)
            .starting_at(at(2024, 1, 1, 0, 0))
            .with_segment(30)
            .with_segment(30)
            .with_delay(10)
    }

    fn sweeper(jobs: Vec<Job>) -> RetentionSweeper<Arc<InMemoryJobStore>> {
        let store = DurableJobStore::arc(InMemoryBackend::with_jobs(jobs));
        RetentionSweeper::new(store, RetentionPolicy::default())
    }

    #[test]
    fn empty_store_removes_nothing_and_does_not_write() {
        let s = RetentionSweeper::new(InMemoryJobStore::new(), RetentionPolicy::default());
        let report = s.sweep();
        assert_eq!(report.removed_count(), 0);
        assert!(report.persisted);
        assert_eq!(s.store().backend().writes(), 0);
    }

    #[test]
    fn boundary_instant_is_inclusive() {
        let s = sweeper(vec![kiln("j1")]);

        let just_before = at(2024, 1, 2, 1, 10) - Duration::milliseconds(1);
        assert_eq!(s.sweep_at(just_before).removed_count(), 0);
        assert!(s.store().get("j1").is_some());

        let report = s.sweep_at(at(2024, 1, 2, 1, 10));
        assert_eq!(report.removed, vec![JobId::new("j1").unwrap()]);
        assert!(s.store().get("j1").is_none());
    }

    #[test]
    fn removes_only_eligible_jobs_with_one_write() {
        let mut jobs: Vec<Job> = (0..3).map(|i| kiln(&format!("old-{i}"))).collect();
        jobs.push(job("unstarted").with_segment(10));
        jobs.push(job("recent").starting_at(at(2024, 1, 2, 0, 0)).with_segment(30));
        let s = sweeper(jobs);

        let report = s.sweep_at(at(2024, 1, 2, 12, 0));

        assert_eq!(report.removed_count(), 3);
        assert!(report.persisted);
        assert_eq!(s.store().backend().writes(), 1);

        let left: Vec<String> = s.store().all().into_keys().map(JobId::into_inner).collect();
        assert_eq!(left, ["recent", "unstarted"]);
    }

    #[test]
    fn unstarted_jobs_are_never_removed() {
        let s = sweeper(vec![job("pending").with_segment(60)]);
        assert_eq!(s.sweep_at(DateTime::<Utc>::MAX_UTC).removed_count(), 0);
        assert_eq!(s.store().backend().writes(), 0);
    }

    #[test]
    fn second_sweep_finds_nothing() {
        let s = sweeper(vec![kiln("j1")]);
        let now = at(2024, 2, 1, 0, 0);
        assert_eq!(s.sweep_at(now).removed_count(), 1);
        assert_eq!(s.sweep_at(now).removed_count(), 0);
        assert_eq!(s.store().backend().writes(), 1);
    }

    #[test]
    fn failed_write_is_reported_but_removal_stands() {
        let s = sweeper(vec![kiln("j1")]);
        s.store().backend().fail_writes(true);

        let report = s.sweep_at(at(2024, 2, 1, 0, 0));
        assert_eq!(report.removed_count(), 1);
        assert!(!report.persisted);
        assert!(s.store().is_empty());
    }

    #[test]
    fn concurrent_sweeps_remove_each_job_once() {
        let jobs: Vec<Job> = (0..200).map(|i| kiln(&format!("j{i:03}"))).collect();
        let s = Arc::new(sweeper(jobs));
        let now = at(2024, 2, 1, 0, 0);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = s.clone();
                thread::spawn(move || s.sweep_at(now))
            })
            .collect();
        let reports: Vec<SweepReport> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let total: usize = reports.iter().map(SweepReport::removed_count).sum();
        assert_eq!(total, 200);

        let mut all_removed: Vec<&JobId> = reports.iter().flat_map(|r| &r.removed).collect();
        all_removed.sort();
        all_removed.dedup();
        assert_eq!(all_removed.len(), 200);
        assert!(s.store().is_empty());
    }
}
