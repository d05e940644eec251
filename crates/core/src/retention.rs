//! Completion estimates and retention eligibility.
//!
//! A job's estimated end is its start plus every planned and delayed minute.
//! It becomes eligible for deletion once a fixed retention window has passed
//! after that estimate. Everything here is pure: callers supply `now`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::job::Job;

/// Default time a finished job is kept after its estimated end.
pub fn default_retention_window() -> Duration {
    Duration::hours(24)
}

/// Estimated completion time, or `None` for a job that has not started.
///
/// An estimate that would overflow the calendar is also `None`.
pub fn estimated_end_time(job: &Job) -> Option<DateTime<Utc>> {
    let start = job.start_time?;
    let minutes = i64::try_from(job.total_minutes()).ok()?;
    let span = Duration::try_minutes(minutes)?;
    start.checked_add_signed(span)
}

/// How long jobs are retained after their estimated end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            window: default_retention_window(),
        }
    }
}

impl RetentionPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Build from a std duration; windows beyond chrono's range saturate.
    pub fn from_std(window: std::time::Duration) -> Self {
        Self::new(Duration::from_std(window).unwrap_or(Duration::MAX))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Instant from which the job may be deleted.
    pub fn deletion_time(&self, job: &Job) -> Option<DateTime<Utc>> {
        estimated_end_time(job)?.checked_add_signed(self.window)
    }

    /// Inclusive: a job is expired at exactly its deletion instant.
    pub fn is_expired(&self, job: &Job, now: DateTime<Utc>) -> bool {
        match self.deletion_time(job) {
            Some(deletion) => now >= deletion,
            None => false,
        }
    }

    pub fn schedule(&self, job: &Job) -> JobSchedule {
        JobSchedule {
            estimated_end_time: estimated_end_time(job),
            deletion_time: self.deletion_time(job),
        }
    }
}

/// Computed times for a job, as exposed over the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSchedule {
    pub estimated_end_time: Option<DateTime<Utc>>,
    pub deletion_time: Option<DateTime<Utc>>,
}
