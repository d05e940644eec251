//! The job record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::DomainResult;
use crate::id::JobId;

/// A planned unit of work: a start time plus a sequence of timed segments and
/// any delays recorded against it.
///
/// Attributes the service does not interpret are kept in `extra` and written
/// back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    #[serde(default)]
    pub name: String,
    /// `None` means the job has not started.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub segments: Vec<Segment>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub delays: Vec<Delay>,
    /// Stamped by the store on every write; caller values are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A contiguous planned portion of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Minutes.
    #[serde(default)]
    pub duration: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Time added to a job's estimate because of an interruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delay {
    #[serde(default)]
    pub minutes: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Segment {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            extra: Map::new(),
        }
    }
}

impl Delay {
    pub fn new(minutes: u32) -> Self {
        Self {
            minutes,
            extra: Map::new(),
        }
    }
}

impl Job {
    /// Create a job with no schedule.
    pub fn new(id: JobId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            start_time: None,
            segments: Vec::new(),
            delays: Vec::new(),
            last_updated: None,
            extra: Map::new(),
        }
    }

    pub fn starting_at(mut self, at: DateTime<Utc>) -> Self {
        self.start_time = Some(at);
        self
    }

    pub fn with_segment(mut self, minutes: u32) -> Self {
        self.segments.push(Segment::new(minutes));
        self
    }

    pub fn with_delay(mut self, minutes: u32) -> Self {
        self.delays.push(Delay::new(minutes));
        self
    }

    /// Parse a job from a JSON payload.
    pub fn from_json_slice(bytes: &[u8]) -> DomainResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Planned segment minutes plus delay minutes.
    pub fn total_minutes(&self) -> u64 {
        let planned: u64 = self.segments.iter().map(|s| u64::from(s.duration)).sum();
        let delayed: u64 = self.delays.iter().map(|d| u64::from(d.minutes)).sum();
        planned + delayed
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM[:SS[.fff]]` (read as UTC), `null`
/// or `""`. The last two mean "not started".
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Some(naive.and_utc()));
        }
    }

    Err(serde::de::Error::custom(format!(
        "startTime is not a valid timestamp: {raw}"
    )))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
