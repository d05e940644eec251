//! `jobkeeper-core`: job records and retention arithmetic.
//!
//! This crate contains **pure domain** code (no I/O, no clocks read behind the
//! caller's back). Infrastructure concerns live in `jobkeeper-infra`.

pub mod error;
pub mod id;
pub mod job;
pub mod retention;

pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use job::{Delay, Job, Segment};
pub use retention::{estimated_end_time, JobSchedule, RetentionPolicy};
