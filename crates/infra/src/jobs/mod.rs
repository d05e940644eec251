//! Job records: storage, retention sweeps and their scheduling.
//!
//! ## Components
//!
//! - `JobStore`: owns the record set; one lock guards every read/modify/persist
//! - `StoreBackend`: whole-document persistence (JSON file or in-memory)
//! - `RetentionSweeper`: removes jobs past their retention window in one batch
//! - `CleanupScheduler`: startup sweep, hourly sweeps, manual trigger

pub mod backend;
pub mod retention;
pub mod scheduler;
pub mod store;

pub use backend::{InMemoryBackend, JobMap, JsonFileBackend, StoreBackend};
pub use retention::{RetentionSweeper, SweepReport};
pub use scheduler::{CleanupError, CleanupHandle, CleanupScheduler, CleanupTrigger};
pub use store::{DurableJobStore, FileJobStore, InMemoryJobStore, JobStore, JobStoreError, Removal};
