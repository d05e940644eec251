//! Infrastructure layer: job persistence, retention sweeps, configuration.

pub mod config;
pub mod jobs;
