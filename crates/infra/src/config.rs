//! Service configuration, read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use jobkeeper_core::RetentionPolicy;

use crate::jobs::scheduler::MAX_TICK_INTERVAL;

pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND: &str = "JOBKEEPER_BIND";
pub const ENV_DB_PATH: &str = "JOBKEEPER_DB_PATH";
pub const ENV_CLEANUP_INTERVAL_SECS: &str = "JOBKEEPER_CLEANUP_INTERVAL_SECS";
pub const ENV_RETENTION_SECS: &str = "JOBKEEPER_RETENTION_SECS";
pub const ENV_APP_ENV: &str = "APP_ENV";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration for the job service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    /// Time between scheduled cleanup sweeps.
    pub cleanup_interval: Duration,
    /// How long a job is kept after its estimated end.
    pub retention_window: Duration,
    /// Free-form environment label (logged at startup).
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            db_path: PathBuf::from("jobs.json"),
            cleanup_interval: Duration::from_secs(60 * 60),
            retention_window: Duration::from_secs(24 * 60 * 60),
            environment: "development".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(get(ENV_PORT), ENV_PORT, defaults.port)?;
        let bind = parse_or(get(ENV_BIND), ENV_BIND, defaults.bind)?;
        let db_path = get(ENV_DB_PATH).map(PathBuf::from).unwrap_or(defaults.db_path);

        let cleanup_secs: u64 = parse_or(
            get(ENV_CLEANUP_INTERVAL_SECS),
            ENV_CLEANUP_INTERVAL_SECS,
            defaults.cleanup_interval.as_secs(),
        )?;
        let max_secs = MAX_TICK_INTERVAL.as_secs();
        if !(1..=max_secs).contains(&cleanup_secs) {
            return Err(ConfigError::Invalid {
                key: ENV_CLEANUP_INTERVAL_SECS,
                value: cleanup_secs.to_string(),
                reason: format!("must be between 1 and {max_secs} seconds"),
            });
        }

        let retention_secs: u64 = parse_or(
            get(ENV_RETENTION_SECS),
            ENV_RETENTION_SECS,
            defaults.retention_window.as_secs(),
        )?;

        Ok(Self {
            bind,
            port,
            db_path,
            cleanup_interval: Duration::from_secs(cleanup_secs),
            retention_window: Duration::from_secs(retention_secs),
            environment: get(ENV_APP_ENV).unwrap_or(defaults.environment),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::from_std(self.retention_window)
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_behaviour() {
        let cfg = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.listen_addr().to_string(), "0.0.0.0:3000");
        assert_eq!(cfg.cleanup_interval, Duration::from_secs(3600));
        assert_eq!(cfg.retention_window, Duration::from_secs(86_400));
        assert_eq!(cfg.retention_policy(), RetentionPolicy::default());
        assert_eq!(cfg.db_path, PathBuf::from("jobs.json"));
        assert_eq!(cfg.environment, "development");
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = ServiceConfig::from_lookup(lookup(&[
            (ENV_PORT, "8081"),
            (ENV_BIND, "127.0.0.1"),
            (ENV_DB_PATH, "/var/lib/jobkeeper/jobs.json"),
            (ENV_CLEANUP_INTERVAL_SECS, "60"),
            (ENV_RETENTION_SECS, "7200"),
            (ENV_APP_ENV, "production"),
        ]))
        .unwrap();

        assert_eq!(cfg.listen_addr().to_string(), "127.0.0.1:8081");
        assert_eq!(cfg.db_path, PathBuf::from("/var/lib/jobkeeper/jobs.json"));
        assert_eq!(cfg.cleanup_interval, Duration::from_secs(60));
        assert_eq!(cfg.retention_policy().window(), chrono::Duration::hours(2));
        assert_eq!(cfg.environment, "production");
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = ServiceConfig::from_lookup(lookup(&[(ENV_PORT, "  ")])).unwrap();
        assert_eq!(cfg.port, 3000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ServiceConfig::from_lookup(lookup(&[(ENV_PORT, "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_PORT, .. }));

        let err =
            ServiceConfig::from_lookup(lookup(&[(ENV_CLEANUP_INTERVAL_SECS, "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: ENV_CLEANUP_INTERVAL_SECS,
                ..
            }
        ));
    }

    #[test]
    fn cleanup_interval_is_bounded() {
        let too_long = (MAX_TICK_INTERVAL.as_secs() + 1).to_string();
        for value in [too_long.as_str(), "18446744073709551615"] {
            let err = ServiceConfig::from_lookup(lookup(&[(ENV_CLEANUP_INTERVAL_SECS, value)]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: ENV_CLEANUP_INTERVAL_SECS, .. }),
                "{value} should be rejected"
            );
        }

        let max = MAX_TICK_INTERVAL.as_secs().to_string();
        let cfg = ServiceConfig::from_lookup(lookup(&[(ENV_CLEANUP_INTERVAL_SECS, max.as_str())])).unwrap();
        assert_eq!(cfg.cleanup_interval, MAX_TICK_INTERVAL);
    }
}
