use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;

use jobkeeper_core::RetentionPolicy;
use jobkeeper_infra::config::ServiceConfig;
use jobkeeper_infra::jobs::{
    CleanupHandle, CleanupScheduler, CleanupTrigger, FileJobStore, JobStore, JsonFileBackend,
    RetentionSweeper,
};

use crate::app::errors;

/// Store handle shared by handlers and the cleanup loop.
pub type SharedStore = Arc<dyn JobStore>;

/// Everything request handlers need.
#[derive(Clone)]
pub struct AppServices {
    store: SharedStore,
    cleanup: CleanupTrigger<SharedStore>,
    policy: RetentionPolicy,
}

/// Running services: handler state plus the cleanup loop that must be shut
/// down when the server stops.
pub struct Services {
    pub app: Arc<AppServices>,
    pub cleanup: CleanupHandle<SharedStore>,
}

/// Open the file store named by `config`, sweep it once and start the
/// periodic cleanup loop.
pub async fn start_services(config: &ServiceConfig) -> Services {
    let store: SharedStore = Arc::new(FileJobStore::open(JsonFileBackend::new(&config.db_path)));
    start_with_store(store, config.retention_policy(), config.cleanup_interval).await
}

/// Same as [`start_services`] over an already-open store.
pub async fn start_with_store(
    store: SharedStore,
    policy: RetentionPolicy,
    tick_interval: Duration,
) -> Services {
    let sweeper = Arc::new(RetentionSweeper::new(store.clone(), policy));
    let cleanup = CleanupScheduler::new(sweeper)
        .with_tick_interval(tick_interval)
        .start()
        .await;

    let app = Arc::new(AppServices {
        store,
        cleanup: cleanup.trigger(),
        policy,
    });

    Services { app, cleanup }
}

impl AppServices {
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn cleanup(&self) -> &CleanupTrigger<SharedStore> {
        &self.cleanup
    }

    /// Run a store operation on the blocking pool.
    pub async fn with_store<F, T>(&self, f: F) -> Result<T, Response>
    where
        F: FnOnce(&dyn JobStore) -> T + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&*store))
            .await
            .map_err(|e| errors::internal("store task failed", e))
    }
}
