use anyhow::Context;

use jobkeeper_api::app::{self, routes, services};
use jobkeeper_infra::config::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jobkeeper_observability::init();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        environment = %config.environment,
        store = %config.db_path.display(),
        "starting jobkeeper"
    );

    // Runs the startup sweep before we accept any traffic.
    let services = services::start_services(&config).await;
    let router = app::build_app(services.app.clone());

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);
    for (method, path, description) in routes::ENDPOINTS {
        tracing::info!(method, path, "{description}");
    }
    tracing::info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        retention_window_secs = config.retention_window.as_secs(),
        "jobs are deleted once the retention window has passed after their estimated end"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    services.cleanup.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
