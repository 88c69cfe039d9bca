use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tracing::{info, warn};

use library_lending::api::{RateLimitConfig, create_router, create_router_with_rate_limit};
use library_lending::app::AppState;
use library_lending::config::AppConfig;
use library_lending::infra::{PostgresClient, PostgresConfig, init_metrics_handle, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real deployments set the environment directly.
    dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let pg_config = PostgresConfig {
        max_connections: config.db_max_connections,
        ..PostgresConfig::default()
    };
    let db = Arc::new(
        PostgresClient::new(config.database_url.expose_secret(), pg_config)
            .await
            .context("failed to connect to PostgreSQL")?,
    );
    if config.run_migrations {
        db.run_migrations().await.context("migrations failed")?;
    }

    let mut state = AppState::new(db.clone(), db.clone(), db.clone(), db);
    if config.metrics_enabled {
        match init_metrics_handle() {
            Some(handle) => state = state.with_metrics(handle),
            None => warn!("Prometheus recorder could not be installed; /metrics disabled"),
        }
    }
    let state = Arc::new(state);

    let router = if config.rate_limit_enabled {
        info!(
            rps = config.rate_limit_rps,
            burst = config.rate_limit_burst,
            trust_proxy = config.rate_limit_trust_proxy,
            "Rate limiting enabled"
        );
        let limits = RateLimitConfig {
            trust_proxy_headers: config.rate_limit_trust_proxy,
            ..RateLimitConfig::new(config.rate_limit_rps, config.rate_limit_burst)
        };
        create_router_with_rate_limit(state, limits)
    } else {
        create_router(state)
    };

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Library lending service listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
