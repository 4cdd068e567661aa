//! Vellum server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vellum_core::repository::ActivityLogRepository;
use vellum_db::DbManager;
use vellum_mail::{Mailer, MemoryMailer, SmtpMailer};
use vellum_server::config::Cli;
use vellum_server::{AppState, bootstrap};
use vellum_storage::{MemoryStore, ObjectStore, S3Store};

const ACTIVITY_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vellum=info")),
        )
        .json()
        .init();

    info!("Starting Vellum server...");

    let auth_config = cli.auth_config()?;
    let db = DbManager::connect(&cli.db_config())
        .await
        .context("connecting to the database")?;

    let store: Arc<dyn ObjectStore> = if cli.storage.in_memory {
        warn!("Using in-memory object storage; documents are lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            S3Store::new(cli.s3_config())
                .await
                .context("configuring object storage")?,
        )
    };

    let mailer: Arc<dyn Mailer> = match cli.smtp_config() {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).context("configuring SMTP transport")?),
        None => {
            warn!("No SMTP host configured; outgoing mail is only recorded in memory");
            Arc::new(MemoryMailer::new())
        }
    };

    let state = Arc::new(AppState::new(
        db,
        auth_config,
        store,
        mailer,
        cli.server_settings(),
    ));

    if let Some(config) = cli.bootstrap_config() {
        bootstrap::run(&state, &config)
            .await
            .context("provisioning the bootstrap tenant")?;
    }

    spawn_housekeeping(state.clone());

    let listener = tokio::net::TcpListener::bind(cli.listen_addr)
        .await
        .with_context(|| format!("binding {}", cli.listen_addr))?;
    info!(addr = %cli.listen_addr, "Listening");

    axum::serve(
        listener,
        vellum_server::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving HTTP")?;

    info!("Vellum server stopped.");
    Ok(())
}

/// Periodic activity-log expiry and rate-limiter cleanup.
fn spawn_housekeeping(state: Arc<AppState>) {
    let activity_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ACTIVITY_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match activity_state.activity.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Expired activity entries removed"),
                Err(e) => warn!(error = %e, "Activity log purge failed"),
            }
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            state.general_limiter.cleanup();
            state.auth_limiter.cleanup();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
