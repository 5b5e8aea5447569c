pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod services;
pub mod state;

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use config::Config;
use domain::events::NotificationEvent;
use state::SharedState;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("serve" | "-d" | "--daemon") | None => serve(config, prometheus_handle).await,

        Some("init") => {
            let created = Config::create_default_if_missing()?;
            if created {
                println!("Default config.toml written");
            } else {
                println!("config.toml already exists, left untouched");
            }
            Ok(())
        }

        Some("help" | "-h" | "--help") => {
            print_help();
            Ok(())
        }

        Some(other) => {
            println!("Unknown command: {other}");
            print_help();
            Ok(())
        }
    }
}

async fn serve(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!("fleetd v{} starting...", env!("CARGO_PKG_VERSION"));

    let shared = Arc::new(SharedState::new(config.clone()).await?);

    let notifier_handle = spawn_notification_consumer(shared.event_bus.subscribe());

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let state = api::create_app_state(shared, prometheus_handle);
        let app = api::router(state).await;

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        Some(tokio::spawn(async move {
            info!("API server listening at http://{addr}");
            if let Err(e) = axum::serve(listener, app).await {
                error!("Server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }

    notifier_handle.abort();
    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!("Stopped");

    Ok(())
}

/// Drains the event bus and logs each notification. Delivery transports
/// hang off this same subscription.
fn spawn_notification_consumer(
    mut rx: tokio::sync::broadcast::Receiver<NotificationEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match &event {
                    NotificationEvent::BookingCreated {
                        booking_id,
                        approver_ids,
                        ..
                    } => {
                        info!(
                            booking_id,
                            approvers = ?approver_ids,
                            "Notify: booking awaiting approval"
                        );
                    }
                    NotificationEvent::BookingApproved {
                        booking_id,
                        requester_id,
                    } => {
                        info!(booking_id, requester_id, "Notify: booking approved");
                    }
                    NotificationEvent::BookingRejected {
                        booking_id,
                        requester_id,
                        ..
                    } => {
                        info!(booking_id, requester_id, "Notify: booking rejected");
                    }
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Notification consumer lagged, {n} events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_help() {
    println!("fleetd v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: fleetd [command]");
    println!();
    println!("Commands:");
    println!("  serve    Start the API server (default)");
    println!("  init     Write a default config.toml next to the binary");
    println!("  help     Show this message");
}
