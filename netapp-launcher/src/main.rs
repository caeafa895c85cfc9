mod config;
mod app;
mod registry;
mod resolver;
mod projection;
mod launcher;
mod mdns;
mod api;
#[cfg(test)]
mod test_support;

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use mdns_sd::ServiceDaemon;
use anyhow::{Context, Result};
use crate::app::{AppContext, AppSettings};
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::launcher::SystemOpener;
use crate::resolver::Resolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("netapp_launcher=info"))
        )
        .init();

    tracing::info!("Starting netapp-launcher");

    // Load config; only the default path may be absent
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH))?,
    };

    // Create mDNS daemon, optionally bound to one interface
    let mdns_daemon = ServiceDaemon::new()
        .context("Failed to create mDNS daemon")?;
    if let Some(interface) = &config.discovery.interface {
        mdns_daemon
            .disable_interface(mdns_sd::IfKind::All)
            .context("Failed to disable default interfaces")?;
        mdns_daemon
            .enable_interface(interface.as_str())
            .with_context(|| format!("Failed to enable interface {}", interface))?;
    }

    // Create cancellation token for the discovery session
    let cancel = CancellationToken::new();

    // Application context owned by the update loop
    let resolver = Resolver::new(&config.resolver)
        .context("Failed to build HTTP client")?;
    let (app_handle, app_rx) = app::channel();
    let (hash_tx, hash_rx) = watch::channel(String::new());
    let ctx = AppContext::new(
        resolver,
        Arc::new(SystemOpener::new(config.launcher.command.clone())),
        AppSettings {
            hide_on_launch: config.launcher.hide_on_launch,
        },
        app_handle.clone(),
        hash_tx,
        cancel.clone(),
    );
    let app_task = tokio::spawn(async move {
        if let Err(e) = app::run(ctx, app_rx).await {
            tracing::error!("Update loop error: {}", e);
        }
    });

    // Spawn mDNS browser task
    let browser_cancel = cancel.clone();
    let browser_daemon = mdns_daemon.clone();
    let browser_app = app_handle.clone();
    let service_types = config.discovery.service_types.clone();
    let browser_handle = tokio::spawn(async move {
        if let Err(e) = mdns::browser::run_browser(browser_daemon, service_types, browser_app, browser_cancel).await {
            tracing::error!("mDNS browser error: {}", e);
        }
    });

    // Build API router
    let app_state = api::routes::AppState {
        app: app_handle,
        hash_rx,
    };
    let router = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Run until the window is closed or ctrl-c
    wait_for_shutdown(tokio::signal::ctrl_c(), &cancel).await;

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(app_task, browser_handle, server_handle);

    // Shutdown mDNS daemon
    if let Err(e) = mdns_daemon.shutdown() {
        tracing::error!("Failed to shutdown mDNS daemon: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on ctrl-c or when the session is cancelled. If the signal
/// handler cannot be installed, only cancellation ends the wait.
async fn wait_for_shutdown<F>(ctrl_c: F, cancel: &CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = ctrl_c => match result {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                cancel.cancelled().await;
            }
        },
        _ = cancel.cancelled() => {}
    }
}
