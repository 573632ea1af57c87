use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_api::config::ServerConfig;
use relay_api::router::{build_app_router, build_health_router};
use relay_api::startup::{self, StartupError};
use relay_api::state::AppState;
use relay_comfyui::process::{ComfyUIProcess, LaunchConfig};
use relay_core::state::ServiceState;
use relay_pipeline::runner::GenerationPipeline;

/// How long a launched ComfyUI gets to exit after being killed.
const COMFYUI_KILL_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        health_port = config.health_port,
        comfyui_url = %config.comfyui_url,
        "Loaded server configuration",
    );

    // --- ComfyUI process ---
    let comfyui = match &config.comfyui_main {
        Some(main_py) => {
            let launch = LaunchConfig::comfyui(main_py, config.comfyui_port())?;
            Some(Arc::new(ComfyUIProcess::spawn(&launch)?))
        }
        None => {
            tracing::info!("COMFYUI_MAIN not set, using an externally managed ComfyUI");
            None
        }
    };

    // --- Pipeline + state ---
    let pipeline = Arc::new(GenerationPipeline::connect(
        &config.comfyui_url,
        config.workflow_dir.clone(),
        Arc::new(ServiceState::new()),
        config.pipeline.clone(),
    ));
    let state = AppState::new(config.clone(), Arc::clone(&pipeline), comfyui.clone());

    // --- Startup probe; a failure shuts the service down ---
    let shutdown = CancellationToken::new();
    let startup = startup::spawn(Arc::clone(&pipeline), comfyui.clone(), config.startup_timeout);
    let startup_watch = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match startup.await {
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "ComfyUI failed to start, shutting down");
                    shutdown.cancel();
                    Some(e)
                }
                _ => None,
            }
        }
    });

    // --- Health listener on its own port ---
    let health_server = if config.separate_health_port() {
        let addr = socket_addr(&config.host, config.health_port)?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind health port {addr}"))?;
        tracing::info!(%addr, "Serving health checks");
        let app = build_health_router(state.clone());
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
        }))
    } else {
        None
    };

    // --- Start server ---
    let addr = socket_addr(&config.host, config.port)?;
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, build_app_router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    shutdown.cancel();
    if let Some(handle) = health_server {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    let startup_error: Option<StartupError> = if startup_watch.is_finished() {
        startup_watch.await.ok().flatten()
    } else {
        startup_watch.abort();
        None
    };

    if let Some(process) = &comfyui {
        if process.is_running() {
            tracing::info!(pid = process.pid(), "Stopping ComfyUI");
            if process.terminate(COMFYUI_KILL_GRACE).await.is_none() {
                tracing::warn!("ComfyUI did not exit within the grace period");
            }
        }
    }

    match startup_error {
        Some(e) => Err(e.into()),
        None => {
            tracing::info!("Graceful shutdown complete");
            Ok(())
        }
    }
}

fn socket_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let ip = host
        .parse()
        .with_context(|| format!("Invalid HOST address {host:?}"))?;
    Ok(SocketAddr::new(ip, port))
}

/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let (text, json) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_api=debug,relay_pipeline=debug,relay_comfyui=info,tower_http=debug".into()
            }),
        )
        .with(text)
        .with(json)
        .init();
}

/// Wait for a termination signal, or for startup to fail.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal(fatal: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
        _ = fatal.cancelled() => {},
    }
}
