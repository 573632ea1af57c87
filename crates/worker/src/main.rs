use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_core::job::UNKNOWN_JOB_ID;
use relay_core::state::ServiceState;
use relay_pipeline::runner::GenerationPipeline;
use relay_worker::config::WorkerConfig;
use relay_worker::handler::{handle, InvocationEvent, InvocationResponse};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env()?;
    tracing::info!(
        comfyui_url = %config.comfyui_url,
        workflow_dir = %config.workflow_dir.display(),
        "Worker starting",
    );

    let pipeline = GenerationPipeline::connect(
        &config.comfyui_url,
        config.workflow_dir.clone(),
        Arc::new(ServiceState::new()),
        config.pipeline.clone(),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read invocation")?,
            _ = &mut shutdown => break,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<InvocationEvent>(&line) {
            Ok(event) => handle(&pipeline, event).await,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable invocation event");
                InvocationResponse::failed(
                    Some(UNKNOWN_JOB_ID.to_string()),
                    format!("Invalid invocation event: {e}"),
                )
            }
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    tracing::info!("Worker stopped");
    Ok(())
}

/// Logs go to stderr; stdout carries responses. `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let (text, json) = if json {
        (
            None,
            Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_worker=debug,relay_pipeline=debug,relay_comfyui=info".into()
            }),
        )
        .with(text)
        .with(json)
        .init();
}

/// Resolves on SIGINT, or SIGTERM on Unix. Input already being handled
/// finishes first.
async fn shutdown_signal() {
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
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
