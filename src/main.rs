//! sandbox-webhook - validating admission webhook for sandbox tenants.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration from the environment
//! - Starts the health server and the TLS webhook server
//! - Shuts down gracefully on SIGTERM/SIGINT

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use sandbox_webhook::health::{HealthState, run_health_server};
use sandbox_webhook::{WebhookConfig, run};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sandbox_webhook=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting sandbox-webhook");

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    let config = WebhookConfig::from_env()?;

    if !config.cert_path.exists() || !config.key_path.exists() {
        error!(
            cert_path = %config.cert_path.display(),
            key_path = %config.key_path.display(),
            "Webhook certificates not found"
        );
        return Err("webhook certificates not found".into());
    }

    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness probes work during startup
    let health_handle = tokio::spawn(run_health_server(health_state.clone(), config.health_port));
    let webhook_handle = tokio::spawn(run(config, health_state.clone()));

    tokio::select! {
        result = webhook_handle => task_exit("Webhook server", result)?,
        result = health_handle => task_exit("Health server", result)?,
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the Service stops routing admission requests here
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Turn the end of a server task into the process result.
///
/// The servers only stop on their own when something went wrong, so every
/// case is an error and the process exits non-zero.
fn task_exit<E: std::fmt::Display>(
    name: &str,
    result: Result<Result<(), E>, JoinError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let message = match result {
        Ok(Ok(())) => format!("{} stopped unexpectedly", name),
        Ok(Err(e)) => format!("{} error: {}", name, e),
        Err(e) => format!("{} task panicked: {}", name, e),
    };
    error!("{}", message);
    Err(message.into())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
