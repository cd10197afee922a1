//! sandbox-webhook library crate
//!
//! Validating admission webhook that stops sandbox tenants from creating
//! resource kinds the platform reserves for regular users.

pub mod config;
pub mod directory;
pub mod error;
pub mod health;
pub mod webhooks;

pub use config::WebhookConfig;
pub use error::{Error, Result};
pub use health::HealthState;

use std::sync::Arc;

use kube::Client;
use tracing::info;

use directory::KubeUserDirectory;
use webhooks::{AdmissionGate, WebhookState, run_webhook_server};

/// Run the admission webhook until the server stops.
///
/// Connects to the cluster, builds the user directory and decision core, and
/// serves every configured guarded resource over TLS. Decisions are recorded
/// in `health_state`, which is marked ready once the server is listening.
pub async fn run(config: WebhookConfig, health_state: Arc<HealthState>) -> Result<()> {
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!(
        label_key = %config.policy.label_key(),
        label_value = %config.policy.label_value(),
        lookup_timeout = ?config.lookup_timeout,
        "Restricting sandbox users"
    );

    let directory = Arc::new(KubeUserDirectory::new(client, config.lookup_timeout));
    let gate = AdmissionGate::new(directory, config.policy.clone())
        .with_health_state(health_state.clone());
    let state = Arc::new(WebhookState::new(gate, Some(health_state)));

    run_webhook_server(
        state,
        &config.resources,
        config.webhook_port,
        &config.cert_path,
        &config.key_path,
    )
    .await
}
