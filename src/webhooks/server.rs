//! Admission webhook server.
//!
//! Provides one HTTP endpoint per guarded resource kind. All endpoints share a
//! single handler and a single [`AdmissionGate`]; the only thing that differs
//! between them is the [`GuardedResource`] attached to the route.
//!
//! To enable the webhook:
//! 1. Deploy cert-manager (or the platform's serving-cert injector) for TLS
//! 2. Create a ValidatingWebhookConfiguration pointing at the endpoints below
//! 3. Mount the TLS certificate secret at /etc/webhook/certs/

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Router, extract::State, routing::post};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::health::HealthState;
use crate::webhooks::gate::{AdmissionGate, CONTENT_TYPE_TEXT, Decision};

/// Body sent when the request body cannot be read
pub const BODY_READ_FAILURE_MESSAGE: &str = "unable to read the body of the request";

/// A resource kind protected by the webhook and the path it is served on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedResource {
    /// Kind name, used in messages when the review omits it and as a metric label
    pub kind: String,
    /// HTTP path of the endpoint
    pub path: String,
}

impl GuardedResource {
    pub fn new(kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            path: path.into(),
        }
    }

    /// Eclipse Che clusters and Kubernetes image pullers
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("CheCluster", "/validate-users-checlusters"),
            Self::new("KubernetesImagePuller", "/validate-users-k8simagepullers"),
        ]
    }
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub gate: AdmissionGate,
    pub health_state: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(gate: AdmissionGate, health_state: Option<Arc<HealthState>>) -> Self {
        Self { gate, health_state }
    }
}

/// Create the webhook router with one endpoint per guarded resource
pub fn create_webhook_router(state: Arc<WebhookState>, resources: &[GuardedResource]) -> Router {
    resources
        .iter()
        .fold(Router::new(), |router, resource| {
            router.route(
                &resource.path,
                post(validate_resource).layer(Extension(resource.clone())),
            )
        })
        .with_state(state)
}

/// Admission handler shared by every guarded resource.
///
/// Responds 200 whenever a decision was rendered, including denials. Only a
/// body that cannot be read at all yields a 500.
pub async fn validate_resource(
    State(state): State<Arc<WebhookState>>,
    Extension(resource): Extension<GuardedResource>,
    body: Body,
) -> Response {
    // No size limit beyond what the transport enforces
    let bytes = match axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| Error::BodyRead(e.to_string()))
    {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, kind = %resource.kind, "Unable to read the body of the request");
            if let Some(ref health) = state.health_state {
                health.metrics.record_body_read_error(&resource.kind);
            }
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, CONTENT_TYPE_TEXT)],
                BODY_READ_FAILURE_MESSAGE,
            )
                .into_response();
        }
    };

    decision_response(state.gate.decide(&resource, &bytes).await)
}

/// Every rendered decision, including the plain-text fallback, goes out as 200
pub fn decision_response(decision: Decision) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, decision.content_type)],
        decision.body,
    )
        .into_response()
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:`port` and serves one endpoint per guarded resource.
///
/// # Arguments
/// * `state` - Shared handler state
/// * `resources` - Guarded resource kinds and their paths
/// * `port` - Listen port
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    resources: &[GuardedResource],
    port: u16,
    cert_path: &Path,
    key_path: &Path,
) -> Result<()> {
    let health_state = state.health_state.clone();
    let app = create_webhook_router(state, resources);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| Error::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    for resource in resources {
        info!(kind = %resource.kind, path = %resource.path, "Registered admission endpoint");
    }

    let handle = Handle::new();
    if let Some(health) = health_state {
        tokio::spawn(mark_ready_when_listening(handle.clone(), health));
    }

    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| Error::Server(e.to_string()))?;

    Ok(())
}

/// Report ready once the server behind `handle` has bound its listener.
///
/// Stays not-ready if the bind fails.
pub async fn mark_ready_when_listening(handle: Handle, health_state: Arc<HealthState>) {
    match handle.listening().await {
        Some(addr) => {
            info!(%addr, "Webhook server listening with TLS");
            health_state.set_ready(true).await;
        }
        None => warn!("Webhook server stopped before it started listening"),
    }
}
