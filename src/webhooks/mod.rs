//! Validating admission webhook for sandbox-restricted resource kinds.
//!
//! Request pipeline, one pass per request:
//! - [`codec`]: decode the admission review, escape untrusted input
//! - [`classifier`]: system / restricted-tenant / standard principal
//! - [`response`]: allow or deny review carrying the request's uid
//! - [`gate`]: composes the three
//! - [`server`]: one HTTP endpoint per guarded resource kind

pub mod classifier;
pub mod codec;
pub mod gate;
pub mod response;
pub mod server;

pub use classifier::{SandboxPolicy, Verdict, classify};
pub use gate::{AdmissionGate, Decision, Outcome};
pub use server::{
    GuardedResource, WebhookState, create_webhook_router, run_webhook_server, validate_resource,
};
