//! Decision core shared by all guarded resource endpoints.
//!
//! decode -> classify -> build response -> render. Holds no per-request state;
//! the directory handle is the only thing shared between concurrent decisions.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::directory::IdentityDirectory;
use crate::error::{Error, Result};
use crate::health::HealthState;
use crate::webhooks::classifier::{SandboxPolicy, Verdict, classify};
use crate::webhooks::codec::{self, ReviewTypes};
use crate::webhooks::response::{
    AdmissionReviewResponse, MARSHAL_FAILURE_MESSAGE, build_allow, build_deny, render,
};
use crate::webhooks::server::GuardedResource;

/// Content type of a rendered admission review
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Content type of the serialization fallback body
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// How a request was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    /// Restricted tenant
    Denied,
    /// User could not be resolved
    LookupFailed,
    /// Body was not a decodable admission review
    Invalid,
}

impl Outcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied => "denied",
            Outcome::LookupFailed => "lookup_failed",
            Outcome::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered admission decision, ready to be written to the transport
#[derive(Debug, Clone)]
pub struct Decision {
    pub outcome: Outcome,
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// Admission decision core
pub struct AdmissionGate {
    directory: Arc<dyn IdentityDirectory>,
    policy: SandboxPolicy,
    health_state: Option<Arc<HealthState>>,
}

impl AdmissionGate {
    pub fn new(directory: Arc<dyn IdentityDirectory>, policy: SandboxPolicy) -> Self {
        Self {
            directory,
            policy,
            health_state: None,
        }
    }

    /// Record decision metrics into `health_state`
    pub fn with_health_state(mut self, health_state: Arc<HealthState>) -> Self {
        self.health_state = Some(health_state);
        self
    }

    /// Decide on a raw admission review body and return the response bytes.
    pub async fn validate(&self, resource: &GuardedResource, body: &[u8]) -> Vec<u8> {
        self.decide(resource, body).await.body
    }

    /// Decide on a raw admission review body.
    ///
    /// Never fails: every error path ends in a rendered (possibly degraded)
    /// response.
    pub async fn decide(&self, resource: &GuardedResource, body: &[u8]) -> Decision {
        let started = Instant::now();
        let (outcome, review) = self.review(resource, body).await;
        let decision = into_decision(outcome, &review.response.uid, render(&review));

        if let Some(ref state) = self.health_state {
            state.metrics.record_decision(
                &resource.kind,
                outcome.as_str(),
                started.elapsed().as_secs_f64(),
            );
        }
        decision
    }

    async fn review(
        &self,
        resource: &GuardedResource,
        body: &[u8],
    ) -> (Outcome, AdmissionReviewResponse) {
        let review = match codec::decode(body) {
            Ok(review) => review,
            Err(e) => {
                let escaped = codec::sanitize(body);
                let message = format!(
                    "unable to deserialize the admission review object - body: {}: {}",
                    escaped, e
                );
                error!(
                    error = %Error::from(e),
                    kind = %resource.kind,
                    body = %escaped,
                    "Unable to deserialize the admission review object"
                );
                return (
                    Outcome::Invalid,
                    build_deny(&ReviewTypes::default(), "", message),
                );
            }
        };

        let request = &review.request;
        let kind = if request.kind.kind.is_empty() {
            resource.kind.as_str()
        } else {
            request.kind.kind.as_str()
        };
        let username = request.username();
        debug!(
            uid = %request.uid,
            kind = %kind,
            username = %username,
            operation = ?request.operation,
            namespace = ?request.namespace,
            "Processing admission request"
        );

        let verdict = classify(username, kind, self.directory.as_ref(), &self.policy).await;
        match verdict {
            Verdict::Allow => {
                info!(uid = %request.uid, kind = %kind, username = %username, "Admission request allowed");
                (Outcome::Allowed, build_allow(&review.types, &request.uid))
            }
            Verdict::Deny(message) => {
                warn!(uid = %request.uid, kind = %kind, username = %username, "Admission request denied");
                (
                    Outcome::Denied,
                    build_deny(&review.types, &request.uid, message),
                )
            }
            Verdict::LookupFailed(message) => {
                warn!(
                    uid = %request.uid,
                    kind = %kind,
                    username = %username,
                    "Admission request denied, user could not be verified"
                );
                (
                    Outcome::LookupFailed,
                    build_deny(&review.types, &request.uid, message),
                )
            }
        }
    }
}

/// Pair a rendered review with its outcome, falling back to a plain-text
/// body when rendering failed.
pub fn into_decision(outcome: Outcome, uid: &str, rendered: Result<Vec<u8>>) -> Decision {
    match rendered {
        Ok(body) => Decision {
            outcome,
            body,
            content_type: CONTENT_TYPE_JSON,
        },
        Err(e) => {
            error!(
                error = %e,
                uid = %uid,
                "Unable to marshal the admission review with response"
            );
            Decision {
                outcome,
                body: MARSHAL_FAILURE_MESSAGE.as_bytes().to_vec(),
                content_type: CONTENT_TYPE_TEXT,
            }
        }
    }
}
