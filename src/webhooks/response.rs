//! Admission review response construction.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::webhooks::codec::ReviewTypes;

/// Body sent when a response cannot be serialized
pub const MARSHAL_FAILURE_MESSAGE: &str = "unable to marshal the admission review with response";

/// Result details attached to a denial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub message: String,
}

/// The `response` part of an admission review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResponseEnvelope {
    /// Correlation identifier copied from the request
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
}

impl AdmissionResponseEnvelope {
    /// Denial message, if any
    pub fn message(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.message.as_str())
    }
}

/// A complete admission review carrying a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponseEnvelope,
}

/// Build a review that admits the request identified by `uid`.
pub fn build_allow(types: &ReviewTypes, uid: &str) -> AdmissionReviewResponse {
    AdmissionReviewResponse {
        api_version: types.api_version.clone(),
        kind: types.kind.clone(),
        response: AdmissionResponseEnvelope {
            uid: uid.to_string(),
            allowed: true,
            status: None,
        },
    }
}

/// Build a review that rejects the request identified by `uid`.
pub fn build_deny(
    types: &ReviewTypes,
    uid: &str,
    message: impl Into<String>,
) -> AdmissionReviewResponse {
    AdmissionReviewResponse {
        api_version: types.api_version.clone(),
        kind: types.kind.clone(),
        response: AdmissionResponseEnvelope {
            uid: uid.to_string(),
            allowed: false,
            status: Some(ResponseStatus {
                message: message.into(),
            }),
        },
    }
}

/// Serialize a review to its wire form.
pub fn render(review: &AdmissionReviewResponse) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(review)?)
}
