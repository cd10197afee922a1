//! Admission review decoding.
//!
//! Only the fields the decision core needs are modeled. Everything else in the
//! review (the object payload, old object, options) is carried opaquely or
//! ignored, and unknown fields never cause a decode failure.

use k8s_openapi::api::authentication::v1::UserInfo;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Admission review API version used when the request does not state one
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
/// Admission review kind used when the request does not state one
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Errors produced while decoding an admission review
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The body is not a JSON admission review
    #[error("{0}")]
    Malformed(#[from] serde_json::Error),

    /// The body is a review but carries no request
    #[error("admission review has no request")]
    MissingRequest,
}

/// `apiVersion`/`kind` of the review, echoed back in the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewTypes {
    pub api_version: String,
    pub kind: String,
}

impl Default for ReviewTypes {
    fn default() -> Self {
        Self {
            api_version: ADMISSION_API_VERSION.to_string(),
            kind: ADMISSION_REVIEW_KIND.to_string(),
        }
    }
}

/// Group/version/kind of the object being admitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestKind {
    #[serde(default, deserialize_with = "null_as_default")]
    pub group: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kind: String,
}

/// The `request` part of an admission review
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequestEnvelope {
    /// Correlation identifier, echoed back unchanged
    pub uid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kind: RequestKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_info: UserInfo,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Resource payload, never inspected
    #[serde(default)]
    pub object: Option<serde_json::Value>,
}

impl AdmissionRequestEnvelope {
    /// Name of the requesting principal (empty if the review omits it)
    pub fn username(&self) -> &str {
        self.user_info.username.as_deref().unwrap_or_default()
    }
}

/// Explicit `null` decodes the same as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A decoded admission review
#[derive(Debug, Clone)]
pub struct AdmissionReviewRequest {
    pub types: ReviewTypes,
    pub request: AdmissionRequestEnvelope,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReview {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    request: Option<AdmissionRequestEnvelope>,
}

/// Decode a raw request body into an admission review.
///
/// The body is untrusted. Callers must pass it through [`sanitize`] before it
/// goes anywhere near a log line or response message.
pub fn decode(body: &[u8]) -> Result<AdmissionReviewRequest, DecodeError> {
    let wire: WireReview = serde_json::from_slice(body)?;
    let request = wire.request.ok_or(DecodeError::MissingRequest)?;
    let defaults = ReviewTypes::default();
    Ok(AdmissionReviewRequest {
        types: ReviewTypes {
            api_version: wire.api_version.unwrap_or(defaults.api_version),
            kind: wire.kind.unwrap_or(defaults.kind),
        },
        request,
    })
}

/// Escape markup-significant characters in an untrusted body.
///
/// Invalid UTF-8 is replaced rather than rejected so that the escaped copy is
/// always loggable.
pub fn sanitize(body: &[u8]) -> String {
    let raw = String::from_utf8_lossy(body);
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
