// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for sandbox-webhook.
//!
//! Uses proptest to generate random principals, labels and bodies and verify
//! the admission invariants hold for all of them.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use proptest::prelude::*;

use common::fixtures::{ForbiddenDirectory, ReviewBuilder, StubDirectory, che_cluster, gate_with};
use sandbox_webhook::directory::UserRecord;
use sandbox_webhook::webhooks::Outcome;
use sandbox_webhook::webhooks::classifier::{PROVIDER_LABEL_KEY, PROVIDER_LABEL_VALUE};
use sandbox_webhook::webhooks::codec::{decode, sanitize};
use sandbox_webhook::webhooks::response::AdmissionReviewResponse;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

/// Strategy for user names that are not system principals.
fn regular_username() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.@-]{0,30}".prop_filter("not a system principal", |s| !s.starts_with("system:"))
}

/// Strategy for system principals.
fn system_username() -> impl Strategy<Value = String> {
    "[a-z0-9:.-]{0,40}".prop_map(|suffix| format!("system:{suffix}"))
}

/// Strategy for correlation identifiers.
fn uid() -> impl Strategy<Value = String> {
    "[a-f0-9-]{1,36}"
}

/// Strategy for resource kinds.
fn kind() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("CheCluster".to_string()),
        Just("KubernetesImagePuller".to_string()),
        "[A-Z][A-Za-z]{1,20}",
    ]
}

fn respond(directory: StubDirectory, body: &[u8]) -> (Outcome, AdmissionReviewResponse) {
    let gate = gate_with(Arc::new(directory));
    let decision = block_on(gate.decide(&che_cluster(), body));
    (decision.outcome, serde_json::from_slice(&decision.body).unwrap())
}

proptest! {
    /// Property: system principals are allowed and never looked up.
    #[test]
    fn prop_system_principal_allowed(user in system_username(), uid in uid(), kind in kind()) {
        let gate = gate_with(Arc::new(ForbiddenDirectory));
        let body = ReviewBuilder::new(uid.clone()).username(user).kind(kind).build();
        let review: AdmissionReviewResponse =
            serde_json::from_slice(&block_on(gate.validate(&che_cluster(), &body))).unwrap();
        prop_assert!(review.response.allowed);
        prop_assert_eq!(review.response.uid, uid);
    }

    /// Property: users carrying the sandbox marker are denied, and the message names the kind.
    #[test]
    fn prop_sandbox_user_denied(user in regular_username(), uid in uid(), kind in kind()) {
        let directory = StubDirectory::new().with_sandbox_user(&user);
        let body = ReviewBuilder::new(uid.clone()).username(user).kind(kind.clone()).build();
        let (outcome, review) = respond(directory, &body);
        prop_assert_eq!(outcome, Outcome::Denied);
        prop_assert!(!review.response.allowed);
        prop_assert_eq!(&review.response.uid, &uid);
        prop_assert!(review.response.message().unwrap().contains(&kind));
    }

    /// Property: users without the marker (or with a different value) are allowed.
    #[test]
    fn prop_unmarked_user_allowed(
        user in regular_username(),
        uid in uid(),
        value in "[a-z-]{0,20}".prop_filter("not the marker", |v| v != PROVIDER_LABEL_VALUE),
        labeled in any::<bool>(),
    ) {
        let record = if labeled {
            UserRecord::new(user.clone()).with_label(PROVIDER_LABEL_KEY, value)
        } else {
            UserRecord::new(user.clone())
        };
        let body = ReviewBuilder::new(uid.clone()).username(user).kind("CheCluster").build();
        let (outcome, review) = respond(StubDirectory::new().with_record(record), &body);
        prop_assert_eq!(outcome, Outcome::Allowed);
        prop_assert!(review.response.allowed);
        prop_assert_eq!(review.response.uid, uid);
    }

    /// Property: lookup failures are never allowed.
    #[test]
    fn prop_unknown_user_denied(user in regular_username(), uid in uid()) {
        let body = ReviewBuilder::new(uid.clone()).username(user).kind("CheCluster").build();
        let (outcome, review) = respond(StubDirectory::new(), &body);
        prop_assert_eq!(outcome, Outcome::LookupFailed);
        prop_assert!(!review.response.allowed);
        prop_assert_eq!(review.response.uid, uid);
    }

    /// Property: arbitrary bytes never panic; undecodable bodies are denied with a message.
    #[test]
    fn prop_arbitrary_body_never_allowed_unless_decodable(body in proptest::collection::vec(any::<u8>(), 0..512)) {
        let gate = gate_with(Arc::new(StubDirectory::new()));
        let decision = block_on(gate.decide(&che_cluster(), &body));
        if decode(&body).is_err() {
            prop_assert_eq!(decision.outcome, Outcome::Invalid);
            let review: AdmissionReviewResponse = serde_json::from_slice(&decision.body).unwrap();
            prop_assert!(!review.response.allowed);
            prop_assert!(!review.response.message().unwrap_or_default().is_empty());
        }
    }

    /// Property: sanitized output never contains raw markup characters.
    #[test]
    fn prop_sanitize_removes_markup(raw in ".{0,200}") {
        let escaped = sanitize(raw.as_bytes());
        prop_assert!(!escaped.contains('<'));
        prop_assert!(!escaped.contains('>'));
        prop_assert!(!escaped.contains('"'));
        prop_assert!(!escaped.contains('\''));
    }
}
