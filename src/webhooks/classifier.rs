//! Requesting-principal classification.
//!
//! Rules, first match wins:
//! 1. Names with the system prefix are allowed without touching the directory.
//! 2. Users the directory cannot resolve are denied (fail-closed).
//! 3. Users carrying the sandbox provider label are denied.
//! 4. Everyone else is allowed.

use tracing::{error, info};

use crate::directory::{IdentityDirectory, UserRecord};
use crate::error::Error;

/// Prefix shared by all cluster-internal identities
pub const SYSTEM_PRINCIPAL_PREFIX: &str = "system:";
/// Label set on users provisioned by the sandbox tenant provider
pub const PROVIDER_LABEL_KEY: &str = "toolchain.dev.openshift.com/provider";
/// Value of [`PROVIDER_LABEL_KEY`] that marks a restricted tenant
pub const PROVIDER_LABEL_VALUE: &str = "codeready-toolchain";

/// Identity classification rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    system_prefix: String,
    label_key: String,
    label_value: String,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::new(PROVIDER_LABEL_KEY, PROVIDER_LABEL_VALUE)
    }
}

impl SandboxPolicy {
    /// Policy that treats users labeled `label_key=label_value` as restricted
    pub fn new(label_key: impl Into<String>, label_value: impl Into<String>) -> Self {
        Self {
            system_prefix: SYSTEM_PRINCIPAL_PREFIX.to_string(),
            label_key: label_key.into(),
            label_value: label_value.into(),
        }
    }

    pub fn is_system(&self, principal: &str) -> bool {
        principal.starts_with(&self.system_prefix)
    }

    pub fn is_restricted(&self, record: &UserRecord) -> bool {
        record.label(&self.label_key) == Some(self.label_value.as_str())
    }

    pub fn label_key(&self) -> &str {
        &self.label_key
    }

    pub fn label_value(&self) -> &str {
        &self.label_value
    }
}

/// Outcome of classifying one principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// The principal is a restricted tenant
    Deny(String),
    /// The principal could not be verified; treated as a denial
    LookupFailed(String),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    /// Denial message, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Allow => None,
            Verdict::Deny(msg) | Verdict::LookupFailed(msg) => Some(msg),
        }
    }
}

/// Classify `principal`, who is creating a `resource_kind` object.
///
/// Performs at most one directory lookup and never retries.
pub async fn classify(
    principal: &str,
    resource_kind: &str,
    directory: &dyn IdentityDirectory,
    policy: &SandboxPolicy,
) -> Verdict {
    if policy.is_system(principal) {
        return Verdict::Allow;
    }

    let record = match directory.get(principal).await {
        Ok(record) => record,
        Err(e) => {
            let not_found = e.is_not_found();
            error!(
                error = %Error::from(e),
                not_found,
                username = %principal,
                kind = %resource_kind,
                "Unable to find the user requesting creation of the resource"
            );
            return Verdict::LookupFailed(format!(
                "unable to find the user {:?} requesting the creation of the {} resource",
                principal, resource_kind
            ));
        }
    };

    if policy.is_restricted(&record) {
        info!(
            username = %principal,
            kind = %resource_kind,
            "Sandbox user is trying to create a restricted resource"
        );
        return Verdict::Deny(format!(
            "this is a Dev Sandbox enforced restriction. you are trying to create a {} resource, which is not allowed",
            resource_kind
        ));
    }

    Verdict::Allow
}
