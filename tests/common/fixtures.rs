//! Test fixtures: admission review builders and stub identity directories.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use sandbox_webhook::directory::{DirectoryError, IdentityDirectory, UserRecord};
use sandbox_webhook::webhooks::classifier::{PROVIDER_LABEL_KEY, PROVIDER_LABEL_VALUE};
use sandbox_webhook::webhooks::{AdmissionGate, GuardedResource, SandboxPolicy};
use serde_json::{Value, json};

/// Builder for admission review request bodies.
///
/// # Example
/// ```
/// let body = ReviewBuilder::new("uid-1")
///     .username("alice")
///     .kind("CheCluster")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct ReviewBuilder {
    uid: String,
    username: Option<String>,
    kind: Option<String>,
    api_version: String,
    operation: String,
    namespace: Option<String>,
    object: Value,
}

impl ReviewBuilder {
    /// Create a new builder for a request with the given uid.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            username: None,
            kind: None,
            api_version: "admission.k8s.io/v1".to_string(),
            operation: "CREATE".to_string(),
            namespace: None,
            object: json!({"spec": {}}),
        }
    }

    /// Set the requesting user.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the kind of the object being created.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the review apiVersion.
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Set the namespace of the object being created.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the object payload.
    pub fn object(mut self, object: Value) -> Self {
        self.object = object;
        self
    }

    /// Build the review as JSON.
    pub fn build_json(&self) -> Value {
        let mut request = json!({
            "uid": self.uid,
            "operation": self.operation,
            "object": self.object,
        });
        if let Some(ref username) = self.username {
            request["userInfo"] = json!({"username": username, "groups": ["system:authenticated"]});
        }
        if let Some(ref kind) = self.kind {
            request["kind"] = json!({"group": "org.eclipse.che", "version": "v2", "kind": kind});
        }
        if let Some(ref namespace) = self.namespace {
            request["namespace"] = json!(namespace);
        }
        json!({
            "apiVersion": self.api_version,
            "kind": "AdmissionReview",
            "request": request,
        })
    }

    /// Build the review as a request body.
    pub fn build(&self) -> Vec<u8> {
        serde_json::to_vec(&self.build_json()).unwrap_or_default()
    }
}

/// Directory stub holding a fixed set of users and counting lookups.
#[derive(Default)]
pub struct StubDirectory {
    users: HashMap<String, UserRecord>,
    lookups: Mutex<Vec<String>>,
}

impl StubDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with no labels.
    pub fn with_user(mut self, name: &str) -> Self {
        self.users.insert(name.to_string(), UserRecord::new(name));
        self
    }

    /// Add a user carrying the sandbox provider label.
    pub fn with_sandbox_user(mut self, name: &str) -> Self {
        self.users.insert(
            name.to_string(),
            UserRecord::new(name).with_label(PROVIDER_LABEL_KEY, PROVIDER_LABEL_VALUE),
        );
        self
    }

    /// Add an arbitrary record.
    pub fn with_record(mut self, record: UserRecord) -> Self {
        self.users.insert(record.name.clone(), record);
        self
    }

    /// Names looked up so far, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl IdentityDirectory for StubDirectory {
    async fn get(&self, name: &str) -> Result<UserRecord, DirectoryError> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(name.to_string());
        }
        self.users
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(name.to_string()))
    }
}

/// Directory stub that fails the test if it is ever queried.
pub struct ForbiddenDirectory;

#[async_trait]
impl IdentityDirectory for ForbiddenDirectory {
    async fn get(&self, name: &str) -> Result<UserRecord, DirectoryError> {
        panic!("directory must not be queried, got lookup for {name:?}");
    }
}

/// Directory stub that is always unreachable.
pub struct UnavailableDirectory;

#[async_trait]
impl IdentityDirectory for UnavailableDirectory {
    async fn get(&self, _name: &str) -> Result<UserRecord, DirectoryError> {
        Err(DirectoryError::Timeout(std::time::Duration::from_secs(5)))
    }
}

/// The CheCluster endpoint.
pub fn che_cluster() -> GuardedResource {
    GuardedResource::new("CheCluster", "/validate-users-checlusters")
}

/// The KubernetesImagePuller endpoint.
pub fn image_puller() -> GuardedResource {
    GuardedResource::new("KubernetesImagePuller", "/validate-users-k8simagepullers")
}

/// Build a gate over `directory` with the default policy.
pub fn gate_with(directory: Arc<dyn IdentityDirectory>) -> AdmissionGate {
    AdmissionGate::new(directory, SandboxPolicy::default())
}
