//! Identity directory lookups.
//!
//! The decision core only needs one thing from the directory: the labels on
//! the user record that matches a principal name exactly. [`IdentityDirectory`]
//! is that seam; [`KubeUserDirectory`] backs it with OpenShift `User` objects.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use kube::{Api, Client};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use thiserror::Error;
use tracing::debug;

/// API group of the user records
pub const USER_GROUP: &str = "user.openshift.io";
/// API version of the user records
pub const USER_VERSION: &str = "v1";
/// Kind of the user records
pub const USER_KIND: &str = "User";
/// Plural resource name of the user records
pub const USER_PLURAL: &str = "users";

/// Errors returned by directory lookups
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// No record exists for the name
    #[error("user {0:?} not found")]
    NotFound(String),

    /// The lookup did not complete in time
    #[error("user lookup timed out after {0:?}")]
    Timeout(Duration),

    /// Any other API, transport or decoding failure
    #[error("user lookup failed: {0}")]
    Api(#[from] kube::Error),
}

impl DirectoryError {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            DirectoryError::NotFound(_) => true,
            DirectoryError::Api(kube::Error::Api(e)) => e.code == 404,
            _ => false,
        }
    }
}

/// The parts of a user record the classifier looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl UserRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Value of label `key`, if set
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

impl From<DynamicObject> for UserRecord {
    fn from(obj: DynamicObject) -> Self {
        Self {
            name: obj.metadata.name.unwrap_or_default(),
            labels: obj.metadata.labels.unwrap_or_default(),
        }
    }
}

/// Exact-name lookup of user records.
///
/// Implementations are shared by all in-flight admission requests and must be
/// safe for concurrent use. Any bounded-time or retry behavior belongs here,
/// not in the caller.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get(&self, name: &str) -> Result<UserRecord, DirectoryError>;
}

/// Directory backed by cluster-scoped `user.openshift.io/v1` `User` objects
#[derive(Clone)]
pub struct KubeUserDirectory {
    api: Api<DynamicObject>,
    timeout: Duration,
}

impl KubeUserDirectory {
    pub fn new(client: Client, timeout: Duration) -> Self {
        let gvk = GroupVersionKind::gvk(USER_GROUP, USER_VERSION, USER_KIND);
        let resource = ApiResource::from_gvk_with_plural(&gvk, USER_PLURAL);
        Self {
            api: Api::all_with(client, &resource),
            timeout,
        }
    }
}

#[async_trait]
impl IdentityDirectory for KubeUserDirectory {
    async fn get(&self, name: &str) -> Result<UserRecord, DirectoryError> {
        // An empty name would address the collection rather than an object
        if name.is_empty() {
            return Err(DirectoryError::NotFound(String::new()));
        }

        debug!(username = %name, "Looking up user");
        match tokio::time::timeout(self.timeout, self.api.get(name)).await {
            Ok(Ok(obj)) => Ok(UserRecord::from(obj)),
            Ok(Err(kube::Error::Api(e))) if e.code == 404 => {
                Err(DirectoryError::NotFound(name.to_string()))
            }
            Ok(Err(e)) => Err(DirectoryError::Api(e)),
            Err(_) => Err(DirectoryError::Timeout(self.timeout)),
        }
    }
}
