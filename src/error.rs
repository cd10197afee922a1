//! Error types for the webhook.
//!
//! Decode and lookup failures are turned into denials by the decision core;
//! they are wrapped here only so they are logged the same way as the rest.

use thiserror::Error;

use crate::config::ConfigError;
use crate::directory::DirectoryError;
use crate::webhooks::codec::DecodeError;

/// Error type for webhook operations
#[derive(Error, Debug)]
pub enum Error {
    /// The request body is not a decodable admission review
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The requesting user could not be resolved
    #[error("Lookup error: {0}")]
    Lookup(#[from] DirectoryError),

    /// The admission review response could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request body could not be read from the transport
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Kubernetes client error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Result type alias for webhook operations
pub type Result<T> = std::result::Result<T, Error>;
