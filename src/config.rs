//! Webhook configuration.
//!
//! Everything is read from environment variables set on the webhook
//! Deployment, each with a default suitable for an in-cluster install.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::webhooks::classifier::{PROVIDER_LABEL_KEY, PROVIDER_LABEL_VALUE, SandboxPolicy};
use crate::webhooks::server::GuardedResource;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;
/// Default upper bound on a single identity directory lookup
pub const DIRECTORY_LOOKUP_TIMEOUT_SECS: u64 = 5;

/// Errors produced while reading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Runtime configuration for the webhook process
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Port the TLS admission endpoint listens on
    pub webhook_port: u16,
    /// Port for probes and metrics
    pub health_port: u16,
    /// PEM certificate for the admission endpoint
    pub cert_path: PathBuf,
    /// PEM private key for the admission endpoint
    pub key_path: PathBuf,
    /// Timeout applied to each user lookup
    pub lookup_timeout: Duration,
    /// Identity classification rule
    pub policy: SandboxPolicy,
    /// Resource kinds guarded by this webhook, one endpoint each
    pub resources: Vec<GuardedResource>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            lookup_timeout: Duration::from_secs(DIRECTORY_LOOKUP_TIMEOUT_SECS),
            policy: SandboxPolicy::default(),
            resources: GuardedResource::defaults(),
        }
    }
}

impl WebhookConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` to resolve variable names.
    ///
    /// Unset variables fall back to their defaults; set but unparseable
    /// variables are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let webhook_port = parse_or(&lookup, "WEBHOOK_PORT", defaults.webhook_port)?;
        let health_port = parse_or(&lookup, "HEALTH_PORT", defaults.health_port)?;
        let cert_path = lookup("WEBHOOK_CERT_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.cert_path);
        let key_path = lookup("WEBHOOK_KEY_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.key_path);

        let timeout_secs = parse_or(
            &lookup,
            "DIRECTORY_LOOKUP_TIMEOUT_SECS",
            DIRECTORY_LOOKUP_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DIRECTORY_LOOKUP_TIMEOUT_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let policy = SandboxPolicy::new(
            lookup("SANDBOX_LABEL_KEY").unwrap_or_else(|| PROVIDER_LABEL_KEY.to_string()),
            lookup("SANDBOX_LABEL_VALUE").unwrap_or_else(|| PROVIDER_LABEL_VALUE.to_string()),
        );

        Ok(Self {
            webhook_port,
            health_port,
            cert_path,
            key_path,
            lookup_timeout: Duration::from_secs(timeout_secs),
            policy,
            resources: defaults.resources,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
        reason: e.to_string(),
    })
}
