use std::time::Duration;

use thiserror::Error;

/// Failures of service-manager and lifecycle operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service {name} already exists")]
    AlreadyExists { name: String },

    #[error("service {name} is not installed")]
    NotInstalled { name: String },

    #[error("could not access service {name}: {reason}")]
    Access { name: String, reason: String },

    #[error("registration of service {name} failed: {reason}")]
    Registration { name: String, reason: String },

    #[error("could not start service {name}: {reason}")]
    Start { name: String, reason: String },

    #[error("could not query service {name}: {reason}")]
    Query { name: String, reason: String },

    #[error("could not send control={command} to service {name}: {reason}")]
    Control {
        name: String,
        command: String,
        reason: String,
    },

    #[error("timed out after {waited:?} waiting for service {name} to reach {target}")]
    Timeout {
        name: String,
        target: String,
        waited: Duration,
    },

    #[error(transparent)]
    ConfigMissing(#[from] ConfigError),

    #[error("could not spawn payload {path}: {reason}")]
    Spawn { path: String, reason: String },

    #[error("payload {path} failed: {reason}")]
    Run { path: String, reason: String },
}

/// Failures reading or writing the configuration store.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find key {namespace}")]
    NamespaceMissing { namespace: String },

    #[error("could not find value {value} in {namespace}")]
    ValueMissing { namespace: String, value: String },

    #[error("configuration store {namespace} not accessible: {reason}")]
    Access { namespace: String, reason: String },
}
