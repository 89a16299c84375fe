//! Error types for the mapping-driven API client.
//!
//! # Design
//! Nothing in this crate terminates the process. Startup problems surface as
//! `ConfigError`, per-call problems as `ApiError`, and it is up to the host
//! (the CLI, for instance) to decide that an error is fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Problems detected while loading the mapping document or verifying settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid mappings file path: {}", path.display())]
    MappingNotFound { path: PathBuf },

    #[error("failed to read mappings file: {}", path.display())]
    MappingRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mapping document")]
    MappingParse(#[source] serde_json::Error),

    #[error("operation defined more than once: {name}")]
    DuplicateOperation { name: String },

    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("no operations loaded from the mapping document")]
    EmptyMapping,

    #[error("invalid base or path url settings")]
    InvalidBaseUrl,

    #[error("API access check failed")]
    ConnectivityCheckFailed,
}

/// Network or protocol failure while executing a signed request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors returned by `ApiClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operation name is not present in the mapping table.
    #[error("API call not found: {name}")]
    UnknownOperation { name: String },

    /// A supplied argument matched neither a path placeholder nor a body attribute.
    #[error("did not find argument `{argument}` for operation {operation}")]
    UnboundArgument { operation: String, argument: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to serialize request body")]
    Serialization(#[source] serde_json::Error),
}
