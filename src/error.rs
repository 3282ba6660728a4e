// src/error.rs

use thiserror::Error;

/// Core error types for nfvpkg
///
/// Every failure in the upload/register/delete paths is terminal for the
/// invocation: nothing is retried and nothing is locally recovered. The one
/// deliberate exception is a malformed inventory listing, which never reaches
/// this enum at all (it degrades to an empty index in `inventory`).
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete invocation parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// SSH password authentication rejected by the host
    #[error("Authentication failed, please verify your credentials")]
    Authentication,

    /// TCP or SSH transport/protocol failure
    #[error("Unable to establish SSH connection: {0}")]
    Connection(String),

    /// Host key missing, changed, or rejected by policy
    #[error("Unable to verify server host key: {0}")]
    HostKey(String),

    /// Failure while copying the artifact over the established session
    #[error("Operation error: {0}")]
    Transfer(String),

    /// Management API returned 404 for the addressed resource
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Management API rejected the request credentials
    #[error("Management API authentication rejected")]
    Unauthorized,

    /// Management API returned a non-2xx response
    #[error("Management API request failed: HTTP {status}: {body}")]
    RemoteFailure { status: u16, body: String },

    /// Failure constructing or driving the HTTP client
    #[error("Request error: {0}")]
    Request(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using nfvpkg's Error type
pub type Result<T> = std::result::Result<T, Error>;
