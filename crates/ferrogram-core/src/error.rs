//! Unified error types for ferrogram.
//!
//! Transport, API, decode and identity failures are kept apart so that each
//! layer can decide whether a failure is logged-and-dropped (update loops) or
//! surfaced to the caller (configuration calls).

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur while moving bytes over the network.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection to the remote endpoint failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Binding a listening socket failed.
    #[error("cannot listen on {addr}: {reason}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// TLS negotiation failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The request was cancelled before completion.
    #[error("request cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors raised while turning a received document into typed records.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The payload is not a valid document.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Field name.
        field: String,
        /// Reason for failure.
        reason: String,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for remote API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The remote API answered with `ok: false`.
    #[error("API error ({code}): {description}")]
    Remote {
        /// `error_code` reported by the remote API.
        code: i64,
        /// `description` reported by the remote API.
        description: String,
    },
    /// The response could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The call was rejected locally before it was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(DecodeError::from(err))
    }
}

// =============================================================================
// Identity Errors
// =============================================================================

/// Errors raised while loading TLS certificates and keys.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The certificate data is empty or cannot be parsed.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// The certificate has no subject common name.
    #[error("certificate has no common name (CN)")]
    MissingCommonName,

    /// The private key data is empty or cannot be parsed.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Certificate or key file could not be read.
    #[error("cannot read {path}: {reason}")]
    Unreadable {
        /// File path.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;
