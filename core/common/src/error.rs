//! Error types for the gmvault core.
//!
//! Variants are fine grained so that internal callers and logs can tell
//! failures apart. Anything that leaves the process should go through
//! [`Error::public`], which collapses the authentication related kinds
//! into a single [`PublicError::Unauthenticated`].

use serde::Serialize;
use thiserror::Error;

/// Top-level error type for gmvault operations.
///
/// Messages never carry key bytes, passwords or plaintext.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed arguments (caller bug).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Key does not have the size the cipher requires.
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Password rejected by the length policy.
    #[error("Password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    /// The vault credential has already been created.
    #[error("Vault already initialized")]
    AlreadyInitialized,

    /// No vault credential exists yet.
    #[error("Vault not initialized")]
    NotInitialized,

    /// Password does not match the stored verifier.
    #[error("Invalid credential")]
    InvalidCredential,

    /// Ciphertext blob could not be parsed into an envelope.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Authentication tag did not verify.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Session token is correctly signed but past its expiry.
    #[error("Session token expired")]
    Expired,

    /// Session token signature did not verify.
    #[error("Session token signature invalid")]
    BadSignature,

    /// Session token could not be parsed.
    #[error("Malformed session token: {0}")]
    MalformedToken(String),

    /// Cryptographic primitive failed (RNG, parameters).
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Vault state error.
    #[error("Vault error: {0}")]
    Vault(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable, payload-free name of the error kind, suitable for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::InvalidKeyLength { .. } => "invalid_key_length",
            Error::WeakPassword { .. } => "weak_password",
            Error::AlreadyInitialized => "already_initialized",
            Error::NotInitialized => "not_initialized",
            Error::InvalidCredential => "invalid_credential",
            Error::MalformedEnvelope(_) => "malformed_envelope",
            Error::AuthenticationFailed => "authentication_failed",
            Error::Expired => "expired",
            Error::BadSignature => "bad_signature",
            Error::MalformedToken(_) => "malformed_token",
            Error::Crypto(_) => "crypto",
            Error::Vault(_) => "vault",
            Error::Storage(_) => "storage",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }

    /// Whether repeating the same call could succeed.
    ///
    /// Integrity and credential failures are deterministic for a given
    /// input and are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_))
    }

    /// True for session token failures.
    pub fn is_session_failure(&self) -> bool {
        matches!(
            self,
            Error::Expired | Error::BadSignature | Error::MalformedToken(_)
        )
    }

    /// Map to the error reported across an external boundary.
    pub fn public(&self) -> PublicError {
        match self {
            Error::NotInitialized
            | Error::InvalidCredential
            | Error::Expired
            | Error::BadSignature
            | Error::MalformedToken(_) => PublicError::Unauthenticated,
            Error::AlreadyInitialized => PublicError::AlreadyInitialized,
            Error::WeakPassword { min_length } => PublicError::WeakPassword {
                min_length: *min_length,
            },
            Error::InvalidInput(_) | Error::InvalidKeyLength { .. } => PublicError::InvalidRequest,
            Error::MalformedEnvelope(_) | Error::AuthenticationFailed => {
                PublicError::DataIntegrity
            }
            Error::Crypto(_)
            | Error::Vault(_)
            | Error::Storage(_)
            | Error::Io(_)
            | Error::Serialization(_) => PublicError::Internal,
        }
    }
}

/// Error as seen by an unauthenticated or external caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum PublicError {
    #[error("Authentication failed")]
    Unauthenticated,

    #[error("Vault already exists")]
    AlreadyInitialized,

    #[error("Password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    #[error("Invalid request")]
    InvalidRequest,

    #[error("Stored data could not be decrypted")]
    DataIntegrity,

    #[error("Internal error")]
    Internal,
}
