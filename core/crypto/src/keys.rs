//! Key types with secure memory handling.
//!
//! Secret types zeroize their memory on drop and redact themselves in
//! `Debug` output so they cannot end up in logs by accident.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use gmvault_common::{Error, Result};

/// Length of encryption keys in bytes (AES-256).
pub const KEY_LENGTH: usize = 32;

/// Length of the stored password verifier in bytes.
///
/// Deliberately different from [`KEY_LENGTH`]: Argon2 mixes the output
/// length into its initial hash, so the verifier and the key are
/// independent outputs of the same password and salt.
pub const VERIFIER_LENGTH: usize = 64;

/// Length of the KDF salt in bytes.
pub const SALT_LENGTH: usize = 16;

/// Symmetric key derived from the master password for one request.
///
/// Not `Clone`: the key has a single owner and is zeroized when that
/// owner drops it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RequestKey {
    key: [u8; KEY_LENGTH],
}

impl RequestKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a key from a slice.
    ///
    /// # Errors
    /// - `InvalidKeyLength` if the slice is not exactly KEY_LENGTH bytes
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LENGTH] = key.try_into().map_err(|_| Error::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: key.len(),
        })?;
        Ok(Self { key })
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestKey([REDACTED])")
    }
}

/// Password verifier stored in the vault credential.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PasswordVerifier {
    hash: [u8; VERIFIER_LENGTH],
}

impl PasswordVerifier {
    pub fn from_bytes(hash: [u8; VERIFIER_LENGTH]) -> Self {
        Self { hash }
    }

    /// Rebuild a verifier loaded from storage.
    ///
    /// # Errors
    /// - `InvalidInput` if the slice is not exactly VERIFIER_LENGTH bytes
    pub fn from_slice(hash: &[u8]) -> Result<Self> {
        let hash: [u8; VERIFIER_LENGTH] = hash.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Verifier must be {} bytes, got {}",
                VERIFIER_LENGTH,
                hash.len()
            ))
        })?;
        Ok(Self { hash })
    }

    pub fn as_bytes(&self) -> &[u8; VERIFIER_LENGTH] {
        &self.hash
    }

    /// Constant-time equality.
    pub fn ct_eq(&self, other: &PasswordVerifier) -> bool {
        self.hash[..].ct_eq(&other.hash[..]).into()
    }
}

impl fmt::Debug for PasswordVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasswordVerifier([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|_| Error::Crypto("Random number generator failure".to_string()))?;
        Ok(Self(salt))
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create from a slice of unknown length.
    ///
    /// # Errors
    /// - `InvalidInput` if the slice is not exactly SALT_LENGTH bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let salt: [u8; SALT_LENGTH] = bytes.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Salt must be {} bytes, got {}",
                SALT_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(salt))
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}
