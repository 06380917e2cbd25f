//! Key derivation using Argon2id.
//!
//! One password and one salt feed two derivations: a 64-byte verifier
//! that is stored and used to check the password, and a 32-byte key that
//! exists only for the duration of a request. Argon2 binds the requested
//! output length into its initial hash, so neither output can be computed
//! from the other.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::keys::{PasswordVerifier, RequestKey, Salt, KEY_LENGTH, VERIFIER_LENGTH};
use gmvault_common::{Error, Password, Result};

/// Parameters for Argon2id key derivation.
///
/// Stored next to the salt in the vault credential so that a credential
/// created under older defaults still verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Number of passes over memory (the work factor).
    pub work_factor: u32,
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    pub fn new(work_factor: u32, memory_cost: u32, parallelism: u32) -> Self {
        Self {
            work_factor,
            memory_cost,
            parallelism,
        }
    }

    /// Create parameters suitable for interactive use.
    ///
    /// These parameters provide a balance between security and usability,
    /// targeting approximately 0.5-1 second of derivation time.
    pub fn interactive() -> Self {
        Self {
            work_factor: 3,
            memory_cost: 65536, // 64 MiB
            parallelism: 4,
        }
    }

    /// Create parameters suitable for sensitive data.
    ///
    /// Higher security parameters that may take several seconds.
    pub fn sensitive() -> Self {
        Self {
            work_factor: 4,
            memory_cost: 262144, // 256 MiB
            parallelism: 4,
        }
    }

    /// Create moderate parameters for low-memory devices.
    pub fn moderate() -> Self {
        Self {
            work_factor: 3,
            memory_cost: 32768, // 32 MiB
            parallelism: 2,
        }
    }

    /// Check the parameters without running a derivation.
    ///
    /// # Errors
    /// - `InvalidInput` if any parameter is zero or out of Argon2's range
    pub fn validate(&self) -> Result<()> {
        if self.work_factor == 0 {
            return Err(Error::InvalidInput(
                "Work factor must be positive".to_string(),
            ));
        }
        self.argon2_params(KEY_LENGTH).map(|_| ())
    }

    fn argon2_params(&self, output_len: usize) -> Result<Params> {
        Params::new(
            self.memory_cost,
            self.work_factor,
            self.parallelism,
            Some(output_len),
        )
        .map_err(|e| Error::InvalidInput(format!("Invalid KDF parameters: {}", e)))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

fn derive_into(password: &Password, salt: &Salt, params: &KdfParams, out: &mut [u8]) -> Result<()> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }
    if params.work_factor == 0 {
        return Err(Error::InvalidInput(
            "Work factor must be positive".to_string(),
        ));
    }

    let argon2 = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        params.argon2_params(out.len())?,
    );

    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), out)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))
}

/// Derive the stored password verifier.
///
/// # Preconditions
/// - `password` must not be empty
/// - `params` must have valid Argon2id parameters
///
/// # Postconditions
/// - The verifier is deterministic given the same inputs
///
/// # Errors
/// - `InvalidInput` if the password is empty or the parameters are invalid
pub fn derive_verifier(
    password: &Password,
    salt: &Salt,
    params: &KdfParams,
) -> Result<PasswordVerifier> {
    let mut hash = [0u8; VERIFIER_LENGTH];
    derive_into(password, salt, params, &mut hash)?;
    let verifier = PasswordVerifier::from_bytes(hash);
    hash.zeroize();
    Ok(verifier)
}

/// Derive the request-scoped encryption key.
///
/// Uses the same salt as the verifier with a different output length.
///
/// # Errors
/// - `InvalidInput` if the password is empty or the parameters are invalid
///
/// # Security
/// - The caller owns the key; it is zeroized when dropped
pub fn derive_key(password: &Password, salt: &Salt, params: &KdfParams) -> Result<RequestKey> {
    let mut key_bytes = [0u8; KEY_LENGTH];
    derive_into(password, salt, params, &mut key_bytes)?;
    let key = RequestKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Verify that a password produces the expected verifier.
///
/// This performs constant-time comparison to prevent timing attacks.
pub fn verify_password(
    password: &Password,
    salt: &Salt,
    params: &KdfParams,
    expected: &PasswordVerifier,
) -> Result<bool> {
    let derived = derive_verifier(password, salt, params)?;
    Ok(derived.ct_eq(expected))
}
