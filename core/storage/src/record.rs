//! Storage format of the vault credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Singleton row identifier of the credential record.
pub const CREDENTIAL_ID: i64 = 1;

/// The persisted vault credential.
///
/// Binary values are Base64 text so the record can live in any store
/// that holds strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Base64 password verifier.
    pub password_hash: String,
    /// Base64 KDF salt.
    pub salt: String,
    /// KDF work factor used when the verifier was derived.
    pub work_factor: u32,
    /// KDF memory cost in KiB.
    pub memory_cost: u32,
    /// KDF parallelism.
    pub parallelism: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
