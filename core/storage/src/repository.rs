//! Credential repository trait definition.

use gmvault_common::Result;

use crate::record::CredentialRecord;

/// Store holding at most one [`CredentialRecord`].
///
/// Implementations must make `save` atomic: after a failed save the
/// previously stored record (or its absence) is unchanged.
pub trait CredentialRepository: Send + Sync {
    /// Get the backend name (e.g., "memory", "sqlite", "file").
    fn name(&self) -> &str;

    /// Load the record, if one has been saved.
    ///
    /// # Errors
    /// - Backend access failure
    /// - Stored data cannot be parsed
    fn load(&self) -> Result<Option<CredentialRecord>>;

    /// Insert `record` only if no record exists yet.
    ///
    /// The existence check and the write are one atomic step, so of
    /// several concurrent callers (in this or other processes sharing the
    /// backend) exactly one succeeds.
    ///
    /// # Errors
    /// - `AlreadyInitialized` if a record exists
    fn create(&self, record: &CredentialRecord) -> Result<()>;

    /// Insert or replace the record.
    ///
    /// # Postconditions
    /// - A subsequent `load` returns `record`
    fn save(&self, record: &CredentialRecord) -> Result<()>;

    /// Check whether a record exists.
    fn exists(&self) -> Result<bool> {
        Ok(self.load()?.is_some())
    }
}
