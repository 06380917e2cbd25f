//! In-memory credential repository for testing.

use std::sync::RwLock;

use gmvault_common::{Error, Result};

use crate::record::CredentialRecord;
use crate::repository::CredentialRepository;

/// In-memory credential repository.
///
/// Useful for testing and development. The record is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    record: RwLock<Option<CredentialRecord>>,
}

impl MemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository that already holds a record.
    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }
}

impl CredentialRepository for MemoryRepository {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        let record = self
            .record
            .read()
            .map_err(|_| Error::Storage("Memory repository lock poisoned".to_string()))?;
        Ok(record.clone())
    }

    fn create(&self, record: &CredentialRecord) -> Result<()> {
        let mut slot = self
            .record
            .write()
            .map_err(|_| Error::Storage("Memory repository lock poisoned".to_string()))?;
        if slot.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        *slot = Some(record.clone());
        Ok(())
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let mut slot = self
            .record
            .write()
            .map_err(|_| Error::Storage("Memory repository lock poisoned".to_string()))?;
        *slot = Some(record.clone());
        Ok(())
    }
}
