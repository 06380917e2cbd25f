//! JSON file credential repository.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use gmvault_common::{Error, Result};

use crate::record::CredentialRecord;
use crate::repository::CredentialRepository;

/// Credential repository storing the record as a JSON document.
///
/// Saves write a sibling temporary file and rename it over the target,
/// so a crash mid-write leaves the previous record intact. Creation links
/// the temporary file into place without replacing an existing target.
pub struct FileRepository {
    path: PathBuf,
}

impl FileRepository {
    /// Create a repository at `path`.
    ///
    /// # Postconditions
    /// - Parent directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self { path })
    }

    /// Location of the JSON document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialRepository for FileRepository {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)?;
        let record = serde_json::from_str(&json)
            .map_err(|e| Error::Serialization(format!("Invalid credential file: {}", e)))?;
        Ok(Some(record))
    }

    fn create(&self, record: &CredentialRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&json)?;
        file.as_file().sync_all()?;

        match file.persist_noclobber(&self.path) {
            Ok(_) => {
                debug!(path = %self.path.display(), "Credential file created");
                Ok(())
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Err(Error::AlreadyInitialized),
            Err(e) => Err(e.error.into()),
        }
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), "Credential file written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_record() -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord {
            password_hash: "aGFzaA==".to_string(),
            salt: "c2FsdA==".to_string(),
            work_factor: 3,
            memory_cost: 65536,
            parallelism: 4,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileRepository::new(temp_dir.path().join("vault.json")).unwrap();

        assert!(repo.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("vault.json");
        let record = sample_record();

        FileRepository::new(&path).unwrap().save(&record).unwrap();

        let reopened = FileRepository::new(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), Some(record));
        assert!(!reopened.temp_path().exists());
    }

    #[test]
    fn test_create_does_not_replace() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vault.json");
        let record = sample_record();

        FileRepository::new(&path).unwrap().create(&record).unwrap();

        let mut other = sample_record();
        other.salt = "b3RoZXI=".to_string();
        let second = FileRepository::new(&path).unwrap();
        assert!(matches!(second.create(&other), Err(Error::AlreadyInitialized)));
        assert_eq!(second.load().unwrap(), Some(record));
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vault.json");
        fs::write(&path, "{ not json").unwrap();

        let repo = FileRepository::new(&path).unwrap();
        assert!(matches!(repo.load(), Err(Error::Serialization(_))));
    }
}
