//! Repository registry for resolving a credential backend by name.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use gmvault_common::{Error, Result};

use crate::repository::CredentialRepository;

/// Factory function type for creating repositories.
pub type RepositoryFactory =
    Box<dyn Fn(Value) -> Result<Arc<dyn CredentialRepository>> + Send + Sync>;

/// Registry for credential repository factories.
///
/// Lets configuration pick a backend by name, e.g.
/// `resolve("sqlite", json!({"path": "vault.db"}))`, without the caller
/// knowing the concrete types. The JSON config is handed to the factory
/// as is.
pub struct RepositoryRegistry {
    factories: HashMap<String, RepositoryFactory>,
}

impl RepositoryRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a repository factory.
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: RepositoryFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::InvalidInput(format!(
                "Repository '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a repository by name and configuration.
    ///
    /// # Errors
    /// - Repository not registered
    /// - Configuration invalid or backend cannot be opened
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn CredentialRepository>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            Error::InvalidInput(format!("Repository '{}' is not registered", name))
        })?;
        factory(config)
    }

    /// Get list of registered repository names.
    pub fn repositories(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn required_path(config: &Value, backend: &str) -> Result<String> {
    config
        .get("path")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidInput(format!("{} repository requires 'path'", backend)))
}

/// Create a registry with the built-in repositories.
pub fn create_default_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();

    registry.factories.insert(
        "memory".to_string(),
        Box::new(|_config| Ok(Arc::new(crate::memory::MemoryRepository::new()))),
    );

    registry.factories.insert(
        "sqlite".to_string(),
        Box::new(|config| {
            let path = required_path(&config, "sqlite")?;
            Ok(Arc::new(crate::sqlite::SqliteRepository::open(path)?))
        }),
    );

    registry.factories.insert(
        "file".to_string(),
        Box::new(|config| {
            let path = required_path(&config, "file")?;
            Ok(Arc::new(crate::file::FileRepository::new(path)?))
        }),
    );

    registry
}
