//! Vault manager: the entry point for callers of the vault core.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::VaultSettings;
use crate::session::{SessionClaims, SessionToken, TokenService, SUBJECT};
use crate::store::CredentialStore;
use gmvault_common::{Clock, Error, Password, Result, SystemClock};
use gmvault_crypto::RequestKey;
use gmvault_storage::{create_default_registry, CredentialRepository, RepositoryRegistry};

/// Registration, login, token checks and key derivation over one vault.
///
/// Holds no key between calls. Every operation that needs the key takes
/// the master password and returns a fresh [`RequestKey`].
pub struct VaultManager {
    settings: VaultSettings,
    store: CredentialStore,
    tokens: TokenService,
}

impl VaultManager {
    /// Create a manager over `repository` with the system clock.
    ///
    /// # Errors
    /// - `InvalidInput` if `settings` do not validate
    pub fn new(settings: VaultSettings, repository: Arc<dyn CredentialRepository>) -> Result<Self> {
        Self::with_clock(settings, repository, Arc::new(SystemClock))
    }

    /// Create a manager with an explicit clock.
    pub fn with_clock(
        settings: VaultSettings,
        repository: Arc<dyn CredentialRepository>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        settings.validate()?;

        let store = CredentialStore::new(repository, clock.clone(), settings.kdf.clone());
        let tokens =
            TokenService::new(settings.signing_secret()?, settings.token_lifetime(), clock)?;

        Ok(Self {
            settings,
            store,
            tokens,
        })
    }

    /// Create a manager over a backend resolved from the default registry.
    ///
    /// `config` is backend specific, e.g. `{"path": "vault.db"}` for sqlite.
    pub fn open(settings: VaultSettings, backend: &str, config: Value) -> Result<Self> {
        Self::open_with_registry(settings, &create_default_registry(), backend, config)
    }

    /// Like [`open`](Self::open), with a caller supplied registry.
    pub fn open_with_registry(
        settings: VaultSettings,
        registry: &RepositoryRegistry,
        backend: &str,
        config: Value,
    ) -> Result<Self> {
        let repository = registry.resolve(backend, config)?;
        Self::new(settings, repository)
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn is_initialized(&self) -> Result<bool> {
        self.store.is_initialized()
    }

    /// Create the vault with its master password.
    ///
    /// # Errors
    /// - `AlreadyInitialized`, `WeakPassword`
    pub fn register(&self, password: &Password) -> Result<()> {
        self.store.initialize(password, &self.settings.password_policy())
    }

    /// Verify the master password and issue a session token.
    ///
    /// # Errors
    /// - `NotInitialized`, `InvalidCredential`
    pub fn login(&self, password: &Password) -> Result<SessionToken> {
        if let Err(e) = self.store.verify(password) {
            warn!(kind = e.kind(), "Login failed");
            return Err(e);
        }

        let token = self.tokens.issue(SUBJECT)?;
        info!("Login succeeded");
        Ok(token)
    }

    /// Check a session token.
    ///
    /// # Errors
    /// - `Expired`, `BadSignature`, `MalformedToken`
    pub fn authorize(&self, token: &str) -> Result<SessionClaims> {
        let claims = self.tokens.verify(token).and_then(|claims| {
            if claims.sub != SUBJECT {
                return Err(Error::MalformedToken("unexpected subject".to_string()));
            }
            Ok(claims)
        });

        if let Err(e) = &claims {
            warn!(kind = e.kind(), "Session token rejected");
        }
        claims
    }

    /// Verify the master password and derive the request key.
    pub fn unlock(&self, password: &Password) -> Result<RequestKey> {
        self.store.unlock(password)
    }

    /// Authorize the session, then derive the request key.
    ///
    /// The token grants access; the password is still needed for the key.
    pub fn authorize_and_unlock(&self, token: &str, password: &Password) -> Result<RequestKey> {
        self.authorize(token)?;
        self.unlock(password)
    }

    /// Change the master password without migrating data.
    ///
    /// See [`CredentialStore::change_password`] for what this leaves behind.
    pub fn change_password(&self, old_password: &Password, new_password: &Password) -> Result<()> {
        self.store
            .change_password(old_password, new_password, &self.settings.password_policy())
    }

    /// Change the master password and re-encrypt data through `migrate`.
    ///
    /// Returns what `migrate` staged, once the new credential is saved.
    /// See [`CredentialStore::change_password_and_migrate`].
    pub fn change_password_and_migrate<T, F>(
        &self,
        old_password: &Password,
        new_password: &Password,
        migrate: F,
    ) -> Result<T>
    where
        F: FnOnce(&RequestKey, &RequestKey) -> Result<T>,
    {
        self.store.change_password_and_migrate(
            old_password,
            new_password,
            &self.settings.password_policy(),
            migrate,
        )
    }
}
