//! Vault credential store.
//!
//! Wraps the injected [`CredentialRepository`] holding the single
//! credential record. Creation relies on the repository's atomic
//! create-if-absent. Password changes are serialized by a mutex; the
//! expensive KDF always runs before the lock is taken, and the committed
//! state is re-checked under the lock.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::credential::{PasswordPolicy, VaultCredential};
use gmvault_common::{Clock, Error, Password, Result};
use gmvault_crypto::{KdfParams, RequestKey};
use gmvault_storage::CredentialRepository;

/// Owner of the vault credential.
pub struct CredentialStore {
    repository: Arc<dyn CredentialRepository>,
    clock: Arc<dyn Clock>,
    kdf: KdfParams,
    writer: Mutex<()>,
}

impl CredentialStore {
    /// Create a store over `repository`.
    ///
    /// `kdf` applies to credentials created from now on; existing
    /// credentials keep the parameters they were created with.
    pub fn new(
        repository: Arc<dyn CredentialRepository>,
        clock: Arc<dyn Clock>,
        kdf: KdfParams,
    ) -> Self {
        Self {
            repository,
            clock,
            kdf,
            writer: Mutex::new(()),
        }
    }

    /// Get the backend name.
    pub fn backend(&self) -> &str {
        self.repository.name()
    }

    /// Whether the credential has been created.
    pub fn is_initialized(&self) -> Result<bool> {
        self.repository.exists()
    }

    /// Load the committed credential.
    ///
    /// # Errors
    /// - `NotInitialized` if no credential exists
    /// - `Storage` if the stored record is corrupt
    pub fn load(&self) -> Result<VaultCredential> {
        match self.repository.load()? {
            Some(record) => VaultCredential::from_record(&record),
            None => Err(Error::NotInitialized),
        }
    }

    /// Create the vault credential.
    ///
    /// # Preconditions
    /// - No credential exists yet
    ///
    /// # Postconditions
    /// - Exactly one credential exists, with a fresh salt
    /// - Of several concurrent callers, exactly one succeeds, including
    ///   callers in other stores or processes sharing the backend
    ///
    /// # Errors
    /// - `AlreadyInitialized` if a credential exists
    /// - `WeakPassword` if `password` fails `policy`
    pub fn initialize(&self, password: &Password, policy: &PasswordPolicy) -> Result<()> {
        if self.is_initialized()? {
            return Err(Error::AlreadyInitialized);
        }
        policy.check(password)?;

        let credential = VaultCredential::create(password, &self.kdf, self.clock.now())?;
        self.repository.create(&credential.to_record())?;

        info!(backend = %self.backend(), work_factor = self.kdf.work_factor, "Vault initialized");
        Ok(())
    }

    /// Check `password` against the stored verifier.
    ///
    /// # Errors
    /// - `NotInitialized` if no credential exists
    /// - `InvalidCredential` if the password does not match
    pub fn verify(&self, password: &Password) -> Result<()> {
        self.verified(password).map(|_| ())
    }

    /// Verify `password` and derive the request key.
    ///
    /// # Postconditions
    /// - The returned key belongs to the caller; nothing here retains it
    ///
    /// # Errors
    /// - `NotInitialized`, `InvalidCredential` as for [`verify`](Self::verify)
    pub fn unlock(&self, password: &Password) -> Result<RequestKey> {
        let credential = self.verified(password)?;
        credential.derive_key(password)
    }

    /// Replace the credential with one for `new_password`.
    ///
    /// Ciphertexts written under the old key are NOT re-encrypted and
    /// become undecryptable once this returns. Callers that hold such data
    /// must migrate it first, or use
    /// [`change_password_and_migrate`](Self::change_password_and_migrate).
    /// Session tokens issued before the change stay valid until expiry.
    ///
    /// # Errors
    /// - `NotInitialized` if no credential exists
    /// - `InvalidCredential` if `old_password` does not match, or the
    ///   credential changed concurrently
    /// - `WeakPassword` if `new_password` fails `policy`
    pub fn change_password(
        &self,
        old_password: &Password,
        new_password: &Password,
        policy: &PasswordPolicy,
    ) -> Result<()> {
        self.change_password_and_migrate(old_password, new_password, policy, |_, _| Ok(()))
    }

    /// Replace the credential and re-encrypt data in one step.
    ///
    /// `migrate` receives the old and the new request key and returns the
    /// re-encrypted data. It must only stage that data (in memory or in a
    /// file that is not yet in place) and never overwrite the stored
    /// originals: the staged data is handed back only after the new
    /// credential is committed, and the caller publishes it then. If
    /// `migrate` or the commit fails, the error is returned, nothing is
    /// staged for publishing, and the old password keeps working.
    /// `migrate` runs under the writer lock, so no other password change
    /// can interleave with it.
    ///
    /// # Errors
    /// - As for [`change_password`](Self::change_password)
    /// - Any error from `migrate`, or from saving the new credential
    pub fn change_password_and_migrate<T, F>(
        &self,
        old_password: &Password,
        new_password: &Password,
        policy: &PasswordPolicy,
        migrate: F,
    ) -> Result<T>
    where
        F: FnOnce(&RequestKey, &RequestKey) -> Result<T>,
    {
        let current = self.verified(old_password)?;
        policy.check(new_password)?;

        let old_key = current.derive_key(old_password)?;
        let next = current.rotate(new_password, &self.kdf, self.clock.now())?;
        let new_key = next.derive_key(new_password)?;

        let _guard = self.lock_writer();
        let committed = self.load()?;
        if !committed.same_secret(&current) {
            warn!("Credential changed during password change");
            return Err(Error::InvalidCredential);
        }

        let staged = migrate(&old_key, &new_key)?;
        if let Err(e) = self.repository.save(&next.to_record()) {
            warn!(kind = e.kind(), "New credential not saved; migrated data discarded");
            return Err(e);
        }

        info!(backend = %self.backend(), "Master password changed");
        Ok(staged)
    }

    fn verified(&self, password: &Password) -> Result<VaultCredential> {
        let credential = self.load()?;
        if !credential.matches(password)? {
            debug!("Password verification failed");
            return Err(Error::InvalidCredential);
        }
        Ok(credential)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }
}
