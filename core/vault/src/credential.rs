//! The vault credential and the password policy applied to it.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};

use gmvault_common::{Error, Password, Result};
use gmvault_crypto::{
    derive_key, derive_verifier, verify_password, KdfParams, PasswordVerifier, RequestKey, Salt,
};
use gmvault_storage::CredentialRecord;

/// Minimum-length rule for master passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    min_length: usize,
}

impl PasswordPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Check a candidate password.
    ///
    /// Length is counted in characters, not bytes.
    ///
    /// # Errors
    /// - `WeakPassword` if the password is too short
    pub fn check(&self, password: &Password) -> Result<()> {
        if password.char_count() < self.min_length {
            return Err(Error::WeakPassword {
                min_length: self.min_length,
            });
        }
        Ok(())
    }
}

/// The single vault credential: verifier, salt and KDF parameters.
///
/// Holds no key. The key is derived on demand with [`VaultCredential::derive_key`].
#[derive(Debug, Clone)]
pub struct VaultCredential {
    verifier: PasswordVerifier,
    salt: Salt,
    kdf: KdfParams,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VaultCredential {
    /// Create a credential for `password` with a fresh random salt.
    ///
    /// # Errors
    /// - `InvalidInput` if the password is empty or `kdf` is invalid
    /// - `Crypto` if the RNG fails
    pub fn create(password: &Password, kdf: &KdfParams, now: DateTime<Utc>) -> Result<Self> {
        let salt = Salt::generate()?;
        let verifier = derive_verifier(password, &salt, kdf)?;

        Ok(Self {
            verifier,
            salt,
            kdf: kdf.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Check `password` against the stored verifier in constant time.
    pub fn matches(&self, password: &Password) -> Result<bool> {
        verify_password(password, &self.salt, &self.kdf, &self.verifier)
    }

    /// Derive the request key for `password` with this credential's salt.
    ///
    /// Does not verify the password; callers check [`matches`](Self::matches) first.
    pub fn derive_key(&self, password: &Password) -> Result<RequestKey> {
        derive_key(password, &self.salt, &self.kdf)
    }

    /// A replacement credential for a new password.
    ///
    /// The salt is regenerated and `created_at` is carried over.
    pub fn rotate(
        &self,
        new_password: &Password,
        kdf: &KdfParams,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut next = Self::create(new_password, kdf, now)?;
        next.created_at = self.created_at;
        Ok(next)
    }

    /// Whether two credentials hold the same salt and verifier.
    pub fn same_secret(&self, other: &VaultCredential) -> bool {
        self.salt == other.salt && self.verifier.ct_eq(&other.verifier)
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Convert to the storage format.
    pub fn to_record(&self) -> CredentialRecord {
        CredentialRecord {
            password_hash: BASE64.encode(self.verifier.as_bytes()),
            salt: BASE64.encode(self.salt.as_bytes()),
            work_factor: self.kdf.work_factor,
            memory_cost: self.kdf.memory_cost,
            parallelism: self.kdf.parallelism,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Rebuild from the storage format.
    ///
    /// # Errors
    /// - `Storage` if the stored hash, salt or parameters are corrupt
    pub fn from_record(record: &CredentialRecord) -> Result<Self> {
        let hash = BASE64
            .decode(&record.password_hash)
            .map_err(|_| Error::Storage("Stored password hash is not valid base64".to_string()))?;
        let verifier = PasswordVerifier::from_slice(&hash)
            .map_err(|e| Error::Storage(format!("Stored password hash: {}", e)))?;

        let salt = BASE64
            .decode(&record.salt)
            .map_err(|_| Error::Storage("Stored salt is not valid base64".to_string()))?;
        let salt =
            Salt::from_slice(&salt).map_err(|e| Error::Storage(format!("Stored salt: {}", e)))?;

        let kdf = KdfParams::new(record.work_factor, record.memory_cost, record.parallelism);
        kdf.validate()
            .map_err(|e| Error::Storage(format!("Stored KDF parameters: {}", e)))?;

        Ok(Self {
            verifier,
            salt,
            kdf,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams::new(1, 1024, 1)
    }

    #[test]
    fn test_policy_counts_characters() {
        let policy = PasswordPolicy::new(8);

        assert!(matches!(
            policy.check(&Password::from("short")),
            Err(Error::WeakPassword { min_length: 8 })
        ));
        // 8 characters, 16 bytes
        assert!(policy.check(&Password::from("ééééé ab")).is_ok());
        assert!(matches!(
            policy.check(&Password::from("éééé")),
            Err(Error::WeakPassword { .. })
        ));
    }

    #[test]
    fn test_create_and_match() {
        let password = Password::from("correcthorsebattery");
        let credential = VaultCredential::create(&password, &fast_params(), Utc::now()).unwrap();

        assert!(credential.matches(&Password::from("correcthorsebattery")).unwrap());
        assert!(!credential.matches(&Password::from("wrongpass")).unwrap());
    }

    #[test]
    fn test_record_roundtrip() {
        let password = Password::from("correcthorsebattery");
        let credential = VaultCredential::create(&password, &fast_params(), Utc::now()).unwrap();

        let record = credential.to_record();
        assert_eq!(record.work_factor, 1);
        assert_eq!(BASE64.decode(&record.salt).unwrap().len(), 16);

        let restored = VaultCredential::from_record(&record).unwrap();
        assert!(restored.same_secret(&credential));
        assert!(restored.matches(&Password::from("correcthorsebattery")).unwrap());
    }

    #[test]
    fn test_corrupt_record_is_storage_error() {
        let credential =
            VaultCredential::create(&Password::from("password123"), &fast_params(), Utc::now())
                .unwrap();

        let mut record = credential.to_record();
        record.salt = "AAAA".to_string();
        assert!(matches!(
            VaultCredential::from_record(&record),
            Err(Error::Storage(_))
        ));

        let mut record = credential.to_record();
        record.password_hash = "not base64!".to_string();
        assert!(matches!(
            VaultCredential::from_record(&record),
            Err(Error::Storage(_))
        ));

        let mut record = credential.to_record();
        record.work_factor = 0;
        assert!(matches!(
            VaultCredential::from_record(&record),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_rotate_new_salt_keeps_created_at() {
        let created = Utc::now() - chrono::Duration::days(30);
        let password = Password::from("password123");
        let credential = VaultCredential::create(&password, &fast_params(), created).unwrap();

        let rotated = credential
            .rotate(&Password::from("password456"), &fast_params(), Utc::now())
            .unwrap();

        assert_ne!(rotated.salt(), credential.salt());
        assert_eq!(rotated.created_at(), created);
        assert!(rotated.updated_at() > created);
        assert!(!rotated.same_secret(&credential));
    }
}
