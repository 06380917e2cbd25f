//! Selective field encryption for account records.
//!
//! Only fields marked [`Sensitivity::Sensitive`] in the policy table go
//! through the AEAD codec. Identifiers, timestamps and other searchable
//! columns stay in clear. Every field gets its own envelope and nonce, so
//! one corrupted field never affects its siblings.

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use gmvault_common::{Error, Result};
use gmvault_crypto::{decrypt, encrypt, RequestKey};

/// Encrypt an optional field value.
///
/// `None` passes through without touching the codec.
pub fn encrypt_field(plaintext: Option<&str>, key: &RequestKey) -> Result<Option<String>> {
    plaintext
        .map(|value| encrypt(key.as_bytes(), value.as_bytes()))
        .transpose()
}

/// Decrypt an optional field value.
///
/// # Errors
/// - `MalformedEnvelope` if the blob cannot be parsed, or the plaintext
///   is not UTF-8
/// - `AuthenticationFailed` if the tag does not verify
pub fn decrypt_field(ciphertext: Option<&str>, key: &RequestKey) -> Result<Option<String>> {
    let Some(blob) = ciphertext else {
        return Ok(None);
    };

    let bytes = decrypt(key.as_bytes(), blob)?;
    String::from_utf8(bytes).map(Some).map_err(|e| {
        e.into_bytes().zeroize();
        Error::MalformedEnvelope("plaintext is not valid UTF-8".to_string())
    })
}

/// Move one field from `old_key` to `new_key`.
///
/// The migration step after a password change. The intermediate
/// plaintext is zeroized.
pub fn reencrypt_field(
    ciphertext: Option<&str>,
    old_key: &RequestKey,
    new_key: &RequestKey,
) -> Result<Option<String>> {
    let plaintext = decrypt_field(ciphertext, old_key)?.map(Zeroizing::new);
    encrypt_field(plaintext.as_deref().map(String::as_str), new_key)
}

/// Whether a field is encrypted at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    Sensitive,
    Clear,
}

/// Columns of an account record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountField {
    Id,
    RawImportId,
    Email,
    Password,
    RecoveryEmail,
    TotpSecret,
    Year,
    Notes,
    GroupId,
    FieldOrder,
    CreatedAt,
    UpdatedAt,
}

impl AccountField {
    pub const ALL: [AccountField; 12] = [
        AccountField::Id,
        AccountField::RawImportId,
        AccountField::Email,
        AccountField::Password,
        AccountField::RecoveryEmail,
        AccountField::TotpSecret,
        AccountField::Year,
        AccountField::Notes,
        AccountField::GroupId,
        AccountField::FieldOrder,
        AccountField::CreatedAt,
        AccountField::UpdatedAt,
    ];

    /// The field policy table.
    pub fn sensitivity(self) -> Sensitivity {
        match self {
            AccountField::Email
            | AccountField::Password
            | AccountField::RecoveryEmail
            | AccountField::TotpSecret
            | AccountField::Notes => Sensitivity::Sensitive,
            AccountField::Id
            | AccountField::RawImportId
            | AccountField::Year
            | AccountField::GroupId
            | AccountField::FieldOrder
            | AccountField::CreatedAt
            | AccountField::UpdatedAt => Sensitivity::Clear,
        }
    }

    pub fn is_sensitive(self) -> bool {
        self.sensitivity() == Sensitivity::Sensitive
    }

    /// Storage column name.
    pub fn column(self) -> &'static str {
        match self {
            AccountField::Id => "id",
            AccountField::RawImportId => "raw_import_id",
            AccountField::Email => "email",
            AccountField::Password => "password",
            AccountField::RecoveryEmail => "recovery_email",
            AccountField::TotpSecret => "totp_secret",
            AccountField::Year => "year",
            AccountField::Notes => "notes",
            AccountField::GroupId => "group_id",
            AccountField::FieldOrder => "field_order",
            AccountField::CreatedAt => "created_at",
            AccountField::UpdatedAt => "updated_at",
        }
    }

    /// The sensitive fields, in column order.
    pub fn sensitive() -> impl Iterator<Item = AccountField> {
        Self::ALL.into_iter().filter(|field| field.is_sensitive())
    }
}

/// One account row, either all plaintext or with sensitive fields encrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFields {
    pub id: String,
    pub raw_import_id: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub recovery_email: Option<String>,
    pub totp_secret: Option<String>,
    pub year: Option<String>,
    pub notes: Option<String>,
    pub group_id: Option<String>,
    /// JSON list of field names in display order.
    pub field_order: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AccountFields {
    /// Encrypt every sensitive field.
    pub fn encrypt(&self, key: &RequestKey) -> Result<Self> {
        self.map_sensitive(|_, value| encrypt_field(value, key))
    }

    /// Decrypt every sensitive field.
    ///
    /// # Errors
    /// - The first field failure, unchanged
    pub fn decrypt(&self, key: &RequestKey) -> Result<Self> {
        self.map_sensitive(|field, value| {
            decrypt_field(value, key).inspect_err(|e| {
                debug!(field = field.column(), kind = e.kind(), "Field decryption failed");
            })
        })
    }

    /// Move every sensitive field from `old_key` to `new_key`.
    pub fn reencrypt(&self, old_key: &RequestKey, new_key: &RequestKey) -> Result<Self> {
        self.map_sensitive(|_, value| reencrypt_field(value, old_key, new_key))
    }

    /// The value stored in `field`, as text.
    ///
    /// Returns `None` for absent optional values.
    pub fn get(&self, field: AccountField) -> Option<&str> {
        match field {
            AccountField::Id => Some(&self.id),
            AccountField::RawImportId => self.raw_import_id.as_deref(),
            AccountField::Email => self.email.as_deref(),
            AccountField::Password => self.password.as_deref(),
            AccountField::RecoveryEmail => self.recovery_email.as_deref(),
            AccountField::TotpSecret => self.totp_secret.as_deref(),
            AccountField::Year => self.year.as_deref(),
            AccountField::Notes => self.notes.as_deref(),
            AccountField::GroupId => self.group_id.as_deref(),
            AccountField::FieldOrder => self.field_order.as_deref(),
            AccountField::CreatedAt => Some(&self.created_at),
            AccountField::UpdatedAt => Some(&self.updated_at),
        }
    }

    fn sensitive_slot(&mut self, field: AccountField) -> Option<&mut Option<String>> {
        match field {
            AccountField::Email => Some(&mut self.email),
            AccountField::Password => Some(&mut self.password),
            AccountField::RecoveryEmail => Some(&mut self.recovery_email),
            AccountField::TotpSecret => Some(&mut self.totp_secret),
            AccountField::Notes => Some(&mut self.notes),
            _ => None,
        }
    }

    fn map_sensitive<F>(&self, mut transform: F) -> Result<Self>
    where
        F: FnMut(AccountField, Option<&str>) -> Result<Option<String>>,
    {
        let mut out = self.clone();
        for field in AccountField::sensitive() {
            if let Some(slot) = out.sensitive_slot(field) {
                *slot = transform(field, slot.as_deref())?;
            }
        }
        Ok(out)
    }
}

/// Encrypt a batch of accounts.
pub fn encrypt_accounts(
    accounts: &[AccountFields],
    key: &RequestKey,
) -> Result<Vec<AccountFields>> {
    accounts.iter().map(|account| account.encrypt(key)).collect()
}

/// Decrypt a batch of accounts. Fails on the first bad record.
pub fn decrypt_accounts(
    accounts: &[AccountFields],
    key: &RequestKey,
) -> Result<Vec<AccountFields>> {
    accounts.iter().map(|account| account.decrypt(key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use proptest::prelude::*;

    fn key(byte: u8) -> RequestKey {
        RequestKey::from_bytes([byte; 32])
    }

    fn sample() -> AccountFields {
        AccountFields {
            id: "acc-1".to_string(),
            raw_import_id: Some("import-7".to_string()),
            email: Some("secret@example.com".to_string()),
            password: Some("hunter2".to_string()),
            recovery_email: None,
            totp_secret: Some("JBSWY3DPEHPK3PXP".to_string()),
            year: Some("2019".to_string()),
            notes: Some("backup codes in drawer".to_string()),
            group_id: Some("grp-2".to_string()),
            field_order: Some(r#"["email","password"]"#.to_string()),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-02T00:00:00Z".to_string(),
        }
    }

    fn flip_last_byte(blob: &str) -> String {
        let mut bytes = STANDARD.decode(blob).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_field_roundtrip_with_null() {
        let key = key(1);

        assert_eq!(encrypt_field(None, &key).unwrap(), None);
        assert_eq!(decrypt_field(None, &key).unwrap(), None);

        let encrypted = encrypt_field(Some("secret@example.com"), &key).unwrap();
        assert_ne!(encrypted.as_deref(), Some("secret@example.com"));
        assert_eq!(
            decrypt_field(encrypted.as_deref(), &key).unwrap().as_deref(),
            Some("secret@example.com")
        );
    }

    #[test]
    fn test_empty_string_is_encrypted() {
        let key = key(1);
        let encrypted = encrypt_field(Some(""), &key).unwrap().unwrap();
        assert!(!encrypted.is_empty());
        assert_eq!(decrypt_field(Some(&encrypted), &key).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_errors_propagate_unchanged() {
        let key = key(1);
        let encrypted = encrypt_field(Some("hunter2"), &key).unwrap().unwrap();

        assert!(matches!(
            decrypt_field(Some(&encrypted), &self::key(2)),
            Err(Error::AuthenticationFailed)
        ));
        assert!(matches!(
            decrypt_field(Some("AAAA"), &key),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_non_utf8_plaintext_rejected() {
        let key = key(1);
        let blob = encrypt(key.as_bytes(), &[0xff, 0xfe, 0xfd]).unwrap();
        assert!(matches!(
            decrypt_field(Some(&blob), &key),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_policy_table() {
        let sensitive: Vec<_> = AccountField::sensitive().map(AccountField::column).collect();
        assert_eq!(
            sensitive,
            vec!["email", "password", "recovery_email", "totp_secret", "notes"]
        );
        assert_eq!(AccountField::Year.sensitivity(), Sensitivity::Clear);
        assert_eq!(AccountField::ALL.len(), 12);
    }

    #[test]
    fn test_record_encrypts_only_sensitive_fields() {
        let key = key(3);
        let plain = sample();
        let encrypted = plain.encrypt(&key).unwrap();

        for field in AccountField::ALL {
            match field.sensitivity() {
                Sensitivity::Clear => assert_eq!(encrypted.get(field), plain.get(field)),
                Sensitivity::Sensitive => {
                    if plain.get(field).is_some() {
                        assert_ne!(encrypted.get(field), plain.get(field));
                    }
                }
            }
        }
        assert_eq!(encrypted.recovery_email, None);
        assert_eq!(encrypted.decrypt(&key).unwrap(), plain);
    }

    #[test]
    fn test_each_field_has_own_nonce() {
        let key = key(4);
        let account = AccountFields {
            email: Some("same".to_string()),
            password: Some("same".to_string()),
            ..sample()
        };
        let encrypted = account.encrypt(&key).unwrap();

        assert_ne!(encrypted.email, encrypted.password);
        let email = STANDARD.decode(encrypted.email.unwrap()).unwrap();
        let password = STANDARD.decode(encrypted.password.unwrap()).unwrap();
        assert_ne!(email[..12], password[..12]);
    }

    #[test]
    fn test_corrupted_field_isolated() {
        let key = key(5);
        let mut encrypted = sample().encrypt(&key).unwrap();
        encrypted.notes = encrypted.notes.as_deref().map(flip_last_byte);

        assert_eq!(
            decrypt_field(encrypted.email.as_deref(), &key).unwrap().as_deref(),
            Some("secret@example.com")
        );
        assert!(matches!(
            decrypt_field(encrypted.notes.as_deref(), &key),
            Err(Error::AuthenticationFailed)
        ));
        assert!(matches!(
            encrypted.decrypt(&key),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_reencrypt_moves_to_new_key() {
        let old_key = key(6);
        let new_key = key(7);
        let encrypted = sample().encrypt(&old_key).unwrap();

        let migrated = encrypted.reencrypt(&old_key, &new_key).unwrap();

        assert!(migrated.decrypt(&old_key).is_err());
        assert_eq!(migrated.decrypt(&new_key).unwrap(), sample());
        assert_eq!(reencrypt_field(None, &old_key, &new_key).unwrap(), None);
    }

    #[test]
    fn test_batch() {
        let key = key(8);
        let accounts = vec![
            sample(),
            AccountFields {
                id: "acc-2".to_string(),
                ..AccountFields::default()
            },
        ];

        let encrypted = encrypt_accounts(&accounts, &key).unwrap();
        assert_eq!(encrypted.len(), 2);
        assert_eq!(decrypt_accounts(&encrypted, &key).unwrap(), accounts);
    }

    proptest! {
        #[test]
        fn prop_field_roundtrip(value in ".*") {
            let key = key(9);
            let encrypted = encrypt_field(Some(value.as_str()), &key).unwrap();
            let decrypted = decrypt_field(encrypted.as_deref(), &key).unwrap();
            prop_assert_eq!(decrypted, Some(value));
        }
    }
}
