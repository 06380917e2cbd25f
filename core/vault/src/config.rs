//! Vault settings.
//!
//! Everything the core treats as policy rather than code: KDF cost,
//! minimum password length, session lifetime and the token signing
//! secret. Settings are read from a JSON document and may be overridden
//! from the environment.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::credential::PasswordPolicy;
use gmvault_common::{Error, Result};
use gmvault_crypto::KdfParams;

/// Default minimum master password length, in characters.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

/// Default session token lifetime (12 hours).
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 12 * 60 * 60;

/// Longest accepted session token lifetime (one year).
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 366 * 24 * 60 * 60;

/// Shortest accepted signing secret, in bytes.
pub const MIN_SIGNING_SECRET_LENGTH: usize = 32;

/// Environment variable holding the Base64 signing secret.
pub const ENV_SIGNING_SECRET: &str = "GMVAULT_SIGNING_SECRET";

/// Environment variable overriding the KDF work factor.
pub const ENV_WORK_FACTOR: &str = "GMVAULT_WORK_FACTOR";

/// Environment variable overriding the minimum password length.
pub const ENV_MIN_PASSWORD_LENGTH: &str = "GMVAULT_MIN_PASSWORD_LENGTH";

/// HMAC secret used to sign session tokens.
///
/// Serialized as Base64. Rotating it invalidates every issued token.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse the Base64 form.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        BASE64
            .decode(encoded.trim())
            .map(Self)
            .map_err(|_| Error::InvalidInput("Signing secret is not valid base64".to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret([REDACTED; {} bytes])", self.0.len())
    }
}

impl Serialize for SigningSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for SigningSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut encoded = String::deserialize(deserializer)?;
        let secret = SigningSecret::from_base64(&encoded).map_err(serde::de::Error::custom);
        encoded.zeroize();
        secret
    }
}

/// Configuration surface of the vault core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultSettings {
    /// KDF parameters for newly created credentials.
    pub kdf: KdfParams,
    /// Minimum master password length, in characters.
    pub min_password_length: usize,
    /// Session token lifetime in seconds.
    pub token_lifetime_secs: u64,
    /// Session token signing secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<SigningSecret>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            signing_secret: None,
        }
    }
}

impl VaultSettings {
    /// Deserialize settings from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize settings to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    /// - `InvalidInput` if a variable is present but unparsable
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(mut secret) = lookup(ENV_SIGNING_SECRET) {
            let parsed = SigningSecret::from_base64(&secret);
            secret.zeroize();
            self.signing_secret = Some(parsed?);
        }

        if let Some(value) = lookup(ENV_WORK_FACTOR) {
            self.kdf.work_factor = value.trim().parse().map_err(|_| {
                Error::InvalidInput(format!("{} must be a positive integer", ENV_WORK_FACTOR))
            })?;
        }

        if let Some(value) = lookup(ENV_MIN_PASSWORD_LENGTH) {
            self.min_password_length = value.trim().parse().map_err(|_| {
                Error::InvalidInput(format!(
                    "{} must be a positive integer",
                    ENV_MIN_PASSWORD_LENGTH
                ))
            })?;
        }

        Ok(())
    }

    /// Check every setting.
    ///
    /// # Errors
    /// - `InvalidInput` naming the first offending setting
    pub fn validate(&self) -> Result<()> {
        self.kdf.validate()?;

        if self.min_password_length == 0 {
            return Err(Error::InvalidInput(
                "Minimum password length must be positive".to_string(),
            ));
        }
        if self.token_lifetime_secs == 0 || self.token_lifetime_secs > MAX_TOKEN_LIFETIME_SECS {
            return Err(Error::InvalidInput(format!(
                "Token lifetime must be between 1 and {} seconds",
                MAX_TOKEN_LIFETIME_SECS
            )));
        }

        let secret = self.signing_secret()?;
        if secret.len() < MIN_SIGNING_SECRET_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Signing secret must be at least {} bytes",
                MIN_SIGNING_SECRET_LENGTH
            )));
        }

        Ok(())
    }

    /// The configured signing secret.
    ///
    /// # Errors
    /// - `InvalidInput` if none is configured
    pub fn signing_secret(&self) -> Result<&SigningSecret> {
        self.signing_secret.as_ref().ok_or_else(|| {
            Error::InvalidInput(format!(
                "No signing secret configured (set {})",
                ENV_SIGNING_SECRET
            ))
        })
    }

    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy::new(self.min_password_length)
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::seconds(self.token_lifetime_secs.min(MAX_TOKEN_LIFETIME_SECS) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn secret_b64() -> String {
        BASE64.encode([7u8; 32])
    }

    #[test]
    fn test_defaults() {
        let settings = VaultSettings::default();
        assert_eq!(settings.kdf, KdfParams::interactive());
        assert_eq!(settings.min_password_length, 8);
        assert_eq!(settings.token_lifetime(), Duration::hours(12));
        assert!(settings.signing_secret.is_none());
    }

    #[test]
    fn test_missing_secret_fails_validation() {
        let settings = VaultSettings::default();
        assert!(matches!(settings.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_short_secret_fails_validation() {
        let settings = VaultSettings {
            signing_secret: Some(SigningSecret::from_bytes(vec![1u8; 16])),
            ..VaultSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let json = format!(
            r#"{{ "minPasswordLength": 12, "tokenLifetimeSecs": 600, "signingSecret": "{}" }}"#,
            secret_b64()
        );
        let settings = VaultSettings::from_json(&json).unwrap();

        assert_eq!(settings.min_password_length, 12);
        assert_eq!(settings.token_lifetime_secs, 600);
        assert_eq!(settings.kdf, KdfParams::interactive());
        assert_eq!(settings.signing_secret().unwrap().as_bytes(), &[7u8; 32]);
        settings.validate().unwrap();
    }

    #[test]
    fn test_json_roundtrip_keeps_secret() {
        let settings = VaultSettings {
            signing_secret: Some(SigningSecret::from_bytes(vec![9u8; 40])),
            ..VaultSettings::default()
        };
        let restored = VaultSettings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(restored.signing_secret().unwrap().as_bytes(), &[9u8; 40]);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, String> = HashMap::from([
            (ENV_SIGNING_SECRET, secret_b64()),
            (ENV_WORK_FACTOR, "5".to_string()),
            (ENV_MIN_PASSWORD_LENGTH, " 10 ".to_string()),
        ]);
        let mut settings = VaultSettings::default();

        settings
            .apply_overrides(|name| vars.get(name).cloned())
            .unwrap();

        assert_eq!(settings.kdf.work_factor, 5);
        assert_eq!(settings.min_password_length, 10);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut settings = VaultSettings::default();
        let result = settings.apply_overrides(|name| {
            (name == ENV_WORK_FACTOR).then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let secret = SigningSecret::from_bytes(b"super-secret-signing-key-material".to_vec());
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
    }
}
