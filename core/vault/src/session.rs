//! Session tokens.
//!
//! Tokens are compact HS256 JWTs carrying only `{sub, iat, exp, jti}`.
//! They authorize access and are independent of the encryption key: a
//! stolen token grants no decryption capability. There is no revocation
//! list, so a token stays valid until it expires. That includes tokens
//! issued before a password change.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::SigningSecret;
use gmvault_common::{Clock, Error, Result};

/// Subject of every token in the single-user vault.
pub const SUBJECT: &str = "master";

/// Decoded, verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Unique token id. Safe to log.
    pub jti: String,
}

impl SessionClaims {
    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// An issued token. `Debug` does not print it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken([REDACTED])")
    }
}

/// Issues and verifies session tokens with one signing secret.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a service signing with `secret`.
    ///
    /// # Errors
    /// - `InvalidInput` if the secret is empty or the lifetime is not positive
    pub fn new(secret: &SigningSecret, lifetime: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::InvalidInput("Signing secret cannot be empty".to_string()));
        }
        if lifetime <= Duration::zero() {
            return Err(Error::InvalidInput(
                "Token lifetime must be positive".to_string(),
            ));
        }

        // Expiry is checked against the injected clock, not the system time.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
            clock,
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for `subject`, valid for the configured lifetime.
    pub fn issue(&self, subject: &str) -> Result<SessionToken> {
        let now = self.clock.now();
        let claims = SessionClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| Error::Crypto("Failed to sign session token".to_string()))?;

        debug!(jti = %claims.jti, exp = claims.exp, "Session token issued");
        Ok(SessionToken(token))
    }

    /// Verify a token and return its claims.
    ///
    /// The signature is checked before any claim is looked at.
    ///
    /// # Errors
    /// - `BadSignature` if the signature or algorithm does not match
    /// - `MalformedToken` if the token cannot be parsed
    /// - `Expired` if correctly signed but at or past `exp`
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Error::BadSignature,
                ErrorKind::MissingRequiredClaim(claim) => {
                    Error::MalformedToken(format!("missing claim {}", claim))
                }
                _ => Error::MalformedToken("token could not be decoded".to_string()),
            },
        )?;

        let claims = data.claims;
        if self.clock.now().timestamp() >= claims.exp {
            debug!(jti = %claims.jti, "Session token expired");
            return Err(Error::Expired);
        }

        Ok(claims)
    }
}
