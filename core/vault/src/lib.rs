//! Vault core for gmvault.
//!
//! This module provides:
//! - The single vault credential and its store (initialize, verify,
//!   unlock, change password)
//! - Stateless signed session tokens
//! - Per-field encryption of account records with a request-scoped key
//! - Settings for work factor, password policy, token lifetime and
//!   signing secret
//!
//! # Architecture
//! The master password is supplied on every privileged call. The store
//! derives a [`RequestKey`](gmvault_crypto::RequestKey) for that call
//! only; nothing here caches it. Session tokens authorize access and are
//! independent of the key.

pub mod config;
pub mod credential;
pub mod fields;
pub mod manager;
pub mod session;
pub mod store;

pub use config::{SigningSecret, VaultSettings};
pub use credential::{PasswordPolicy, VaultCredential};
pub use fields::{
    decrypt_accounts, decrypt_field, encrypt_accounts, encrypt_field, reencrypt_field,
    AccountField, AccountFields, Sensitivity,
};
pub use manager::VaultManager;
pub use session::{SessionClaims, SessionToken, TokenService, SUBJECT};
pub use store::CredentialStore;
