//! Cryptographic primitives for gmvault.
//!
//! This module provides:
//! - Key derivation using Argon2id, with separate outputs for the stored
//!   password verifier and the request-scoped encryption key
//! - Authenticated encryption using AES-256-GCM in a fixed
//!   `nonce ‖ tag ‖ ciphertext` envelope
//! - Key types with automatic zeroization
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time operations for sensitive comparisons

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, encrypt, Envelope};
pub use kdf::{derive_key, derive_verifier, verify_password, KdfParams};
pub use keys::{PasswordVerifier, RequestKey, Salt};
