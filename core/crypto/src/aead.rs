//! Authenticated encryption using AES-256-GCM.
//!
//! Every call draws a fresh random 96-bit nonce. The output is a
//! self-describing envelope with the fixed binary layout
//!
//! ```text
//! [ nonce (12) ][ tag (16) ][ ciphertext (n) ]
//! ```
//!
//! which is then Base64 encoded (standard alphabet, padded) for storage.
//! The layout and sizes are a compatibility contract with stored data.

use aes_gcm::{
    aead::{AeadCore, AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use zeroize::Zeroize;

use crate::keys::KEY_LENGTH;
use gmvault_common::{Error, Result};

/// Nonce size for AES-256-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Smallest valid decoded envelope (empty plaintext).
pub const MIN_ENVELOPE_SIZE: usize = NONCE_SIZE + TAG_SIZE;

/// Parsed ciphertext envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    nonce: [u8; NONCE_SIZE],
    tag: [u8; TAG_SIZE],
    ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    pub fn tag(&self) -> &[u8; TAG_SIZE] {
        &self.tag
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialize to `nonce ‖ tag ‖ ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_ENVELOPE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse `nonce ‖ tag ‖ ciphertext`.
    ///
    /// # Errors
    /// - `MalformedEnvelope` if fewer than MIN_ENVELOPE_SIZE bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_ENVELOPE_SIZE {
            return Err(Error::MalformedEnvelope(format!(
                "expected at least {} bytes, got {}",
                MIN_ENVELOPE_SIZE,
                bytes.len()
            )));
        }

        let (nonce, rest) = bytes.split_at(NONCE_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);

        let mut envelope = Self {
            nonce: [0u8; NONCE_SIZE],
            tag: [0u8; TAG_SIZE],
            ciphertext: ciphertext.to_vec(),
        };
        envelope.nonce.copy_from_slice(nonce);
        envelope.tag.copy_from_slice(tag);
        Ok(envelope)
    }

    /// Text form used for storage.
    pub fn encode(&self) -> String {
        BASE64.encode(self.to_bytes())
    }

    /// Parse the text form.
    ///
    /// # Errors
    /// - `MalformedEnvelope` if the text is not Base64 or too short
    pub fn decode(blob: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(blob)
            .map_err(|_| Error::MalformedEnvelope("invalid base64".to_string()))?;
        Self::from_bytes(&bytes)
    }
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LENGTH {
        return Err(Error::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: key.len(),
        });
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| Error::InvalidKeyLength {
        expected: KEY_LENGTH,
        actual: key.len(),
    })
}

/// Encrypt into an envelope, binding `aad` into the tag.
///
/// # Errors
/// - `InvalidKeyLength` if key is not KEY_LENGTH bytes
pub fn seal(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Envelope> {
    let cipher = cipher(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, aad, &mut buffer)
        .map_err(|_| Error::Crypto("Encryption failed".to_string()))?;

    let mut envelope = Envelope {
        nonce: [0u8; NONCE_SIZE],
        tag: [0u8; TAG_SIZE],
        ciphertext: buffer,
    };
    envelope.nonce.copy_from_slice(&nonce);
    envelope.tag.copy_from_slice(&tag);
    Ok(envelope)
}

/// Verify and decrypt an envelope.
///
/// # Errors
/// - `InvalidKeyLength` if key is not KEY_LENGTH bytes
/// - `AuthenticationFailed` for a wrong key, wrong `aad` or any tampering;
///   no plaintext is returned in that case
pub fn open(key: &[u8], envelope: &Envelope, aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;

    let mut buffer = envelope.ciphertext.clone();
    match cipher.decrypt_in_place_detached(
        Nonce::from_slice(&envelope.nonce),
        aad,
        &mut buffer,
        Tag::from_slice(&envelope.tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(Error::AuthenticationFailed)
        }
    }
}

/// Encrypt plaintext into the Base64 envelope text.
///
/// # Preconditions
/// - `key` must be exactly KEY_LENGTH bytes
/// - `plaintext` can be any size, including empty
///
/// # Postconditions
/// - Returns `Base64(nonce ‖ tag ‖ ciphertext)`
/// - The nonce is randomly generated
///
/// # Errors
/// - `InvalidKeyLength` if key length is incorrect
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<String> {
    encrypt_with_aad(key, plaintext, &[])
}

/// Decrypt the Base64 envelope text.
///
/// # Errors
/// - `InvalidKeyLength` if key length is incorrect
/// - `MalformedEnvelope` if the blob is not Base64 or shorter than
///   nonce + tag
/// - `AuthenticationFailed` if the tag does not verify
pub fn decrypt(key: &[u8], blob: &str) -> Result<Vec<u8>> {
    decrypt_with_aad(key, blob, &[])
}

/// [`encrypt`] with associated data bound into the tag.
pub fn encrypt_with_aad(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<String> {
    Ok(seal(key, plaintext, aad)?.encode())
}

/// [`decrypt`] with associated data that must match the encryption call.
pub fn decrypt_with_aad(key: &[u8], blob: &str, aad: &[u8]) -> Result<Vec<u8>> {
    // Key errors are caller bugs and are reported before parsing.
    cipher(key)?;
    let envelope = Envelope::decode(blob)?;
    open(key, &envelope, aad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::Aead;
    use proptest::prelude::*;

    const KEY: [u8; KEY_LENGTH] = [42u8; KEY_LENGTH];

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"Hello, World!";

        let blob = encrypt(&KEY, plaintext).unwrap();
        let decrypted = decrypt(&KEY, &blob).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_envelope_size() {
        let plaintext = b"Test message";

        let blob = encrypt(&KEY, plaintext).unwrap();
        let bytes = BASE64.decode(&blob).unwrap();

        assert_eq!(bytes.len(), NONCE_SIZE + TAG_SIZE + plaintext.len());
    }

    #[test]
    fn test_layout_is_nonce_tag_ciphertext() {
        let plaintext = b"layout check";
        let envelope = seal(&KEY, plaintext, &[]).unwrap();
        let bytes = envelope.to_bytes();

        assert_eq!(&bytes[..NONCE_SIZE], envelope.nonce());
        assert_eq!(&bytes[NONCE_SIZE..MIN_ENVELOPE_SIZE], envelope.tag());

        // A stock AES-GCM implementation expects ciphertext ‖ tag.
        let mut combined = envelope.ciphertext().to_vec();
        combined.extend_from_slice(envelope.tag());
        let cipher = Aes256Gcm::new_from_slice(&KEY).unwrap();
        let decrypted = cipher
            .decrypt(Nonce::from_slice(envelope.nonce()), combined.as_slice())
            .unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_different_nonce_each_time() {
        let plaintext = b"Same plaintext";

        let ct1 = seal(&KEY, plaintext, &[]).unwrap();
        let ct2 = seal(&KEY, plaintext, &[]).unwrap();

        assert_ne!(ct1.nonce(), ct2.nonce());
        assert_ne!(ct1.encode(), ct2.encode());
    }

    #[test]
    fn test_wrong_key_fails() {
        let key2 = [2u8; KEY_LENGTH];

        let blob = encrypt(&KEY, b"Secret data").unwrap();

        assert!(matches!(
            decrypt(&key2, &blob),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut bytes = BASE64.decode(encrypt(&KEY, b"Important data").unwrap()).unwrap();
        bytes[MIN_ENVELOPE_SIZE + 5] ^= 0xFF;

        assert!(matches!(
            decrypt(&KEY, &BASE64.encode(&bytes)),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let mut bytes = BASE64.decode(encrypt(&KEY, b"Important data").unwrap()).unwrap();
        bytes.pop();

        assert!(matches!(
            decrypt(&KEY, &BASE64.encode(&bytes)),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = [0u8; 16];

        assert!(matches!(
            encrypt(&short_key, b"data"),
            Err(Error::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: 16
            })
        ));
        let blob = encrypt(&KEY, b"data").unwrap();
        assert!(matches!(
            decrypt(&short_key, &blob),
            Err(Error::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn test_short_blob_is_malformed() {
        let blob = BASE64.encode([0u8; MIN_ENVELOPE_SIZE - 1]);

        assert!(matches!(
            decrypt(&KEY, &blob),
            Err(Error::MalformedEnvelope(_))
        ));
        assert!(matches!(decrypt(&KEY, ""), Err(Error::MalformedEnvelope(_))));
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        assert!(matches!(
            decrypt(&KEY, "not base64 at all!"),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_minimum_length_blob_authenticates() {
        // Exactly nonce + tag bytes parses, then fails the tag check.
        let blob = BASE64.encode([0u8; MIN_ENVELOPE_SIZE]);
        assert!(matches!(
            decrypt(&KEY, &blob),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_empty_plaintext() {
        let blob = encrypt(&KEY, b"").unwrap();
        let decrypted = decrypt(&KEY, &blob).unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_aad_must_match() {
        let blob = encrypt_with_aad(&KEY, b"notes", b"account:7").unwrap();

        assert_eq!(decrypt_with_aad(&KEY, &blob, b"account:7").unwrap(), b"notes");
        assert!(matches!(
            decrypt_with_aad(&KEY, &blob, b"account:8"),
            Err(Error::AuthenticationFailed)
        ));
        assert!(matches!(decrypt(&KEY, &blob), Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_large_plaintext() {
        let plaintext = vec![0xABu8; 1_000_000]; // 1 MB

        let blob = encrypt(&KEY, &plaintext).unwrap();
        let decrypted = decrypt(&KEY, &blob).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..512)) {
            let blob = encrypt(&KEY, &plaintext).unwrap();
            prop_assert_eq!(decrypt(&KEY, &blob).unwrap(), plaintext);
        }

        #[test]
        fn prop_single_bit_flip_detected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..64),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut bytes = seal(&KEY, &plaintext, &[]).unwrap().to_bytes();
            let index = position.index(bytes.len());
            bytes[index] ^= 1 << bit;

            let result = decrypt(&KEY, &BASE64.encode(&bytes));
            prop_assert!(matches!(result, Err(Error::AuthenticationFailed)));
        }

        #[test]
        fn prop_stored_text_bit_flip_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..64),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut text = encrypt(&KEY, &plaintext).unwrap().into_bytes();
            let index = position.index(text.len());
            text[index] ^= 1 << bit;
            let tampered = String::from_utf8_lossy(&text);

            // A flipped character either stops being Base64 or decodes to
            // bytes that fail the tag check.
            let result = decrypt(&KEY, &tampered);
            prop_assert!(matches!(
                result,
                Err(Error::AuthenticationFailed) | Err(Error::MalformedEnvelope(_))
            ));
        }
    }
}
