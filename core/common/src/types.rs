//! Common types used throughout gmvault.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Master password supplied by the caller for a single operation.
///
/// The buffer is zeroized on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Password(String);

impl Password {
    /// Wrap a password string.
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Get the UTF-8 bytes fed to the KDF.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Length in characters, as seen by the length policy.
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_debug_redacted() {
        let password = Password::from("hunter2hunter2");
        let debug = format!("{:?}", password);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_password_char_count_is_not_byte_count() {
        let password = Password::from("pässwörd");
        assert_eq!(password.char_count(), 8);
        assert_eq!(password.as_bytes().len(), 10);
    }
}
