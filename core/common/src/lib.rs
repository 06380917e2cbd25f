//! Common utilities and types shared across gmvault modules.
//!
//! This module provides the error taxonomy of the vault core, the
//! zeroizing password wrapper and the clock abstraction used for
//! timestamps and token expiry.

pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, PublicError, Result};
pub use types::Password;
