//! Error types for the sieve session boundary.
//!
//! Device and allocation failures are fatal to a session and are kept
//! distinct from input validation errors. Finding zero chains is not an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SieveError {
    #[error("device {device_id} unavailable: {message}")]
    Device { device_id: u16, message: String },

    #[error("failed to allocate sieve buffer of {words} words")]
    Allocation { words: usize },

    #[error("invalid sieve configuration: {message}")]
    Config { message: String },

    #[error("invalid prime table: {message}")]
    InvalidTable { message: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("range base offset {offset} is not a multiple of the wheel modulus")]
    MisalignedOffset { offset: u64 },
}

impl SieveError {
    /// True for errors that leave the device or its memory unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SieveError::Device { .. } | SieveError::Allocation { .. }
        )
    }
}

pub type Result<T, E = SieveError> = std::result::Result<T, E>;
