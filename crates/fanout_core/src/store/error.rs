//! # Store Error Types

use thiserror::Error;

/// Errors raised by the snapshot store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A live snapshot already exists for this tick.
    #[error("snapshot for tick {0} already exists")]
    DuplicateTick(u32),

    /// Temp entity payload does not fit its 8-bit length field.
    #[error("temp entity payload too large: {len} bytes (max {max})")]
    TempEntityTooLarge {
        /// Payload length supplied.
        len: usize,
        /// Largest representable payload.
        max: usize,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
