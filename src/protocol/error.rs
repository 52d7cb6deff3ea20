//! WXC error types

use thiserror::Error;

/// WXC protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Block index beyond the declared total
    #[error("block index out of range: {index} (total {total})")]
    OutOfRange {
        /// Offending block index
        index: u16,
        /// Declared total block count
        total: u16,
    },

    /// Channel already bound to another session
    #[error("channel {channel} is already bound")]
    ChannelBusy {
        /// Logical channel number
        channel: u8,
    },

    /// Session is not in a state that allows the operation
    #[error("session is {state}, operation requires {required}")]
    InvalidState {
        /// Current session state name
        state: &'static str,
        /// Required session state name
        required: &'static str,
    },

    /// Configuration rejected at construction
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Human-readable rejection reason
        reason: &'static str,
    },

    /// Payload does not fit the declared block geometry
    #[error("payload of {len} bytes needs {needed} blocks (max {max})")]
    PayloadTooLarge {
        /// Payload length in bytes
        len: usize,
        /// Blocks required to hold the payload
        needed: usize,
        /// Maximum supported block count
        max: usize,
    },
}

/// Wire-level decode failures.
///
/// These never surface to callers: the engine drops the offending frame
/// and logs it, since corrupt frames are an expected condition on the
/// underlying link.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Input buffer too small for the declared structure
    #[error("frame too short: need {needed} bytes, got {got}")]
    FrameTooShort {
        /// Bytes required for decoding
        needed: usize,
        /// Bytes actually provided
        got: usize,
    },

    /// Frame length does not match the fixed packet layout
    #[error("frame length {got} does not match expected {expected}")]
    LengthMismatch {
        /// Expected encoded length
        expected: usize,
        /// Actual frame length
        got: usize,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
