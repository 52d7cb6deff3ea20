//! WXC wire format
//!
//! This module provides the packet layout, typed packet variants, and
//! error types for the WXC link layer.

mod error;
mod packet;

pub use error::{Error, Result, WireError};
pub use packet::{
    ACK_PACKET_LEN, ACK_SUMMARY_LEN, AckInfo, DATA_HEADER_LEN, DataBlock, FLAG_HAS_ACK, KIND_ACK,
    KIND_DATA, NO_INDEX, Packet,
};

/// Maximum block count supported by the reception bitmap
pub const MAX_BLOCKS: usize = 256;

/// Default block size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 64;
