//! WXC packet layout and codec
//!
//! Every frame is parsed into a typed [`Packet`] before any protocol
//! logic runs, so malformed input is rejected at the boundary. There is
//! no checksum or sequence number beyond the block index: the layer
//! below delivers whole addressable frames but makes no integrity
//! guarantee, and this layer deliberately adds none.

use bytes::Bytes;

use super::error::WireError;

/// Kind byte for data-block packets
pub const KIND_DATA: u8 = 0x01;
/// Kind byte for acknowledgment packets
pub const KIND_ACK: u8 = 0x02;

/// Sentinel block index meaning "no index" (complete, or nothing wanted)
pub const NO_INDEX: u16 = 0xFFFF;

/// Flag bit: a data packet carries a piggybacked ack summary
pub const FLAG_HAS_ACK: u8 = 1 << 0;

/// Fixed part of a data packet: kind, flags, payload id, index, total
pub const DATA_HEADER_LEN: usize = 1 + 1 + 4 + 2 + 2;
/// Encoded size of an ack summary
pub const ACK_SUMMARY_LEN: usize = 4 + 2 + 2;
/// Encoded size of a standalone ack packet
pub const ACK_PACKET_LEN: usize = 1 + 1 + ACK_SUMMARY_LEN;

/// Reception summary, sent standalone or piggybacked on data packets.
///
/// `next_missing` is the index the sender of this summary wants next;
/// [`NO_INDEX`] when the transfer is complete or no gap is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckInfo {
    /// Payload identifier/version tag the summary refers to
    pub payload_id: u32,
    /// Blocks still missing on the summary sender's side
    pub remaining: u16,
    /// First gap the summary sender wants filled, or [`NO_INDEX`]
    pub next_missing: u16,
}

impl AckInfo {
    /// Whether the summary declares the transfer complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.payload_id.to_le_bytes());
        out.extend_from_slice(&self.remaining.to_le_bytes());
        out.extend_from_slice(&self.next_missing.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < ACK_SUMMARY_LEN {
            return Err(WireError::FrameTooShort {
                needed: ACK_SUMMARY_LEN,
                got: buf.len(),
            });
        }
        Ok(Self {
            payload_id: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            remaining: u16::from_le_bytes(buf[4..6].try_into().unwrap()),
            next_missing: u16::from_le_bytes(buf[6..8].try_into().unwrap()),
        })
    }
}

/// One block of a multi-block payload.
///
/// The block bytes are exactly the negotiated block size; the last block
/// of a payload is zero-padded by the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    /// Payload identifier/version tag
    pub payload_id: u32,
    /// Index of this block within the payload
    pub index: u16,
    /// Total block count of the payload
    pub total: u16,
    /// Piggybacked reception summary for the sender's own inbound side
    pub ack: Option<AckInfo>,
    /// Block contents
    pub block: Bytes,
}

/// Typed view of a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Carries one payload block
    Data(DataBlock),
    /// Carries only a reception summary
    Ack(AckInfo),
    /// Structurally valid frame with an unrecognized kind byte
    Unknown {
        /// The kind byte found on the wire
        kind: u8,
    },
}

impl Packet {
    /// Encode the packet to wire bytes.
    ///
    /// The engine only ever builds `Data` and `Ack` for transmission.
    /// `Unknown` re-encodes as its bare kind byte plus a zero flags byte
    /// so every decoded packet stays round-trippable.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Data(data) => {
                let ack_len = if data.ack.is_some() { ACK_SUMMARY_LEN } else { 0 };
                let mut out = Vec::with_capacity(DATA_HEADER_LEN + ack_len + data.block.len());
                out.push(KIND_DATA);
                out.push(if data.ack.is_some() { FLAG_HAS_ACK } else { 0 });
                out.extend_from_slice(&data.payload_id.to_le_bytes());
                out.extend_from_slice(&data.index.to_le_bytes());
                out.extend_from_slice(&data.total.to_le_bytes());
                if let Some(ack) = &data.ack {
                    ack.encode_into(&mut out);
                }
                out.extend_from_slice(&data.block);
                out
            }
            Self::Ack(ack) => {
                let mut out = Vec::with_capacity(ACK_PACKET_LEN);
                out.push(KIND_ACK);
                out.push(0);
                ack.encode_into(&mut out);
                out
            }
            Self::Unknown { kind } => vec![*kind, 0],
        }
    }

    /// Decode a frame into a typed packet.
    ///
    /// Truncated or ill-framed input yields a [`WireError`]; a valid
    /// frame with an unknown kind byte yields [`Packet::Unknown`] so the
    /// caller can drop it without treating it as corruption.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < 2 {
            return Err(WireError::FrameTooShort {
                needed: 2,
                got: buf.len(),
            });
        }
        let kind = buf[0];
        let flags = buf[1];
        match kind {
            KIND_DATA => {
                if buf.len() < DATA_HEADER_LEN {
                    return Err(WireError::FrameTooShort {
                        needed: DATA_HEADER_LEN,
                        got: buf.len(),
                    });
                }
                let payload_id = u32::from_le_bytes(buf[2..6].try_into().unwrap());
                let index = u16::from_le_bytes(buf[6..8].try_into().unwrap());
                let total = u16::from_le_bytes(buf[8..10].try_into().unwrap());
                let mut offset = DATA_HEADER_LEN;
                let ack = if flags & FLAG_HAS_ACK != 0 {
                    let ack = AckInfo::decode(&buf[offset..])?;
                    offset += ACK_SUMMARY_LEN;
                    Some(ack)
                } else {
                    None
                };
                Ok(Self::Data(DataBlock {
                    payload_id,
                    index,
                    total,
                    ack,
                    block: Bytes::copy_from_slice(&buf[offset..]),
                }))
            }
            KIND_ACK => {
                if buf.len() != ACK_PACKET_LEN {
                    return Err(WireError::LengthMismatch {
                        expected: ACK_PACKET_LEN,
                        got: buf.len(),
                    });
                }
                Ok(Self::Ack(AckInfo::decode(&buf[2..])?))
            }
            other => Ok(Self::Unknown { kind: other }),
        }
    }
}
