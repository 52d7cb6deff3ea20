//! Block transfer engine.
//!
//! Orchestrates the request/acknowledge exchange for a payload broken
//! into fixed-size blocks. The scheduler decides whose turn it is; this
//! engine decides what goes on the wire for that turn and folds inbound
//! frames into the reception bitmap. Loss is absorbed as normal
//! operation: a block counts as delivered only when a future inbound
//! summary confirms it, never at send time.

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{debug, trace};

use super::bitmap::ReceptionBitmap;
use crate::protocol::{AckInfo, DataBlock, Error, MAX_BLOCKS, NO_INDEX, Packet, Result};

/// One side's view of a payload transfer.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    payload_id: u32,
    block_size: usize,
    total: u16,
    data: Bytes,
}

impl BlockInfo {
    /// Describe an outgoing payload split into `block_size` chunks.
    pub fn new(payload_id: u32, block_size: usize, data: Bytes) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig {
                reason: "block size must be non-zero",
            });
        }
        let needed = data.len().div_ceil(block_size).max(1);
        if needed > MAX_BLOCKS {
            return Err(Error::PayloadTooLarge {
                len: data.len(),
                needed,
                max: MAX_BLOCKS,
            });
        }
        Ok(Self {
            payload_id,
            block_size,
            total: needed as u16,
            data,
        })
    }

    /// Payload identifier/version tag.
    #[must_use]
    pub const fn payload_id(&self) -> u32 {
        self.payload_id
    }

    /// Total block count.
    #[must_use]
    pub const fn total(&self) -> u16 {
        self.total
    }

    /// Negotiated block size in bytes.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// The bytes of one block, zero-padded when the payload length is
    /// not an exact multiple of the block size.
    #[must_use]
    pub fn block(&self, index: u16) -> Bytes {
        let start = usize::from(index) * self.block_size;
        let end = start + self.block_size;
        if end <= self.data.len() {
            self.data.slice(start..end)
        } else {
            let mut padded = vec![0u8; self.block_size];
            if start < self.data.len() {
                padded[..self.data.len() - start].copy_from_slice(&self.data[start..]);
            }
            Bytes::from(padded)
        }
    }
}

/// Small ring of recently transmitted block indices, consulted so
/// back-to-back turns do not keep re-sending the same block while other
/// blocks remain unacknowledged.
#[derive(Debug)]
pub struct RecentSentList {
    entries: VecDeque<u16>,
    capacity: usize,
}

impl RecentSentList {
    /// Create a ring holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a transmitted index, evicting the oldest when full.
    pub fn push(&mut self, index: u16) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(index);
    }

    /// Whether `index` was transmitted recently.
    #[must_use]
    pub fn contains(&self, index: u16) -> bool {
        self.entries.contains(&index)
    }
}

/// Engine lifecycle per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No exchange observed yet
    Idle,
    /// Blocks moving in at least one direction
    Exchanging,
    /// Both the inbound payload and the peer's copy of ours are whole
    Complete,
}

/// Outcome of folding one inbound frame into the engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Incoming {
    /// Index of a newly accepted block, if any
    pub accepted: Option<u16>,
    /// The inbound payload just became complete (reported exactly once)
    pub completed: bool,
    /// The peer just confirmed holding our whole payload (edge)
    pub peer_acked_all: bool,
}

/// Builds outgoing packets and folds inbound ones for a single session.
#[derive(Debug)]
pub struct TransferEngine {
    outgoing: BlockInfo,
    inbound: ReceptionBitmap,
    inbound_id: Option<u32>,
    assembly: Vec<u8>,
    recent: RecentSentList,
    next_unsent: u16,
    last_sent: u16,
    last_accepted: u16,
    peer_next_missing: Option<u16>,
    peer_complete: bool,
    completion_reported: bool,
    final_ack_sent: bool,
    state: EngineState,
}

impl TransferEngine {
    /// Create an engine sending `outgoing` and awaiting the peer's
    /// mirror payload.
    #[must_use]
    pub fn new(outgoing: BlockInfo, recent_capacity: usize) -> Self {
        let last_sent = outgoing.total() - 1;
        Self {
            outgoing,
            inbound: ReceptionBitmap::new(0),
            inbound_id: None,
            assembly: Vec::new(),
            recent: RecentSentList::new(recent_capacity),
            next_unsent: 0,
            last_sent,
            last_accepted: 0,
            peer_next_missing: None,
            peer_complete: false,
            completion_reported: false,
            final_ack_sent: false,
            state: EngineState::Idle,
        }
    }

    /// Current engine state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Whether the inbound payload has been fully received.
    #[must_use]
    pub fn inbound_complete(&self) -> bool {
        self.inbound_id.is_some() && self.inbound.is_complete()
    }

    /// Whether the peer has confirmed holding our whole payload.
    #[must_use]
    pub const fn peer_has_all(&self) -> bool {
        self.peer_complete
    }

    /// Whether a completion acknowledgment still needs to reach the
    /// peer. Consulted by the session to decide on a drain phase.
    #[must_use]
    pub fn completion_pending_flush(&self) -> bool {
        self.inbound_complete() && !self.final_ack_sent
    }

    /// The reassembled inbound payload once complete, zero-padded to a
    /// whole number of blocks (the receiver does not learn the exact
    /// payload length from the wire).
    #[must_use]
    pub fn received_payload(&self) -> Option<&[u8]> {
        self.inbound_complete().then_some(self.assembly.as_slice())
    }

    /// Outgoing payload description.
    #[must_use]
    pub const fn outgoing(&self) -> &BlockInfo {
        &self.outgoing
    }

    /// Build the packet for this turn, if there is anything to say.
    ///
    /// Parent turns carry a block chosen to fill the peer's gaps; child
    /// turns (and parent turns after the peer reported completion) carry
    /// a standalone reception summary. Before any peer data has been
    /// seen the child has nothing to acknowledge and stays silent.
    pub fn build_outgoing(&mut self, is_parent: bool) -> Option<Packet> {
        if is_parent && !self.peer_complete {
            let index = self.select_block();
            self.recent.push(index);
            self.last_sent = index;
            if self.state == EngineState::Idle {
                self.state = EngineState::Exchanging;
            }
            let ack = self.reception_summary();
            if ack.is_some_and(|summary| summary.is_complete()) {
                self.final_ack_sent = true;
            }
            trace!(
                index,
                payload_id = self.outgoing.payload_id(),
                piggyback = ack.is_some(),
                "sending block"
            );
            return Some(Packet::Data(DataBlock {
                payload_id: self.outgoing.payload_id(),
                index,
                total: self.outgoing.total(),
                ack,
                block: self.outgoing.block(index),
            }));
        }

        let summary = self.reception_summary()?;
        if summary.is_complete() {
            self.final_ack_sent = true;
        }
        trace!(
            payload_id = summary.payload_id,
            remaining = summary.remaining,
            "sending reception summary"
        );
        Some(Packet::Ack(summary))
    }

    /// Summary of our own reception side, or `None` before any inbound
    /// payload has been seen (there is nothing to acknowledge yet). The
    /// gap scan starts after the last accepted index so consecutive
    /// summaries request different blocks.
    fn reception_summary(&self) -> Option<AckInfo> {
        let payload_id = self.inbound_id?;
        Some(AckInfo {
            payload_id,
            remaining: self.inbound.remaining(),
            next_missing: self
                .inbound
                .next_missing(self.last_accepted)
                .unwrap_or(NO_INDEX),
        })
    }

    /// Fold one inbound frame into the engine.
    ///
    /// Malformed frames are dropped silently: corruption is an expected
    /// condition on the link, never fatal.
    pub fn handle_incoming(&mut self, frame: &[u8]) -> Incoming {
        let packet = match Packet::decode(frame) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(%err, "dropping malformed frame");
                return Incoming::default();
            }
        };
        match packet {
            Packet::Data(data) => self.handle_data(&data),
            Packet::Ack(ack) => Incoming {
                peer_acked_all: self.apply_ack(&ack),
                ..Incoming::default()
            },
            Packet::Unknown { kind } => {
                debug!(kind, "dropping frame with unknown kind");
                Incoming::default()
            }
        }
    }

    fn handle_data(&mut self, data: &DataBlock) -> Incoming {
        let mut outcome = Incoming::default();

        // The block size is negotiated per link; both directions share it.
        if data.block.len() != self.outgoing.block_size()
            || data.total == 0
            || usize::from(data.total) > MAX_BLOCKS
            || data.index >= data.total
        {
            debug!(
                index = data.index,
                total = data.total,
                len = data.block.len(),
                "dropping ill-formed data block"
            );
            return outcome;
        }

        if let Some(ack) = &data.ack {
            outcome.peer_acked_all = self.apply_ack(ack);
        }

        match self.inbound_id {
            Some(current) if current == data.payload_id => {
                if data.total != self.inbound.total() {
                    debug!(
                        payload_id = data.payload_id,
                        total = data.total,
                        expected = self.inbound.total(),
                        "dropping block with mismatched geometry"
                    );
                    return outcome;
                }
            }
            Some(stale) => {
                // The peer restarted with a new payload. Not an error:
                // the link gives no ordering guarantee that would let us
                // tell an intentional restart from anything else.
                debug!(
                    stale,
                    new = data.payload_id,
                    "payload identifier changed, discarding partial progress"
                );
                self.begin_inbound(data.payload_id, data.total);
            }
            None => {
                trace!(
                    payload_id = data.payload_id,
                    total = data.total,
                    "first block of inbound payload"
                );
                self.begin_inbound(data.payload_id, data.total);
            }
        }

        let already = self
            .inbound
            .mark_received(data.index)
            .expect("index bounds checked");
        if !already {
            let start = usize::from(data.index) * self.outgoing.block_size();
            self.assembly[start..start + self.outgoing.block_size()].copy_from_slice(&data.block);
            self.last_accepted = data.index;
            outcome.accepted = Some(data.index);
            trace!(
                index = data.index,
                remaining = self.inbound.remaining(),
                "accepted block"
            );
        }
        if self.state == EngineState::Idle {
            self.state = EngineState::Exchanging;
        }
        if self.inbound.is_complete() && !self.completion_reported {
            self.completion_reported = true;
            outcome.completed = true;
            debug!(payload_id = data.payload_id, "inbound transfer complete");
        }
        self.maybe_complete();
        outcome
    }

    fn begin_inbound(&mut self, payload_id: u32, total: u16) {
        self.inbound_id = Some(payload_id);
        self.inbound.reset(total);
        self.assembly = vec![0u8; usize::from(total) * self.outgoing.block_size()];
        self.completion_reported = false;
        self.final_ack_sent = false;
        // First gap scan starts at index 0.
        self.last_accepted = total - 1;
        self.state = EngineState::Exchanging;
    }

    fn apply_ack(&mut self, ack: &AckInfo) -> bool {
        if ack.payload_id != self.outgoing.payload_id() {
            trace!(
                payload_id = ack.payload_id,
                "ignoring summary for a different payload"
            );
            return false;
        }
        self.peer_next_missing = (ack.next_missing != NO_INDEX
            && ack.next_missing < self.outgoing.total())
        .then_some(ack.next_missing);
        if ack.is_complete() && !self.peer_complete {
            self.peer_complete = true;
            debug!(
                payload_id = ack.payload_id,
                "peer holds the full outbound payload"
            );
            self.maybe_complete();
            return true;
        }
        false
    }

    fn maybe_complete(&mut self) {
        if self.peer_complete && self.inbound_complete() {
            self.state = EngineState::Complete;
        }
    }

    /// Pick the block to transmit this turn: the peer's reported gap
    /// first (unless just sent), then the next never-sent index, then a
    /// circular retry scan that skips the recent ring.
    fn select_block(&mut self) -> u16 {
        if let Some(requested) = self.peer_next_missing {
            if requested < self.outgoing.total() && !self.recent.contains(requested) {
                return requested;
            }
        }
        if self.next_unsent < self.outgoing.total() {
            let index = self.next_unsent;
            self.next_unsent += 1;
            return index;
        }
        let total = u32::from(self.outgoing.total());
        for step in 1..=total {
            let index = ((u32::from(self.last_sent) + step) % total) as u16;
            if !self.recent.contains(index) {
                return index;
            }
        }
        // Every index is in the recent ring; fall back to plain rotation.
        (self.last_sent + 1) % self.outgoing.total()
    }
}
