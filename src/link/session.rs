//! Protocol session lifecycle.
//!
//! A session binds one transfer engine to a logical channel, drives the
//! role scheduler once per synchronization tick, and surfaces reception
//! progress to the caller. The model is single-threaded cooperative:
//! the caller serializes `tick` and `handle_datagram`, and inbound
//! frames are delivered strictly between two ticks.

use bytes::Bytes;
use tracing::{debug, trace};

use super::engine::{BlockInfo, TransferEngine};
use super::scheduler::{RoleScheduler, TickCounter};
use crate::protocol::{DEFAULT_BLOCK_SIZE, Error, Result};

/// Send/bind surface the session requires from the radio driver.
///
/// `send` is fire-and-forget: the protocol itself is the acknowledgment
/// layer, so no transmission confirmation is expected or used.
pub trait LinkTransport {
    /// Bind a logical channel exclusively to the caller.
    fn bind(&mut self, channel: u8) -> Result<()>;
    /// Release a previously bound channel.
    fn release(&mut self, channel: u8);
    /// Transmit one frame on a bound channel.
    fn send(&mut self, channel: u8, frame: &[u8]);
}

/// Callback surface for reception progress.
pub trait SessionEvents {
    /// A new block of the inbound payload arrived.
    fn on_block_received(&mut self, index: u16) {
        let _ = index;
    }
    /// The inbound payload is complete (fires exactly once per payload).
    fn on_transfer_complete(&mut self) {}
}

/// Session configuration, in the spirit of the transport's tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Negotiated block size in bytes, shared by both directions.
    pub block_size: usize,
    /// Capacity of the recently-sent ring used to diversify retries.
    pub recent_capacity: usize,
    /// Extra ticks spent flushing a pending completion ack on close.
    pub drain_ticks: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            recent_capacity: 4,
            drain_ticks: 2,
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfig {
                reason: "block size must be non-zero",
            });
        }
        if self.recent_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "recent-sent ring needs capacity",
            });
        }
        Ok(())
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Channel released, session inert
    Closed,
    /// Channel bound, no tick yet
    Open,
    /// A packet moved during the last tick
    Exchanging,
    /// Nothing to send during the last tick
    IdleWaiting,
    /// Flushing a pending completion ack before closing
    Draining,
}

impl SessionState {
    const fn name(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Exchanging => "exchanging",
            Self::IdleWaiting => "idle-waiting",
            Self::Draining => "draining",
        }
    }
}

/// One logical exchange bound to a channel.
#[derive(Debug)]
pub struct Session<T: LinkTransport, C: TickCounter> {
    transport: T,
    channel: u8,
    scheduler: RoleScheduler<C>,
    engine: TransferEngine,
    state: SessionState,
    drain_left: u8,
    drain_ticks: u8,
}

impl<T: LinkTransport, C: TickCounter> Session<T, C> {
    /// Bind `channel` exclusively and prepare to exchange `payload`.
    ///
    /// Fails with [`Error::ChannelBusy`] when the transport already has
    /// the channel bound to another session.
    pub fn open(
        mut transport: T,
        channel: u8,
        payload_id: u32,
        payload: Bytes,
        config: &SessionConfig,
        ticks: C,
    ) -> Result<Self> {
        config.validate()?;
        let outgoing = BlockInfo::new(payload_id, config.block_size, payload)?;
        transport.bind(channel)?;
        debug!(
            channel,
            payload_id,
            blocks = outgoing.total(),
            "session open"
        );
        Ok(Self {
            transport,
            channel,
            scheduler: RoleScheduler::new(ticks),
            engine: TransferEngine::new(outgoing, config.recent_capacity),
            state: SessionState::Open,
            drain_left: 0,
            drain_ticks: config.drain_ticks,
        })
    }

    /// Bound channel number.
    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the inbound payload has been fully received.
    #[must_use]
    pub fn transfer_complete(&self) -> bool {
        self.engine.inbound_complete()
    }

    /// Whether the peer confirmed holding our whole payload.
    #[must_use]
    pub const fn peer_has_all(&self) -> bool {
        self.engine.peer_has_all()
    }

    /// The reassembled inbound payload once complete, zero-padded to a
    /// whole number of blocks.
    #[must_use]
    pub fn received_payload(&self) -> Option<&[u8]> {
        self.engine.received_payload()
    }

    /// Force this device into the child role for every slot, e.g. for
    /// devices that already played the sender role.
    pub fn set_child_locked(&mut self, locked: bool) {
        self.scheduler.set_child_locked(locked);
    }

    /// Drive one synchronization tick: arbitrate the role, build at
    /// most one packet, and hand it to the transport.
    pub fn tick(&mut self) {
        match self.state {
            SessionState::Closed => {}
            SessionState::Draining => {
                // Keep flushing acks; the peer may have missed the one
                // that carried our completion.
                if let Some(packet) = self.engine.build_outgoing(false) {
                    self.transport.send(self.channel, &packet.encode());
                }
                self.drain_left -= 1;
                if self.drain_left == 0 {
                    self.finish_close();
                }
            }
            SessionState::Open | SessionState::Exchanging | SessionState::IdleWaiting => {
                let is_parent = self.scheduler.advance();
                match self.engine.build_outgoing(is_parent) {
                    Some(packet) => {
                        self.transport.send(self.channel, &packet.encode());
                        self.set_state(SessionState::Exchanging);
                    }
                    None => self.set_state(SessionState::IdleWaiting),
                }
            }
        }
    }

    /// Deliver one inbound frame, surfacing progress through `events`.
    ///
    /// Frames for other channels and frames arriving after close are
    /// dropped.
    pub fn handle_datagram(&mut self, channel: u8, frame: &[u8], events: &mut dyn SessionEvents) {
        if channel != self.channel {
            trace!(channel, bound = self.channel, "frame for another channel");
            return;
        }
        if self.state == SessionState::Closed {
            trace!(channel, "frame after close");
            return;
        }
        let outcome = self.engine.handle_incoming(frame);
        if let Some(index) = outcome.accepted {
            events.on_block_received(index);
        }
        if outcome.completed {
            events.on_transfer_complete();
        }
    }

    /// Close the session.
    ///
    /// When a completion acknowledgment has not yet gone out, the
    /// session spends a bounded number of extra ticks draining it so an
    /// abrupt close right at completion does not leave the peer blind;
    /// otherwise the channel is released immediately.
    pub fn close(&mut self) {
        match self.state {
            SessionState::Closed | SessionState::Draining => {}
            _ => {
                if self.engine.completion_pending_flush() && self.drain_ticks > 0 {
                    debug!(channel = self.channel, "draining final acknowledgment");
                    self.drain_left = self.drain_ticks;
                    self.set_state(SessionState::Draining);
                } else {
                    self.finish_close();
                }
            }
        }
    }

    fn finish_close(&mut self) {
        self.transport.release(self.channel);
        self.set_state(SessionState::Closed);
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            trace!(
                channel = self.channel,
                from = self.state.name(),
                to = next.name(),
                "session state change"
            );
            self.state = next;
        }
    }
}
