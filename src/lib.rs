//! WXC link layer - multiplexing and mode arbitration for a two-role
//! short-range wireless exchange.
//!
//! This library decides, tick by tick, which role a device plays
//! (parent/sender or child/receiver), tracks partially received
//! multi-block payloads with bitmap reception accounting, and retries
//! lost blocks without a central coordinator. It sits above a
//! packet-oriented, unreliable, half-duplex link: frames may be
//! dropped, duplicated, or arrive out of order, and all of that is
//! absorbed as normal operation.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use wxc_link::{LinkTransport, Session, SessionConfig, SessionEvents};
//!
//! struct Radio;
//! impl LinkTransport for Radio {
//!     fn bind(&mut self, _channel: u8) -> wxc_link::Result<()> { Ok(()) }
//!     fn release(&mut self, _channel: u8) {}
//!     fn send(&mut self, _channel: u8, _frame: &[u8]) { /* hand to driver */ }
//! }
//!
//! struct App;
//! impl SessionEvents for App {
//!     fn on_transfer_complete(&mut self) { println!("payload received"); }
//! }
//!
//! let config = SessionConfig::default();
//! let mut session = Session::open(
//!     Radio,
//!     1,
//!     0xC0FFEE,
//!     Bytes::from_static(b"payload to exchange"),
//!     &config,
//!     || 0u32, // production: read the hardware tick counter
//! )?;
//!
//! let mut app = App;
//! // Once per display refresh interval:
//! session.tick();
//! // Whenever the driver delivers a frame (between ticks):
//! session.handle_datagram(1, &[], &mut app);
//! # Ok::<(), wxc_link::Error>(())
//! ```
//!
//! # Model
//!
//! - **No timeouts here.** A transfer that never completes is the
//!   caller's timeout policy to detect; the appropriate bound depends
//!   on payload size and link quality.
//! - **Single-threaded.** `tick` and `handle_datagram` must be
//!   serialized by the caller; inbound frames are treated as arriving
//!   strictly between two ticks.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod link;
pub mod protocol;

pub use link::{
    BlockInfo, EngineState, Incoming, LinkTransport, ReceptionBitmap, RecentSentList,
    RoleScheduler, Session, SessionConfig, SessionEvents, SessionState, TickCounter,
    TransferEngine,
};
pub use protocol::{
    AckInfo, DEFAULT_BLOCK_SIZE, DataBlock, Error, MAX_BLOCKS, NO_INDEX, Packet, Result, WireError,
};
