//! WXC link-layer machinery
//!
//! Role scheduling, reception accounting, block transfer, and session
//! lifecycle on top of the wire format in [`crate::protocol`].

mod bitmap;
mod engine;
mod scheduler;
mod session;

pub use bitmap::ReceptionBitmap;
pub use engine::{BlockInfo, EngineState, Incoming, RecentSentList, TransferEngine};
pub use scheduler::{RoleScheduler, TickCounter};
pub use session::{LinkTransport, Session, SessionConfig, SessionEvents, SessionState};
