//! Real-time session infrastructure.
//!
//! - [`registry`] -- which users are online, on how many sessions.
//! - [`delivery`] -- the event router that fans events out to sessions.
//! - the HTTP upgrade handler and heartbeat task.

pub mod delivery;
mod handler;
mod heartbeat;
pub mod registry;

pub use delivery::{DeliveryOutcome, EventRouter};
pub use handler::{ws_handler, SessionUser};
pub use heartbeat::start_heartbeat;
pub use registry::{SessionId, SessionRegistry};
