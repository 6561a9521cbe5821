//! Kinship event payloads and activity infrastructure.
//!
//! - [`RealtimeEvent`] -- the closed set of payloads pushed to user sessions.
//! - [`EventBus`] -- in-process publish/subscribe hub for [`ActivityEvent`]s,
//!   backed by `tokio::sync::broadcast`.
//! - [`ActivityPersistence`] -- background service that writes every activity
//!   event to the `connection_activity` table.

pub mod bus;
pub mod persistence;
pub mod realtime;

pub use bus::{ActivityEvent, EventBus};
pub use persistence::ActivityPersistence;
pub use realtime::RealtimeEvent;
