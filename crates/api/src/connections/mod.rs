//! Connection lifecycle orchestration.
//!
//! [`ConnectionService`] owns discovery, request handling, trust-level
//! transitions and interaction recording. Every state change is written to
//! the store first; only then are sessions notified and activity published.

mod service;

pub use service::{
    ConnectionService, ConnectionSummary, LevelUpOutcome, RelayOutcome, RespondOutcome,
};
