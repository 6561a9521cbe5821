//! Kinship domain layer.
//!
//! Zero internal dependencies: identifiers, the error taxonomy, connection
//! status types, discovery identifier parsing, and the trust-level state
//! machine. Everything here is pure and synchronous so the persistence and
//! server crates can share one definition of the rules.

#[macro_use]
mod macros;

pub mod connection;
pub mod discovery;
pub mod error;
pub mod trust;
pub mod types;
