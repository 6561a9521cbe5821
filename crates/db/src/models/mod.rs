//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and, where rows are created from outside the module, a
//! create DTO.

pub mod activity;
pub mod block;
pub mod connection;
pub mod connection_request;
pub mod direct_chat;
pub mod trust_proposal;
pub mod user;
