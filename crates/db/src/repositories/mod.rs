//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod connection_activity_repo;
pub mod connection_repo;
pub mod connection_request_repo;
pub mod direct_chat_repo;
pub mod trust_proposal_repo;
pub mod user_block_repo;
pub mod user_repo;

pub use connection_activity_repo::ConnectionActivityRepo;
pub use connection_repo::ConnectionRepo;
pub use connection_request_repo::ConnectionRequestRepo;
pub use direct_chat_repo::DirectChatRepo;
pub use trust_proposal_repo::TrustProposalRepo;
pub use user_block_repo::UserBlockRepo;
pub use user_repo::UserRepo;
