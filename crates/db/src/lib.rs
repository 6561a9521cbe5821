//! Persistence layer for connections, requests, blocks, and trust proposals.
//!
//! - [`models`] -- `FromRow` entity structs and create DTOs.
//! - [`repositories`] -- zero-sized `*Repo` structs taking `&PgPool`.
//! - [`store`] -- the narrow collaborator traits the connection service
//!   depends on, plus [`StoreError`].
//! - [`pg`] -- PostgreSQL implementation of those traits.
//! - [`memory`] -- in-process implementation for tests and local runs.

use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod models;
pub mod pg;
pub mod repositories;
pub mod store;

pub use memory::InMemoryStore;
pub use pg::PgStore;
pub use store::{ConnectionStore, DirectChatProvisioner, StoreError, StoreResult, UserDirectory};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
