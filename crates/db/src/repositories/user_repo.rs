//! Repository for the `users` directory table.

use sqlx::PgPool;
use kinship_core::types::DbId;

use crate::models::user::{CreateUser, User};

/// Column list for `users` queries.
const COLUMNS: &str = "id, display_name, email, pin, created_at, updated_at";

/// Provides lookups used by discovery.
pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (display_name, email, pin) VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.display_name)
            .bind(&input.email)
            .bind(&input.pin)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_id_by_pin(pool: &PgPool, pin: &str) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM users WHERE pin = $1")
            .bind(pin)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_id_by_email(pool: &PgPool, email: &str) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Replace a user's PIN. Returns `true` if the user exists.
    pub async fn update_pin(pool: &PgPool, id: DbId, pin: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET pin = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(pin)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
