//! Database query functions for the `users` table.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{FitnessLevel, User};

/// Insert a new user. Returns the row with the server-generated ID.
pub async fn insert_user<'e, E>(
    executor: E,
    fitness_level: FitnessLevel,
    sessions_per_week: i32,
) -> Result<User>
where
    E: PgExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (fitness_level, sessions_per_week) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(fitness_level)
    .bind(sessions_per_week)
    .fetch_one(executor)
    .await
    .context("failed to insert user")?;

    Ok(user)
}

/// Fetch a user by ID.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user")?;

    Ok(user)
}

/// Fetch a user and take a row lock on it for the rest of the transaction.
///
/// Every mutation of a user's plan goes through this lock, so two requests
/// for the same user never compute free slots from the same snapshot.
pub async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .context("failed to lock user")?;

    Ok(user)
}
