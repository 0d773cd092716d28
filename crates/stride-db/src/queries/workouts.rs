//! Database query functions for the `workouts` catalog table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Workout;

/// List the whole catalog, ordered by type and then name.
pub async fn list_workouts(pool: &PgPool) -> Result<Vec<Workout>> {
    let workouts = sqlx::query_as::<_, Workout>(
        "SELECT * FROM workouts ORDER BY workout_type ASC, name ASC",
    )
    .fetch_all(pool)
    .await
    .context("failed to list workouts")?;

    Ok(workouts)
}

/// Fetch a single catalog workout by ID.
pub async fn get_workout(pool: &PgPool, workout_id: &str) -> Result<Option<Workout>> {
    let workout = sqlx::query_as::<_, Workout>("SELECT * FROM workouts WHERE workout_id = $1")
        .bind(workout_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch workout")?;

    Ok(workout)
}

/// Insert a catalog workout. Fails if the ID already exists.
pub async fn insert_workout(pool: &PgPool, workout: &Workout) -> Result<Workout> {
    let inserted = sqlx::query_as::<_, Workout>(
        "INSERT INTO workouts (workout_id, name, workout_type, duration, description, stress) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(&workout.workout_id)
    .bind(&workout.name)
    .bind(workout.workout_type)
    .bind(workout.duration)
    .bind(&workout.description)
    .bind(workout.stress)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert workout {:?}", workout.workout_id))?;

    Ok(inserted)
}
