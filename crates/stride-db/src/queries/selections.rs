//! Database query functions for the `selected_workouts` table.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::models::{PlannedWorkout, SelectedWorkout, User, WeekStress};
use crate::queries::users;

/// Fields needed to place a workout at an explicit week and slot.
#[derive(Debug, Clone)]
pub struct NewSelection<'a> {
    pub user_id: Uuid,
    pub workout_id: &'a str,
    pub week_number: i32,
    pub position_in_week: i32,
}

/// Insert a selection at an explicit slot.
///
/// Fails if another live selection already holds the slot.
pub async fn insert_selection<'e, E>(executor: E, new: &NewSelection<'_>) -> Result<SelectedWorkout>
where
    E: PgExecutor<'e>,
{
    let selection = sqlx::query_as::<_, SelectedWorkout>(
        "INSERT INTO selected_workouts (user_id, workout_id, week_number, position_in_week) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(new.user_id)
    .bind(new.workout_id)
    .bind(new.week_number)
    .bind(new.position_in_week)
    .fetch_one(executor)
    .await
    .with_context(|| {
        format!(
            "failed to insert selected workout {:?} at week {} position {}",
            new.workout_id, new.week_number, new.position_in_week
        )
    })?;

    Ok(selection)
}

/// Logically remove a selection. The row stays in the table.
///
/// All three identifiers must match. Returns `false` when no row matched;
/// removing an already-removed selection matches again and returns `true`.
pub async fn mark_removed(
    pool: &PgPool,
    user_id: Uuid,
    selected_id: Uuid,
    workout_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE selected_workouts SET removed = true \
         WHERE selected_id = $1 AND user_id = $2 AND workout_id = $3",
    )
    .bind(selected_id)
    .bind(user_id)
    .bind(workout_id)
    .execute(pool)
    .await
    .context("failed to mark selected workout as removed")?;

    Ok(result.rows_affected() > 0)
}

/// Logically remove every live selection of a user. Returns the number of
/// selections removed.
pub async fn remove_all_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<u64>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE selected_workouts SET removed = true \
         WHERE user_id = $1 AND NOT removed",
    )
    .bind(user_id)
    .execute(executor)
    .await
    .context("failed to clear selected workouts")?;

    Ok(result.rows_affected())
}

/// List a user's selections joined with their catalog workouts, ordered by
/// week and then position.
pub async fn list_selections_for_user(
    pool: &PgPool,
    user_id: Uuid,
    include_removed: bool,
) -> Result<Vec<PlannedWorkout>> {
    let rows = sqlx::query_as::<_, PlannedWorkout>(
        "SELECT sw.selected_id, sw.user_id, sw.workout_id, sw.week_number, \
                sw.position_in_week, sw.removed, sw.added_at, \
                w.name, w.workout_type, w.duration, w.description, w.stress \
         FROM selected_workouts sw \
         JOIN workouts w ON w.workout_id = sw.workout_id \
         WHERE sw.user_id = $1 AND ($2 OR NOT sw.removed) \
         ORDER BY sw.week_number ASC, sw.position_in_week ASC, sw.added_at ASC",
    )
    .bind(user_id)
    .bind(include_removed)
    .fetch_all(pool)
    .await
    .context("failed to list selected workouts")?;

    Ok(rows)
}

/// Total stress of the live selections in one week.
pub async fn week_stress<'e, E>(executor: E, user_id: Uuid, week_number: i32) -> Result<i64>
where
    E: PgExecutor<'e>,
{
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(w.stress), 0)::BIGINT \
         FROM selected_workouts sw \
         JOIN workouts w ON w.workout_id = sw.workout_id \
         WHERE sw.user_id = $1 AND sw.week_number = $2 AND NOT sw.removed",
    )
    .bind(user_id)
    .bind(week_number)
    .fetch_one(executor)
    .await
    .context("failed to sum weekly stress")?;

    Ok(total)
}

/// Stress totals and session counts of the live selections, one row per
/// week that has at least one selection.
pub async fn week_stress_totals(pool: &PgPool, user_id: Uuid) -> Result<Vec<WeekStress>> {
    let rows = sqlx::query_as::<_, WeekStress>(
        "SELECT sw.week_number, \
                SUM(w.stress)::BIGINT AS total_stress, \
                COUNT(*)::BIGINT AS session_count \
         FROM selected_workouts sw \
         JOIN workouts w ON w.workout_id = sw.workout_id \
         WHERE sw.user_id = $1 AND NOT sw.removed \
         GROUP BY sw.week_number \
         ORDER BY sw.week_number",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to compute weekly stress totals")?;

    Ok(rows)
}

/// Positions held by live selections in one week, ascending.
pub async fn live_positions<'e, E>(executor: E, user_id: Uuid, week_number: i32) -> Result<Vec<i32>>
where
    E: PgExecutor<'e>,
{
    let used: Vec<i32> = sqlx::query_scalar(
        "SELECT position_in_week FROM selected_workouts \
         WHERE user_id = $1 AND week_number = $2 AND NOT removed \
         ORDER BY position_in_week",
    )
    .bind(user_id)
    .bind(week_number)
    .fetch_all(executor)
    .await
    .context("failed to read occupied positions")?;

    Ok(used)
}

/// Return the lowest position in `1..=sessions_per_week` not in `used`,
/// or `None` when the week has no room left.
pub fn next_free_position(used: &[i32], sessions_per_week: i32) -> Option<i32> {
    if used.len() >= sessions_per_week.max(0) as usize {
        return None;
    }
    (1..=sessions_per_week).find(|p| !used.contains(p))
}

/// Insert into the next free slot of a week the caller has already locked.
///
/// `user` must come from [`users::lock_user`] on the same connection.
/// Returns `None` without writing when the week already holds
/// `sessions_per_week` live selections.
pub async fn insert_next_slot_locked(
    conn: &mut PgConnection,
    user: &User,
    week_number: i32,
    workout_id: &str,
) -> Result<Option<SelectedWorkout>> {
    let used = live_positions(&mut *conn, user.user_id, week_number).await?;

    let Some(position) = next_free_position(&used, user.sessions_per_week) else {
        debug!(
            user_id = %user.user_id,
            week = week_number,
            sessions = user.sessions_per_week,
            "week is full, nothing inserted"
        );
        return Ok(None);
    };

    let selection = insert_selection(
        &mut *conn,
        &NewSelection {
            user_id: user.user_id,
            workout_id,
            week_number,
            position_in_week: position,
        },
    )
    .await?;

    Ok(Some(selection))
}

/// Insert a workout into the lowest free position of a week, capped by the
/// user's sessions per week.
///
/// Runs in its own transaction under the user's row lock. Returns `None`
/// when the week is already full.
pub async fn insert_into_next_available_slot(
    pool: &PgPool,
    user_id: Uuid,
    week_number: i32,
    workout_id: &str,
) -> Result<Option<SelectedWorkout>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let user = users::lock_user(&mut *tx, user_id)
        .await?
        .with_context(|| format!("user {user_id} not found"))?;

    let inserted = insert_next_slot_locked(&mut *tx, &user, week_number, workout_id).await?;

    tx.commit().await.context("failed to commit transaction")?;

    Ok(inserted)
}
