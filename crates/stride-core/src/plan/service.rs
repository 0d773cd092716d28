//! Plan service layer.
//!
//! Every multi-row write runs inside one transaction that first locks the
//! user's row, so a failure leaves nothing behind and concurrent edits for
//! the same user are serialized.

use anyhow::Context;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use stride_db::models::{
    FitnessLevel, PlannedWorkout, SelectedWorkout, User, WeekStress, Workout,
};
use stride_db::queries::selections::{self, NewSelection};
use stride_db::queries::{users, workouts};

use crate::budget::{StressBudgets, UserConstraints, validate_sessions_per_week, validate_week_number};
use crate::error::{PlanError, Result};
use crate::graph::{PlanGraph, build_graph};
use crate::rng::RandomSource;

use super::generate::{WeeklyPlan, generate_plan};

/// A user together with the plan just generated and persisted for them.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedPlan {
    pub user: User,
    pub plan: WeeklyPlan,
    /// Rows written for `plan`, in week then position order.
    pub selections: Vec<SelectedWorkout>,
}

pub async fn list_catalog(pool: &PgPool) -> Result<Vec<Workout>> {
    Ok(workouts::list_workouts(pool).await?)
}

async fn require_user(pool: &PgPool, user_id: Uuid) -> Result<User> {
    users::get_user(pool, user_id)
        .await?
        .ok_or_else(|| PlanError::not_found(format!("user {user_id} not found")))
}

async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> Result<User> {
    users::lock_user(conn, user_id)
        .await?
        .ok_or_else(|| PlanError::not_found(format!("user {user_id} not found")))
}

/// Fitness level, sessions per week, and stress budget for a user.
pub async fn get_constraints(
    pool: &PgPool,
    user_id: Uuid,
    budgets: &StressBudgets,
) -> Result<UserConstraints> {
    let user = require_user(pool, user_id).await?;
    Ok(UserConstraints::for_user(&user, budgets))
}

async fn persist_plan(
    conn: &mut PgConnection,
    user_id: Uuid,
    plan: &WeeklyPlan,
) -> Result<Vec<SelectedWorkout>> {
    let mut rows = Vec::with_capacity(plan.len());
    for (week_number, slot) in plan.slots() {
        let row = selections::insert_selection(
            &mut *conn,
            &NewSelection {
                user_id,
                workout_id: &slot.workout.workout_id,
                week_number,
                position_in_week: slot.position_in_week,
            },
        )
        .await?;
        rows.push(row);
    }
    Ok(rows)
}

/// Create a user and generate their four-week plan.
///
/// The user row and every selection are written in a single transaction.
/// If any insert fails the whole operation rolls back and no user exists.
pub async fn create_user_with_plan<R>(
    pool: &PgPool,
    fitness_level: FitnessLevel,
    sessions_per_week: i32,
    budgets: &StressBudgets,
    rng: &mut R,
) -> Result<CreatedPlan>
where
    R: RandomSource + ?Sized,
{
    validate_sessions_per_week(sessions_per_week)?;
    budgets.validate()?;

    let catalog = workouts::list_workouts(pool).await?;
    let plan = generate_plan(
        &catalog,
        budgets.for_level(fitness_level),
        sessions_per_week,
        rng,
    )?;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let user = users::insert_user(&mut *tx, fitness_level, sessions_per_week).await?;
    let rows = persist_plan(&mut tx, user.user_id, &plan).await?;

    tx.commit().await.context("failed to commit transaction")?;

    info!(
        user_id = %user.user_id,
        fitness_level = %fitness_level,
        sessions_per_week,
        selections = rows.len(),
        "created user with plan"
    );

    Ok(CreatedPlan {
        user,
        plan,
        selections: rows,
    })
}

/// Replace an existing user's plan with a freshly generated one.
///
/// Live selections are marked removed and the new plan inserted in the same
/// transaction, under the user's row lock.
pub async fn generate_plan_for_user<R>(
    pool: &PgPool,
    user_id: Uuid,
    budgets: &StressBudgets,
    rng: &mut R,
) -> Result<CreatedPlan>
where
    R: RandomSource + ?Sized,
{
    budgets.validate()?;
    let catalog = workouts::list_workouts(pool).await?;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let user = lock_user(&mut tx, user_id).await?;

    let constraints = UserConstraints::for_user(&user, budgets);
    let plan = generate_plan(
        &catalog,
        constraints.stress_budget,
        constraints.sessions_per_week,
        rng,
    )?;

    let cleared = selections::remove_all_for_user(&mut *tx, user_id).await?;
    let rows = persist_plan(&mut tx, user_id, &plan).await?;

    tx.commit().await.context("failed to commit transaction")?;

    info!(
        %user_id,
        cleared,
        selections = rows.len(),
        "regenerated plan"
    );

    Ok(CreatedPlan {
        user,
        plan,
        selections: rows,
    })
}

/// Put a workout at an explicit week and slot.
///
/// The slot must lie within the user's sessions per week and be free, and
/// the workout must fit the week's remaining stress budget.
pub async fn place_workout(
    pool: &PgPool,
    user_id: Uuid,
    workout_id: &str,
    week_number: i32,
    position_in_week: i32,
    budgets: &StressBudgets,
) -> Result<SelectedWorkout> {
    validate_week_number(week_number)?;
    let workout = require_workout(pool, workout_id).await?;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let user = lock_user(&mut tx, user_id).await?;

    if !(1..=user.sessions_per_week).contains(&position_in_week) {
        return Err(PlanError::validation(format!(
            "position must be between 1 and {}, got {position_in_week}",
            user.sessions_per_week
        )));
    }

    let used = selections::live_positions(&mut *tx, user_id, week_number).await?;
    if used.contains(&position_in_week) {
        return Err(PlanError::validation(format!(
            "week {week_number} position {position_in_week} is already taken"
        )));
    }
    check_budget(&mut tx, &user, week_number, &workout, budgets).await?;

    let row = selections::insert_selection(
        &mut *tx,
        &NewSelection {
            user_id,
            workout_id,
            week_number,
            position_in_week,
        },
    )
    .await?;

    tx.commit().await.context("failed to commit transaction")?;
    Ok(row)
}

/// Reject `workout` when it would push `week_number` over the user's budget.
async fn check_budget(
    conn: &mut PgConnection,
    user: &User,
    week_number: i32,
    workout: &Workout,
    budgets: &StressBudgets,
) -> Result<()> {
    let budget = budgets.for_level(user.fitness_level);
    let current = selections::week_stress(&mut *conn, user.user_id, week_number).await?;
    if current + i64::from(workout.stress) > i64::from(budget) {
        return Err(PlanError::validation(format!(
            "adding {:?} (stress {}) to week {week_number} would exceed \
             the stress budget of {budget} (current {current})",
            workout.workout_id, workout.stress
        )));
    }
    Ok(())
}

async fn require_workout(pool: &PgPool, workout_id: &str) -> Result<Workout> {
    workouts::get_workout(pool, workout_id)
        .await?
        .ok_or_else(|| PlanError::not_found(format!("workout {workout_id:?} not found")))
}

/// Add a workout to the lowest free slot of a week.
///
/// Returns `None` when the week already holds `sessions_per_week` workouts,
/// whatever the workout's stress. Otherwise fails with a validation error
/// when the workout would push the week over the user's stress budget.
pub async fn add_workout(
    pool: &PgPool,
    user_id: Uuid,
    week_number: i32,
    workout_id: &str,
    budgets: &StressBudgets,
) -> Result<Option<SelectedWorkout>> {
    validate_week_number(week_number)?;
    let workout = require_workout(pool, workout_id).await?;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let user = lock_user(&mut tx, user_id).await?;

    let used = selections::live_positions(&mut *tx, user_id, week_number).await?;
    if selections::next_free_position(&used, user.sessions_per_week).is_none() {
        debug!(%user_id, week = week_number, "week is full, nothing added");
        return Ok(None);
    }
    check_budget(&mut tx, &user, week_number, &workout, budgets).await?;

    let inserted =
        selections::insert_next_slot_locked(&mut tx, &user, week_number, workout_id).await?;

    tx.commit().await.context("failed to commit transaction")?;

    if let Some(row) = &inserted {
        debug!(
            %user_id,
            week = week_number,
            position = row.position_in_week,
            workout_id,
            "added workout"
        );
    }
    Ok(inserted)
}

/// Logically remove one selection. The row is kept for history.
pub async fn remove_workout(
    pool: &PgPool,
    user_id: Uuid,
    selected_id: Uuid,
    workout_id: &str,
) -> Result<()> {
    if selections::mark_removed(pool, user_id, selected_id, workout_id).await? {
        debug!(%user_id, %selected_id, workout_id, "removed workout");
        Ok(())
    } else {
        Err(PlanError::not_found(format!(
            "selection {selected_id} for workout {workout_id:?} not found for user {user_id}"
        )))
    }
}

/// Live selections of a user, joined with their catalog workouts.
pub async fn list_selections(pool: &PgPool, user_id: Uuid) -> Result<Vec<PlannedWorkout>> {
    require_user(pool, user_id).await?;
    Ok(selections::list_selections_for_user(pool, user_id, false).await?)
}

/// Build the plan graph from the user's live selections.
pub async fn get_plan_graph(
    pool: &PgPool,
    user_id: Uuid,
    budgets: &StressBudgets,
) -> Result<PlanGraph> {
    let constraints = get_constraints(pool, user_id, budgets).await?;
    let live = selections::list_selections_for_user(pool, user_id, false).await?;
    Ok(build_graph(&live, &constraints))
}

/// Stress sums of the live selections, one entry per non-empty week.
pub async fn week_stress_totals(pool: &PgPool, user_id: Uuid) -> Result<Vec<WeekStress>> {
    require_user(pool, user_id).await?;
    Ok(selections::week_stress_totals(pool, user_id).await?)
}
