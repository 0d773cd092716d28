//! Request-facing actions.
//!
//! Each action validates its input, calls the plan service, and folds the
//! outcome into an [`ActionResult`]. Actions never return `Err`; failures
//! are logged here and reported through `success: false` and `error`.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use stride_db::models::{FitnessLevel, PlannedWorkout, SelectedWorkout, WeekStress, Workout};

use crate::budget::StressBudgets;
use crate::error::{PlanError, Result};
use crate::graph::PlanGraph;
use crate::plan::{self, CreatedPlan};
use crate::rng::RandomSource;

/// Broad failure class, used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    NotFound,
    Store,
}

/// Uniform result envelope: `{success, data?, error?}`.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub kind: Option<FailureKind>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn failure(err: &PlanError) -> Self {
        let (kind, message) = match err {
            PlanError::Validation(msg) => (FailureKind::Validation, format!("Validation error: {msg}")),
            PlanError::NotFound(msg) => (FailureKind::NotFound, format!("Not found: {msg}")),
            PlanError::Store(e) => (FailureKind::Store, format!("Database error: {e:#}")),
        };
        Self {
            success: false,
            data: None,
            error: Some(message),
            kind: Some(kind),
        }
    }
}

fn settle<T>(action: &'static str, result: Result<T>) -> ActionResult<T> {
    match result {
        Ok(data) => ActionResult::ok(data),
        Err(e) => {
            error!(action, error = %e, "action failed");
            ActionResult::failure(&e)
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Fitness level as submitted: a select-list index or a level name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FitnessLevelInput {
    Index(usize),
    Name(String),
}

impl FitnessLevelInput {
    /// Resolve to a level. Numeric strings are treated as indices, since
    /// form posts send every value as text.
    pub fn resolve(&self) -> Result<FitnessLevel> {
        let by_index = |i: usize| {
            FitnessLevel::from_index(i).ok_or_else(|| {
                PlanError::validation(format!("fitness level index must be 0, 1 or 2, got {i}"))
            })
        };
        match self {
            Self::Index(i) => by_index(*i),
            Self::Name(s) => {
                let s = s.trim();
                match s.parse::<usize>() {
                    Ok(i) => by_index(i),
                    Err(_) => s
                        .to_ascii_lowercase()
                        .parse::<FitnessLevel>()
                        .map_err(|e| PlanError::validation(e.to_string())),
                }
            }
        }
    }
}

/// Body of a create-user request, JSON or form-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub fitness_level: FitnessLevelInput,
    #[serde(alias = "workout_times_per_week")]
    pub sessions_per_week: i32,
}

/// Place a workout at an explicit week and slot.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceWorkoutRequest {
    pub user_id: Uuid,
    pub workout_id: String,
    pub week_number: i32,
    pub position_in_week: i32,
}

/// Add a workout to the next free slot of a week.
#[derive(Debug, Clone, Deserialize)]
pub struct InsertWorkoutRequest {
    pub user_id: Uuid,
    pub week_number: i32,
    pub workout_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveWorkoutRequest {
    pub user_id: Uuid,
    pub selected_id: Uuid,
    pub workout_id: String,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

pub async fn get_all_workouts(pool: &PgPool) -> ActionResult<Vec<Workout>> {
    settle("get_all_workouts", plan::list_catalog(pool).await)
}

pub async fn get_selected_workouts_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> ActionResult<Vec<PlannedWorkout>> {
    settle(
        "get_selected_workouts_for_user",
        plan::list_selections(pool, user_id).await,
    )
}

/// Create a user and their plan.
pub async fn create_user<R>(
    pool: &PgPool,
    request: &CreateUserRequest,
    budgets: &StressBudgets,
    rng: &mut R,
) -> ActionResult<CreatedPlan>
where
    R: RandomSource + ?Sized,
{
    let result = match request.fitness_level.resolve() {
        Ok(level) => {
            plan::create_user_with_plan(pool, level, request.sessions_per_week, budgets, rng).await
        }
        Err(e) => Err(e),
    };
    settle("create_user", result)
}

/// Insert one explicit selection.
pub async fn plan_workout_schedule(
    pool: &PgPool,
    request: &PlaceWorkoutRequest,
    budgets: &StressBudgets,
) -> ActionResult<SelectedWorkout> {
    settle(
        "plan_workout_schedule",
        plan::place_workout(
            pool,
            request.user_id,
            &request.workout_id,
            request.week_number,
            request.position_in_week,
            budgets,
        )
        .await,
    )
}

/// Regenerate the plan of an existing user.
pub async fn add_workout_to_user_plan<R>(
    pool: &PgPool,
    user_id: Uuid,
    budgets: &StressBudgets,
    rng: &mut R,
) -> ActionResult<CreatedPlan>
where
    R: RandomSource + ?Sized,
{
    settle(
        "add_workout_to_user_plan",
        plan::generate_plan_for_user(pool, user_id, budgets, rng).await,
    )
}

/// Remove one selection. Returns the removed selection's ID.
pub async fn remove_workout_from_user_plan(
    pool: &PgPool,
    request: &RemoveWorkoutRequest,
) -> ActionResult<Uuid> {
    let result = plan::remove_workout(
        pool,
        request.user_id,
        request.selected_id,
        &request.workout_id,
    )
    .await
    .map(|()| request.selected_id);
    settle("remove_workout_from_user_plan", result)
}

/// Add a workout to the lowest free slot of a week. A full week is reported
/// as a validation failure.
pub async fn insert_workout_into_week(
    pool: &PgPool,
    request: &InsertWorkoutRequest,
    budgets: &StressBudgets,
) -> ActionResult<SelectedWorkout> {
    let result = plan::add_workout(
        pool,
        request.user_id,
        request.week_number,
        &request.workout_id,
        budgets,
    )
    .await
    .and_then(|inserted| {
        inserted.ok_or_else(|| {
            PlanError::validation(format!("week {} is already full", request.week_number))
        })
    });
    settle("insert_workout_into_week", result)
}

pub async fn get_user_stress_score(pool: &PgPool, user_id: Uuid) -> ActionResult<Vec<WeekStress>> {
    settle(
        "get_user_stress_score",
        plan::week_stress_totals(pool, user_id).await,
    )
}

pub async fn get_plan_graph(
    pool: &PgPool,
    user_id: Uuid,
    budgets: &StressBudgets,
) -> ActionResult<PlanGraph> {
    settle(
        "get_plan_graph",
        plan::get_plan_graph(pool, user_id, budgets).await,
    )
}
