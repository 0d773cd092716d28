use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of running workout. Every catalog entry has exactly one type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Threshold,
    Long,
    Steady,
    Hills,
    Tempo,
}

impl WorkoutType {
    /// All workout types, in declaration order.
    pub const ALL: [WorkoutType; 5] = [
        Self::Threshold,
        Self::Long,
        Self::Steady,
        Self::Hills,
        Self::Tempo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Long => "long",
            Self::Steady => "steady",
            Self::Hills => "hills",
            Self::Tempo => "tempo",
        }
    }
}

impl fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for WorkoutType {
    type Err = WorkoutTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "threshold" => Ok(Self::Threshold),
            "long" => Ok(Self::Long),
            "steady" => Ok(Self::Steady),
            "hills" => Ok(Self::Hills),
            "tempo" => Ok(Self::Tempo),
            other => Err(WorkoutTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`WorkoutType`] string.
#[derive(Debug, Clone)]
pub struct WorkoutTypeParseError(pub String);

impl fmt::Display for WorkoutTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid workout type: {:?} (expected threshold, long, steady, hills, or tempo)",
            self.0
        )
    }
}

impl std::error::Error for WorkoutTypeParseError {}

// ---------------------------------------------------------------------------

/// Self-reported fitness tier. Determines the weekly stress budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FitnessLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl FitnessLevel {
    /// Tiers in form order: index 0 is beginner, 2 is advanced.
    pub const ALL: [FitnessLevel; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];

    /// Look up a tier by its position in a select list.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for FitnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for FitnessLevel {
    type Err = FitnessLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(FitnessLevelParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`FitnessLevel`] string.
#[derive(Debug, Clone)]
pub struct FitnessLevelParseError(pub String);

impl fmt::Display for FitnessLevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid fitness level: {:?} (expected beginner, intermediate, or advanced)",
            self.0
        )
    }
}

impl std::error::Error for FitnessLevelParseError {}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A catalog workout. Reference data, never modified by plan operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Workout {
    pub workout_id: String,
    pub name: String,
    pub workout_type: WorkoutType,
    /// Minutes.
    pub duration: i32,
    pub description: String,
    pub stress: i32,
}

/// A user and their training constraints.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub fitness_level: FitnessLevel,
    pub sessions_per_week: i32,
    pub created_at: DateTime<Utc>,
}

/// A user's assignment of a catalog workout to a week and slot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SelectedWorkout {
    pub selected_id: Uuid,
    pub user_id: Uuid,
    pub workout_id: String,
    pub week_number: i32,
    pub position_in_week: i32,
    pub removed: bool,
    pub added_at: DateTime<Utc>,
}

/// A selection joined with its catalog workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlannedWorkout {
    pub selected_id: Uuid,
    pub user_id: Uuid,
    pub workout_id: String,
    pub week_number: i32,
    pub position_in_week: i32,
    pub removed: bool,
    pub added_at: DateTime<Utc>,
    pub name: String,
    pub workout_type: WorkoutType,
    pub duration: i32,
    pub description: String,
    pub stress: i32,
}

/// Aggregate stress of the live selections in one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WeekStress {
    pub week_number: i32,
    pub total_stress: i64,
    pub session_count: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
