//! Stress budgets and the per-user constraints derived from them.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use stride_db::models::{FitnessLevel, User};

use crate::error::{PlanError, Result};

/// Weeks covered by a generated plan.
pub const PLAN_WEEKS: RangeInclusive<i32> = 1..=4;

/// Allowed values for sessions per week.
pub const SESSIONS_PER_WEEK: RangeInclusive<i32> = 1..=7;

/// Weekly stress budget per fitness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressBudgets {
    pub beginner: i32,
    pub intermediate: i32,
    pub advanced: i32,
}

impl Default for StressBudgets {
    fn default() -> Self {
        Self {
            beginner: 20,
            intermediate: 30,
            advanced: 40,
        }
    }
}

impl StressBudgets {
    pub fn for_level(&self, level: FitnessLevel) -> i32 {
        match level {
            FitnessLevel::Beginner => self.beginner,
            FitnessLevel::Intermediate => self.intermediate,
            FitnessLevel::Advanced => self.advanced,
        }
    }

    /// Every budget must be positive.
    pub fn validate(&self) -> Result<()> {
        for level in FitnessLevel::ALL {
            let budget = self.for_level(level);
            if budget <= 0 {
                return Err(PlanError::validation(format!(
                    "stress budget for {level} must be positive, got {budget}"
                )));
            }
        }
        Ok(())
    }
}

/// What the plan generator and graph builder need to know about a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserConstraints {
    pub fitness_level: FitnessLevel,
    pub sessions_per_week: i32,
    pub stress_budget: i32,
}

impl UserConstraints {
    pub fn new(fitness_level: FitnessLevel, sessions_per_week: i32, budgets: &StressBudgets) -> Self {
        Self {
            fitness_level,
            sessions_per_week,
            stress_budget: budgets.for_level(fitness_level),
        }
    }

    pub fn for_user(user: &User, budgets: &StressBudgets) -> Self {
        Self::new(user.fitness_level, user.sessions_per_week, budgets)
    }
}

pub fn validate_sessions_per_week(sessions: i32) -> Result<()> {
    if SESSIONS_PER_WEEK.contains(&sessions) {
        Ok(())
    } else {
        Err(PlanError::validation(format!(
            "sessions per week must be between {} and {}, got {sessions}",
            SESSIONS_PER_WEEK.start(),
            SESSIONS_PER_WEEK.end()
        )))
    }
}

pub fn validate_week_number(week: i32) -> Result<()> {
    if PLAN_WEEKS.contains(&week) {
        Ok(())
    } else {
        Err(PlanError::validation(format!(
            "week number must be between {} and {}, got {week}",
            PLAN_WEEKS.start(),
            PLAN_WEEKS.end()
        )))
    }
}
