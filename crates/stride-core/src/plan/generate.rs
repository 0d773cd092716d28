//! Greedy random plan generation.
//!
//! Fills each week of a four-week plan with at most one workout per type,
//! never letting the week's summed stress exceed the budget. This module is
//! pure: persistence lives in [`super::service`].

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use stride_db::models::{Workout, WorkoutType};

use crate::budget::{PLAN_WEEKS, validate_sessions_per_week};
use crate::error::{PlanError, Result};
use crate::rng::{RandomSource, choose};

/// A workout placed at a slot of a week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedSlot {
    /// 1-based slot within the week.
    pub position_in_week: i32,
    pub workout: Workout,
}

/// Generated plan, keyed by week number.
///
/// Every week in 1..=4 has an entry, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyPlan {
    pub weeks: BTreeMap<i32, Vec<PlannedSlot>>,
}

impl WeeklyPlan {
    pub fn week(&self, week_number: i32) -> &[PlannedSlot] {
        self.weeks
            .get(&week_number)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn week_stress(&self, week_number: i32) -> i32 {
        self.week(week_number).iter().map(|s| s.workout.stress).sum()
    }

    /// Number of selections across all weeks.
    pub fn len(&self) -> usize {
        self.weeks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(week_number, slot)` pairs in week then position order.
    pub fn slots(&self) -> impl Iterator<Item = (i32, &PlannedSlot)> {
        self.weeks
            .iter()
            .flat_map(|(week, slots)| slots.iter().map(move |s| (*week, s)))
    }
}

/// Generate a plan for weeks 1..=4.
///
/// Per week: up to `sessions_per_week` iterations, each picking a random
/// workout type not yet used that week, then a random workout of that type
/// that still fits the budget. An iteration that finds no fitting workout
/// consumes its slot without retrying. A week stops early when every type
/// has been used or the running total reaches the budget.
pub fn generate_plan<R>(
    catalog: &[Workout],
    stress_budget: i32,
    sessions_per_week: i32,
    rng: &mut R,
) -> Result<WeeklyPlan>
where
    R: RandomSource + ?Sized,
{
    if catalog.is_empty() {
        return Err(PlanError::validation("no workouts available in the catalog"));
    }
    if stress_budget <= 0 {
        return Err(PlanError::validation(format!(
            "stress budget must be positive, got {stress_budget}"
        )));
    }
    validate_sessions_per_week(sessions_per_week)?;

    let catalog_types = distinct_types(catalog);
    let mut plan = WeeklyPlan::default();

    for week in PLAN_WEEKS {
        let slots = generate_week(catalog, &catalog_types, stress_budget, sessions_per_week, rng);
        debug!(
            week,
            selected = slots.len(),
            stress = slots.iter().map(|s| s.workout.stress).sum::<i32>(),
            "generated week"
        );
        plan.weeks.insert(week, slots);
    }

    Ok(plan)
}

fn generate_week<R>(
    catalog: &[Workout],
    catalog_types: &[WorkoutType],
    stress_budget: i32,
    sessions_per_week: i32,
    rng: &mut R,
) -> Vec<PlannedSlot>
where
    R: RandomSource + ?Sized,
{
    let mut slots: Vec<PlannedSlot> = Vec::new();
    let mut chosen_types: Vec<WorkoutType> = Vec::new();
    let mut total_stress = 0;

    for i in 0..sessions_per_week {
        let candidates: Vec<WorkoutType> = catalog_types
            .iter()
            .copied()
            .filter(|t| !chosen_types.contains(t))
            .collect();

        let Some(&workout_type) = choose(rng, &candidates) else {
            break;
        };

        let fitting: Vec<&Workout> = catalog
            .iter()
            .filter(|w| w.workout_type == workout_type && w.stress + total_stress <= stress_budget)
            .collect();

        if let Some(&workout) = choose(rng, &fitting) {
            total_stress += workout.stress;
            chosen_types.push(workout_type);
            slots.push(PlannedSlot {
                position_in_week: i + 1,
                workout: workout.clone(),
            });
        }

        if total_stress >= stress_budget {
            break;
        }
    }

    slots
}

/// Distinct workout types in first-seen catalog order.
fn distinct_types(catalog: &[Workout]) -> Vec<WorkoutType> {
    let mut types = Vec::new();
    for w in catalog {
        if !types.contains(&w.workout_type) {
            types.push(w.workout_type);
        }
    }
    types
}
