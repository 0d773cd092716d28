//! Training plans: pure generation plus the transactional service that
//! persists and edits them.

pub mod generate;
pub mod service;

pub use generate::{PlannedSlot, WeeklyPlan, generate_plan};
pub use service::{
    CreatedPlan, add_workout, create_user_with_plan, generate_plan_for_user, get_constraints,
    get_plan_graph, list_catalog, list_selections, place_workout, remove_workout,
    week_stress_totals,
};
