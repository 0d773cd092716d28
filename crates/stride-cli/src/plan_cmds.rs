//! CLI handlers for `stride plan` subcommands.
//!
//! Implements:
//! - `stride plan show <user-id>`        -- print the plan week by week
//! - `stride plan graph <user-id>`       -- print the plan graph as JSON
//! - `stride plan add <user-id>`         -- add a workout to the next free slot
//! - `stride plan place <user-id>`       -- put a workout at an explicit slot
//! - `stride plan remove <user-id> <id>` -- remove one selection
//! - `stride plan regenerate <user-id>`  -- replace the plan with a new one
//! - `stride plan stress <user-id>`      -- per-week stress totals

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use stride_core::budget::StressBudgets;
use stride_core::plan;
use stride_db::models::PlannedWorkout;
use stride_db::queries::selections;

use crate::{PlanCommands, rng_from_seed};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_plan_command(
    command: PlanCommands,
    pool: &PgPool,
    budgets: &StressBudgets,
) -> Result<()> {
    match command {
        PlanCommands::Show { user_id, all } => cmd_show(pool, &user_id, all, budgets).await,
        PlanCommands::Graph { user_id } => cmd_graph(pool, &user_id, budgets).await,
        PlanCommands::Add {
            user_id,
            week,
            workout,
        } => cmd_add(pool, &user_id, week, &workout, budgets).await,
        PlanCommands::Place {
            user_id,
            week,
            position,
            workout,
        } => cmd_place(pool, &user_id, week, position, &workout, budgets).await,
        PlanCommands::Remove {
            user_id,
            selected_id,
            workout,
        } => cmd_remove(pool, &user_id, &selected_id, &workout).await,
        PlanCommands::Regenerate { user_id, seed } => {
            cmd_regenerate(pool, &user_id, seed, budgets).await
        }
        PlanCommands::Stress { user_id } => cmd_stress(pool, &user_id).await,
    }
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid {what} ID: {raw}"))
}

// -----------------------------------------------------------------------
// Formatting
// -----------------------------------------------------------------------

/// Render selections grouped by week, one line per workout.
pub fn format_plan(selections: &[PlannedWorkout]) -> String {
    if selections.is_empty() {
        return "No workouts planned.\n".to_string();
    }

    let mut by_week: BTreeMap<i32, Vec<&PlannedWorkout>> = BTreeMap::new();
    for s in selections {
        by_week.entry(s.week_number).or_default().push(s);
    }

    let mut out = String::new();
    for (week, rows) in by_week {
        let stress: i32 = rows.iter().filter(|r| !r.removed).map(|r| r.stress).sum();
        out.push_str(&format!("Week {week} (stress {stress})\n"));
        for r in rows {
            let marker = if r.removed { "  [removed]" } else { "" };
            out.push_str(&format!(
                "  {}. {:<22} {:<9} {:>3} min  stress {:>2}  {}{}\n",
                r.position_in_week,
                r.name,
                r.workout_type,
                r.duration,
                r.stress,
                r.selected_id,
                marker
            ));
        }
    }
    out
}

// -----------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------

async fn cmd_show(pool: &PgPool, user_id: &str, all: bool, budgets: &StressBudgets) -> Result<()> {
    let user_id = parse_id(user_id, "user")?;
    let constraints = plan::get_constraints(pool, user_id, budgets).await?;

    let rows = if all {
        selections::list_selections_for_user(pool, user_id, true).await?
    } else {
        plan::list_selections(pool, user_id).await?
    };

    println!("User {user_id}");
    println!(
        "  {} / {} sessions per week / stress budget {}",
        constraints.fitness_level, constraints.sessions_per_week, constraints.stress_budget
    );
    println!();
    print!("{}", format_plan(&rows));
    Ok(())
}

async fn cmd_graph(pool: &PgPool, user_id: &str, budgets: &StressBudgets) -> Result<()> {
    let user_id = parse_id(user_id, "user")?;
    let graph = plan::get_plan_graph(pool, user_id, budgets).await?;
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}

async fn cmd_add(
    pool: &PgPool,
    user_id: &str,
    week: i32,
    workout_id: &str,
    budgets: &StressBudgets,
) -> Result<()> {
    let user_id = parse_id(user_id, "user")?;
    match plan::add_workout(pool, user_id, week, workout_id, budgets).await? {
        Some(row) => println!(
            "Added {workout_id} to week {week} at position {} ({}).",
            row.position_in_week, row.selected_id
        ),
        None => println!("Week {week} is already full; nothing added."),
    }
    Ok(())
}

async fn cmd_place(
    pool: &PgPool,
    user_id: &str,
    week: i32,
    position: i32,
    workout_id: &str,
    budgets: &StressBudgets,
) -> Result<()> {
    let user_id = parse_id(user_id, "user")?;
    let row = plan::place_workout(pool, user_id, workout_id, week, position, budgets).await?;
    println!(
        "Placed {workout_id} at week {week} position {position} ({}).",
        row.selected_id
    );
    Ok(())
}

async fn cmd_remove(pool: &PgPool, user_id: &str, selected_id: &str, workout_id: &str) -> Result<()> {
    let user_id = parse_id(user_id, "user")?;
    let selected_id = parse_id(selected_id, "selection")?;
    plan::remove_workout(pool, user_id, selected_id, workout_id).await?;
    println!("Removed selection {selected_id}.");
    Ok(())
}

async fn cmd_regenerate(
    pool: &PgPool,
    user_id: &str,
    seed: Option<u64>,
    budgets: &StressBudgets,
) -> Result<()> {
    let user_id = parse_id(user_id, "user")?;
    let mut rng = rng_from_seed(seed);
    let created = plan::generate_plan_for_user(pool, user_id, budgets, &mut rng).await?;

    println!("Plan regenerated with {} workouts.", created.selections.len());
    println!();
    let live = plan::list_selections(pool, user_id).await?;
    print!("{}", format_plan(&live));
    Ok(())
}

async fn cmd_stress(pool: &PgPool, user_id: &str) -> Result<()> {
    let user_id = parse_id(user_id, "user")?;
    let totals = plan::week_stress_totals(pool, user_id).await?;

    if totals.is_empty() {
        println!("No workouts planned.");
        return Ok(());
    }

    println!("{:<6}  {:>6}  {:>8}", "WEEK", "STRESS", "SESSIONS");
    for t in totals {
        println!(
            "{:<6}  {:>6}  {:>8}",
            t.week_number, t.total_stress, t.session_count
        );
    }
    Ok(())
}
