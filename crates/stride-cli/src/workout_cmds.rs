//! `stride workouts` subcommands.

use anyhow::Result;
use sqlx::PgPool;

use stride_core::plan;
use stride_db::models::{Workout, WorkoutType};

use crate::WorkoutCommands;

pub async fn run_workout_command(command: WorkoutCommands, pool: &PgPool) -> Result<()> {
    match command {
        WorkoutCommands::List { workout_type, json } => cmd_list(pool, workout_type, json).await,
    }
}

async fn cmd_list(pool: &PgPool, workout_type: Option<WorkoutType>, json: bool) -> Result<()> {
    let catalog = plan::list_catalog(pool).await?;
    let shown: Vec<&Workout> = catalog
        .iter()
        .filter(|w| workout_type.is_none_or(|t| w.workout_type == t))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No workouts found.");
        return Ok(());
    }

    print!("{}", format_catalog(&shown));
    Ok(())
}

fn format_catalog(workouts: &[&Workout]) -> String {
    let id_width = workouts
        .iter()
        .map(|w| w.workout_id.len())
        .max()
        .unwrap_or(0)
        .max("ID".len());

    let mut out = format!(
        "{:<id_width$}  {:<9}  {:>6}  {:>3}  NAME\n",
        "ID", "TYPE", "STRESS", "MIN"
    );
    for w in workouts {
        out.push_str(&format!(
            "{:<id_width$}  {:<9}  {:>6}  {:>3}  {}\n",
            w.workout_id, w.workout_type, w.stress, w.duration, w.name
        ));
    }
    out
}
