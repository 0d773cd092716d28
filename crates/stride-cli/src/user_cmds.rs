//! `stride user` subcommands.

use anyhow::Result;
use sqlx::PgPool;

use stride_core::budget::StressBudgets;
use stride_core::plan;

use crate::{UserCommands, plan_cmds, rng_from_seed};

pub async fn run_user_command(
    command: UserCommands,
    pool: &PgPool,
    budgets: &StressBudgets,
) -> Result<()> {
    match command {
        UserCommands::Create {
            fitness_level,
            sessions,
            seed,
            json,
        } => {
            let mut rng = rng_from_seed(seed);
            let created =
                plan::create_user_with_plan(pool, fitness_level, sessions, budgets, &mut rng)
                    .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&created)?);
                return Ok(());
            }

            println!("User created.");
            println!();
            println!("  User ID:           {}", created.user.user_id);
            println!("  Fitness level:     {}", created.user.fitness_level);
            println!("  Sessions per week: {}", created.user.sessions_per_week);
            println!("  Stress budget:     {}", budgets.for_level(fitness_level));
            println!("  Workouts planned:  {}", created.selections.len());
            println!();

            let live = plan::list_selections(pool, created.user.user_id).await?;
            print!("{}", plan_cmds::format_plan(&live));
            Ok(())
        }
    }
}
