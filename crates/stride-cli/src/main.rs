mod config;
mod plan_cmds;
mod serve_cmd;
mod user_cmds;
mod workout_cmds;

use clap::{CommandFactory, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;

use stride_db::config::DbConfig;
use stride_db::models::{FitnessLevel, WorkoutType};
use stride_db::pool;

use config::StrideConfig;

#[derive(Parser)]
#[command(name = "stride", about = "Four-week running plan generator")]
struct Cli {
    /// Database URL (overrides STRIDE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a stride config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database, run migrations, and seed the workout catalog
    DbInit,
    /// Start the HTTP server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Browse the workout catalog
    Workouts {
        #[command(subcommand)]
        command: WorkoutCommands,
    },
    /// User management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Inspect and edit a user's plan
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Print shell completions to stdout
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum WorkoutCommands {
    /// List catalog workouts
    List {
        /// Only show workouts of this type
        #[arg(long = "type")]
        workout_type: Option<WorkoutType>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user and generate their four-week plan
    Create {
        /// beginner, intermediate, or advanced
        #[arg(long)]
        fitness_level: FitnessLevel,
        /// Workouts per week (1-7)
        #[arg(long)]
        sessions: i32,
        /// Seed the plan generator for a reproducible plan
        #[arg(long)]
        seed: Option<u64>,
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Show a user's plan
    Show {
        user_id: String,
        /// Include removed selections
        #[arg(long)]
        all: bool,
    },
    /// Print the plan graph as JSON
    Graph { user_id: String },
    /// Add a workout to the next free slot of a week
    Add {
        user_id: String,
        /// Week number (1-4)
        #[arg(long)]
        week: i32,
        /// Catalog workout ID
        #[arg(long)]
        workout: String,
    },
    /// Put a workout at an explicit week and position
    Place {
        user_id: String,
        #[arg(long)]
        week: i32,
        #[arg(long)]
        position: i32,
        #[arg(long)]
        workout: String,
    },
    /// Remove one selection from the plan
    Remove {
        user_id: String,
        selected_id: String,
        /// Catalog workout ID of the selection
        #[arg(long)]
        workout: String,
    },
    /// Replace the plan with a newly generated one
    Regenerate {
        user_id: String,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show per-week stress totals
    Stress { user_id: String },
}

/// Seeded generator when `seed` is given, OS-seeded otherwise.
pub(crate) fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Execute the `stride init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        budgets: Default::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!(
        "  budgets = beginner {}, intermediate {}, advanced {}",
        cfg.budgets.beginner, cfg.budgets.intermediate, cfg.budgets.advanced
    );
    println!();
    println!("Next: run `stride db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `stride db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = StrideConfig::resolve(cli_db_url)?;

    println!("Initializing stride database...");

    pool::ensure_database_exists(&resolved.db_config).await?;

    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let result = match pool::run_migrations(&db_pool).await {
        Ok(()) => pool::table_counts(&db_pool).await,
        Err(e) => Err(e),
    };
    db_pool.close().await;
    let counts = result?;

    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }
    println!("stride db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = StrideConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = serve_cmd::run_serve(db_pool.clone(), resolved.budgets, &bind, port).await;
            db_pool.close().await;
            result?;
        }
        Commands::Workouts { command } => {
            let resolved = StrideConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = workout_cmds::run_workout_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::User { command } => {
            let resolved = StrideConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = user_cmds::run_user_command(command, &db_pool, &resolved.budgets).await;
            db_pool.close().await;
            result?;
        }
        Commands::Plan { command } => {
            let resolved = StrideConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = plan_cmds::run_plan_command(command, &db_pool, &resolved.budgets).await;
            db_pool.close().await;
            result?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "stride", &mut std::io::stdout());
        }
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_user_create() {
        let cli = Cli::try_parse_from([
            "stride",
            "user",
            "create",
            "--fitness-level",
            "advanced",
            "--sessions",
            "4",
            "--seed",
            "9",
        ])
        .unwrap();
        match cli.command {
            Commands::User {
                command:
                    UserCommands::Create {
                        fitness_level,
                        sessions,
                        seed,
                        json,
                    },
            } => {
                assert_eq!(fitness_level, FitnessLevel::Advanced);
                assert_eq!(sessions, 4);
                assert_eq!(seed, Some(9));
                assert!(!json);
            }
            _ => panic!("expected user create"),
        }
    }

    #[test]
    fn rejects_unknown_fitness_level() {
        assert!(
            Cli::try_parse_from([
                "stride",
                "user",
                "create",
                "--fitness-level",
                "elite",
                "--sessions",
                "3"
            ])
            .is_err()
        );
    }

    #[test]
    fn parses_workout_type_filter_and_global_url() {
        let cli = Cli::try_parse_from([
            "stride",
            "workouts",
            "list",
            "--type",
            "hills",
            "--database-url",
            "postgresql://h/db",
        ])
        .unwrap();
        assert_eq!(cli.database_url.as_deref(), Some("postgresql://h/db"));
        match cli.command {
            Commands::Workouts {
                command: WorkoutCommands::List { workout_type, .. },
            } => assert_eq!(workout_type, Some(WorkoutType::Hills)),
            _ => panic!("expected workouts list"),
        }
    }

    #[test]
    fn same_seed_same_stream() {
        use rand::Rng;
        let a: u64 = rng_from_seed(Some(5)).random();
        let b: u64 = rng_from_seed(Some(5)).random();
        assert_eq!(a, b);
    }
}
