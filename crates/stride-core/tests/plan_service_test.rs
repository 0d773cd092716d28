//! Integration tests for the plan service and action layers.
//!
//! Each test runs against its own migrated, catalog-seeded database.

use rand::SeedableRng;
use rand::rngs::StdRng;
use sqlx::PgPool;
use uuid::Uuid;

use stride_core::actions::{self, CreateUserRequest, FailureKind, FitnessLevelInput, InsertWorkoutRequest};
use stride_core::budget::StressBudgets;
use stride_core::error::PlanError;
use stride_core::graph::{FULL_WEEK_COLOR, NodeData};
use stride_core::plan;
use stride_db::models::{FitnessLevel, User};
use stride_db::queries::{selections, users};
use stride_test_utils::{create_test_db, drop_test_db};

async fn bare_user(pool: &PgPool, level: FitnessLevel, sessions: i32) -> User {
    users::insert_user(pool, level, sessions)
        .await
        .expect("insert_user should succeed")
}

async fn user_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn create_user_with_plan_persists_every_selection() {
    let (pool, db_name) = create_test_db().await;
    let budgets = StressBudgets::default();
    let mut rng = StdRng::seed_from_u64(7);

    let created = plan::create_user_with_plan(&pool, FitnessLevel::Intermediate, 3, &budgets, &mut rng)
        .await
        .expect("plan creation should succeed");

    assert_eq!(created.user.sessions_per_week, 3);
    assert_eq!(created.selections.len(), created.plan.len());
    assert!(!created.plan.is_empty());

    let live = plan::list_selections(&pool, created.user.user_id).await.unwrap();
    assert_eq!(live.len(), created.plan.len());

    let totals = plan::week_stress_totals(&pool, created.user.user_id).await.unwrap();
    for week in &totals {
        assert!(week.total_stress <= 30, "week {} over budget", week.week_number);
        assert!(week.session_count <= 3);
    }

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn failed_plan_insert_leaves_no_user_behind() {
    let (pool, db_name) = create_test_db().await;

    // With a 40 budget every week gets at least one workout, so the insert
    // for week 3 always trips this constraint.
    sqlx::query(
        "ALTER TABLE selected_workouts ADD CONSTRAINT no_week_three CHECK (week_number <> 3)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let err = plan::create_user_with_plan(
        &pool,
        FitnessLevel::Advanced,
        3,
        &StressBudgets::default(),
        &mut rng,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PlanError::Store(_)), "got {err:?}");
    assert_eq!(user_count(&pool).await, 0);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM selected_workouts")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn invalid_sessions_rejected_before_any_write() {
    let (pool, db_name) = create_test_db().await;
    let mut rng = StdRng::seed_from_u64(1);

    let err = plan::create_user_with_plan(
        &pool,
        FitnessLevel::Beginner,
        9,
        &StressBudgets::default(),
        &mut rng,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PlanError::Validation(_)));
    assert_eq!(user_count(&pool).await, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn regenerate_replaces_live_selections() {
    let (pool, db_name) = create_test_db().await;
    let budgets = StressBudgets::default();
    let mut rng = StdRng::seed_from_u64(21);

    let first = plan::create_user_with_plan(&pool, FitnessLevel::Advanced, 4, &budgets, &mut rng)
        .await
        .unwrap();
    let user_id = first.user.user_id;

    let second = plan::generate_plan_for_user(&pool, user_id, &budgets, &mut rng)
        .await
        .unwrap();

    let live = plan::list_selections(&pool, user_id).await.unwrap();
    let mut live_ids: Vec<Uuid> = live.iter().map(|p| p.selected_id).collect();
    let mut new_ids: Vec<Uuid> = second.selections.iter().map(|s| s.selected_id).collect();
    live_ids.sort();
    new_ids.sort();
    assert_eq!(live_ids, new_ids);

    let all = selections::list_selections_for_user(&pool, user_id, true).await.unwrap();
    assert_eq!(all.len(), first.selections.len() + second.selections.len());

    let err = plan::generate_plan_for_user(&pool, Uuid::new_v4(), &budgets, &mut rng)
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::NotFound(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn add_workout_enforces_stress_budget() {
    let (pool, db_name) = create_test_db().await;
    let budgets = StressBudgets::default();
    let user = bare_user(&pool, FitnessLevel::Beginner, 3).await;

    let first = plan::add_workout(&pool, user.user_id, 1, "long-progression", &budgets)
        .await
        .unwrap()
        .expect("empty week has room");
    assert_eq!(first.position_in_week, 1);

    // 15 + 10 > 20
    let err = plan::add_workout(&pool, user.user_id, 1, "tempo-classic", &budgets)
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::Validation(_)));

    // 15 + 4 fits.
    let second = plan::add_workout(&pool, user.user_id, 1, "steady-recovery", &budgets)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.position_in_week, 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn add_workout_to_full_week_is_a_no_op() {
    let (pool, db_name) = create_test_db().await;
    let budgets = StressBudgets::default();
    let user = bare_user(&pool, FitnessLevel::Beginner, 2).await;

    for id in ["steady-recovery", "steady-aerobic"] {
        plan::add_workout(&pool, user.user_id, 2, id, &budgets)
            .await
            .unwrap()
            .expect("week has room");
    }

    let third = plan::add_workout(&pool, user.user_id, 2, "tempo-broken", &budgets)
        .await
        .unwrap();
    assert!(third.is_none());

    // A full week stays a no-op even when the workout is also over budget.
    let over = plan::add_workout(&pool, user.user_id, 2, "long-progression", &budgets)
        .await
        .unwrap();
    assert!(over.is_none());
    assert_eq!(plan::list_selections(&pool, user.user_id).await.unwrap().len(), 2);

    let graph = plan::get_plan_graph(&pool, user.user_id, &budgets).await.unwrap();
    match &graph.node("week-2").unwrap().data {
        NodeData::Week { week_full, .. } => assert!(*week_full),
        other => panic!("expected a week node, got {other:?}"),
    }
    assert_eq!(graph.edge("edge-2-0").unwrap().style.stroke, FULL_WEEK_COLOR);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn add_workout_validates_week_and_catalog() {
    let (pool, db_name) = create_test_db().await;
    let budgets = StressBudgets::default();
    let user = bare_user(&pool, FitnessLevel::Advanced, 3).await;

    let err = plan::add_workout(&pool, user.user_id, 5, "long-easy", &budgets)
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::Validation(_)));

    let err = plan::add_workout(&pool, user.user_id, 1, "marathon", &budgets)
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::NotFound(_)));

    let err = plan::add_workout(&pool, Uuid::new_v4(), 1, "long-easy", &budgets)
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::NotFound(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn removed_workout_disappears_from_list_and_graph() {
    let (pool, db_name) = create_test_db().await;
    let budgets = StressBudgets::default();
    let user = bare_user(&pool, FitnessLevel::Intermediate, 3).await;

    let kept = plan::place_workout(&pool, user.user_id, "hills-short", 1, 1, &budgets)
        .await
        .unwrap();
    let dropped = plan::place_workout(&pool, user.user_id, "tempo-broken", 1, 2, &budgets)
        .await
        .unwrap();

    plan::remove_workout(&pool, user.user_id, dropped.selected_id, "tempo-broken")
        .await
        .unwrap();

    let live = plan::list_selections(&pool, user.user_id).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].selected_id, kept.selected_id);

    let graph = plan::get_plan_graph(&pool, user.user_id, &budgets).await.unwrap();
    let workout_nodes: Vec<&str> = graph
        .nodes
        .iter()
        .filter_map(|n| match &n.data {
            NodeData::Workout { workout_id, .. } => Some(workout_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(workout_nodes, vec!["hills-short"]);

    let err = plan::remove_workout(&pool, user.user_id, dropped.selected_id, "hills-short")
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::NotFound(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn place_workout_checks_slot() {
    let (pool, db_name) = create_test_db().await;
    let budgets = StressBudgets::default();
    let user = bare_user(&pool, FitnessLevel::Intermediate, 2).await;

    plan::place_workout(&pool, user.user_id, "long-easy", 3, 2, &budgets)
        .await
        .unwrap();

    let taken = plan::place_workout(&pool, user.user_id, "tempo-classic", 3, 2, &budgets)
        .await
        .unwrap_err();
    assert!(matches!(taken, PlanError::Validation(_)));

    let out_of_range = plan::place_workout(&pool, user.user_id, "tempo-classic", 3, 3, &budgets)
        .await
        .unwrap_err();
    assert!(matches!(out_of_range, PlanError::Validation(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn place_workout_enforces_stress_budget() {
    let (pool, db_name) = create_test_db().await;
    let budgets = StressBudgets::default();
    let user = bare_user(&pool, FitnessLevel::Beginner, 3).await;

    plan::place_workout(&pool, user.user_id, "long-progression", 1, 1, &budgets)
        .await
        .unwrap();

    // 15 + 12 > 20
    let err = plan::place_workout(&pool, user.user_id, "long-easy", 1, 2, &budgets)
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::Validation(_)));

    let totals = plan::week_stress_totals(&pool, user.user_id).await.unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].total_stress, 15);
    assert_eq!(totals[0].session_count, 1);

    // 15 + 4 fits.
    plan::place_workout(&pool, user.user_id, "steady-recovery", 1, 3, &budgets)
        .await
        .unwrap();

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn graph_for_unknown_user_is_not_found() {
    let (pool, db_name) = create_test_db().await;

    let err = plan::get_plan_graph(&pool, Uuid::new_v4(), &StressBudgets::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::NotFound(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn actions_report_failures_in_the_envelope() {
    let (pool, db_name) = create_test_db().await;
    let budgets = StressBudgets::default();
    let mut rng = StdRng::seed_from_u64(3);

    let bad = actions::create_user(
        &pool,
        &CreateUserRequest {
            fitness_level: FitnessLevelInput::Index(7),
            sessions_per_week: 3,
        },
        &budgets,
        &mut rng,
    )
    .await;
    assert!(!bad.success);
    assert_eq!(bad.kind, Some(FailureKind::Validation));
    assert!(bad.error.unwrap().starts_with("Validation error:"));

    let created = actions::create_user(
        &pool,
        &CreateUserRequest {
            fitness_level: FitnessLevelInput::Name("0".into()),
            sessions_per_week: 1,
        },
        &budgets,
        &mut rng,
    )
    .await;
    assert!(created.success);
    let user_id = created.data.unwrap().user.user_id;

    // One session per week: every generated week that got a workout is full.
    let stress = actions::get_user_stress_score(&pool, user_id).await;
    let full_week = stress.data.unwrap()[0].week_number;

    let full = actions::insert_workout_into_week(
        &pool,
        &InsertWorkoutRequest {
            user_id,
            week_number: full_week,
            workout_id: "steady-recovery".into(),
        },
        &budgets,
    )
    .await;
    assert!(!full.success);
    assert_eq!(full.kind, Some(FailureKind::Validation));

    let catalog = actions::get_all_workouts(&pool).await;
    assert_eq!(catalog.data.unwrap().len(), 10);

    let missing = actions::get_selected_workouts_for_user(&pool, Uuid::new_v4()).await;
    assert_eq!(missing.kind, Some(FailureKind::NotFound));

    pool.close().await;
    drop_test_db(&db_name).await;
}
