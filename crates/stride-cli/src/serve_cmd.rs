use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use stride_core::actions::{
    self, ActionResult, CreateUserRequest, FailureKind, InsertWorkoutRequest, PlaceWorkoutRequest,
    RemoveWorkoutRequest,
};
use stride_core::budget::StressBudgets;
use stride_core::graph::{NodeData, PlanGraph};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub budgets: StressBudgets,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failure rendered as `{"success": false, "error": ...}` with a status code
/// derived from the failure kind.
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn from_action<T>(result: ActionResult<T>) -> Self {
        Self {
            status: result.kind.map_or(StatusCode::INTERNAL_SERVER_ERROR, status_for),
            message: result
                .error
                .unwrap_or_else(|| "An unexpected error occurred".to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Validation => StatusCode::BAD_REQUEST,
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Send an action's envelope as JSON: `ok` on success, the failure's status
/// otherwise.
fn respond<T: Serialize>(ok: StatusCode, result: ActionResult<T>) -> Response {
    let status = result.kind.map_or(ok, status_for);
    (status, Json(result)).into_response()
}

/// Unwrap a successful action or turn its failure into an [`AppError`].
fn require<T>(result: ActionResult<T>) -> Result<T, AppError> {
    if result.success {
        if let Some(data) = result.data {
            return Ok(data);
        }
        return Err(AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An unexpected error occurred".to_string(),
        });
    }
    Err(AppError::from_action(result))
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/users/{id}/selections`. With a position the workout
/// goes to that exact slot; without one it takes the next free slot.
#[derive(Debug, Deserialize)]
pub struct AddSelectionBody {
    pub workout_id: String,
    pub week_number: i32,
    pub position_in_week: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveSelectionBody {
    pub workout_id: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(pool: PgPool, budgets: StressBudgets) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/workouts", get(list_workouts))
        .route("/api/users", post(create_user_json))
        .route("/users", post(create_user_form))
        .route("/users/{id}/plan", get(plan_page))
        .route(
            "/api/users/{id}/selections",
            get(list_selections).post(add_selection),
        )
        .route(
            "/api/users/{id}/selections/{sid}/remove",
            post(remove_selection),
        )
        .route("/api/users/{id}/plan", post(regenerate_plan))
        .route("/api/users/{id}/graph", get(plan_graph))
        .route("/api/users/{id}/stress", get(stress_totals))
        .layer(CorsLayer::permissive())
        .with_state(AppState { pool, budgets })
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pool: PgPool, budgets: StressBudgets, bind: &str, port: u16) -> Result<()> {
    let app = build_router(pool, budgets);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("stride serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("stride serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let catalog = require(actions::get_all_workouts(&state.pool).await)?;

    let rows = catalog
        .iter()
        .map(|w| {
            format!(
                "<tr><td>{name}</td><td>{ty}</td><td>{duration}</td><td>{stress}</td><td>{desc}</td></tr>",
                name = escape_html(&w.name),
                ty = w.workout_type,
                duration = w.duration,
                stress = w.stress,
                desc = escape_html(&w.description),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Html(format!(
        "<!DOCTYPE html>\
<html><head><title>stride</title></head><body>\
<h1>stride</h1>\
<form method=\"post\" action=\"/users\">\
<label>Fitness level <select name=\"fitness_level\">\
<option value=\"0\">Beginner</option>\
<option value=\"1\">Intermediate</option>\
<option value=\"2\">Advanced</option>\
</select></label> \
<label>Workouts per week <input type=\"number\" name=\"workout_times_per_week\" min=\"1\" max=\"7\" value=\"3\"></label> \
<button type=\"submit\">Create plan</button>\
</form>\
<p><a href=\"/api/workouts\">/api/workouts</a></p>\
<table><tr><th>Workout</th><th>Type</th><th>Minutes</th><th>Stress</th><th>Description</th></tr>{rows}</table>\
</body></html>"
    )))
}

fn render_plan_page(user_id: Uuid, graph: &PlanGraph) -> Result<String, AppError> {
    let graph_json = serde_json::to_string(graph).map_err(|e| AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("failed to serialize plan graph: {e}"),
    })?;

    let mut weeks = String::new();
    for node in &graph.nodes {
        match &node.data {
            NodeData::Root {
                fitness_level,
                stress_budget,
                sessions_per_week,
            } => {
                weeks.push_str(&format!(
                    "<p>{fitness_level}, {sessions_per_week} sessions per week, stress budget {stress_budget}</p>"
                ));
            }
            NodeData::Week {
                week_number,
                weekly_total_stress,
                session_count,
                week_full,
                ..
            } => {
                let full = if *week_full { " (full)" } else { "" };
                weeks.push_str(&format!(
                    "<h2>Week {week_number}{full}</h2><p>{session_count} sessions, stress {weekly_total_stress}</p>"
                ));
            }
            NodeData::Workout {
                name,
                workout_type,
                duration,
                stress,
                ..
            } => {
                weeks.push_str(&format!(
                    "<p>{} &middot; {workout_type} &middot; {duration} min &middot; stress {stress}</p>",
                    escape_html(name)
                ));
            }
        }
    }

    // The graph JSON goes into a script element, so a literal "</" must not
    // appear in it.
    let embedded = graph_json.replace("</", "<\\/");

    Ok(format!(
        "<!DOCTYPE html>\
<html><head><title>stride plan {user_id}</title></head><body>\
<h1>Training plan</h1>{weeks}\
<script type=\"application/json\" id=\"plan-graph\">{embedded}</script>\
</body></html>"
    ))
}

async fn plan_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let graph = require(actions::get_plan_graph(&state.pool, id, &state.budgets).await)?;
    Ok(Html(render_plan_page(id, &graph)?))
}

// ---------------------------------------------------------------------------
// JSON handlers
// ---------------------------------------------------------------------------

async fn list_workouts(State(state): State<AppState>) -> Response {
    respond(StatusCode::OK, actions::get_all_workouts(&state.pool).await)
}

async fn create_user_json(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Response {
    let mut rng = StdRng::from_os_rng();
    respond(
        StatusCode::CREATED,
        actions::create_user(&state.pool, &request, &state.budgets, &mut rng).await,
    )
}

/// Form submission from the index page. Success navigates to the new
/// user's plan page; failures are reported, never redirected.
async fn create_user_form(
    State(state): State<AppState>,
    Form(request): Form<CreateUserRequest>,
) -> Result<Redirect, AppError> {
    let mut rng = StdRng::from_os_rng();
    let created = require(actions::create_user(&state.pool, &request, &state.budgets, &mut rng).await)?;
    Ok(Redirect::to(&format!("/users/{}/plan", created.user.user_id)))
}

async fn list_selections(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    respond(
        StatusCode::OK,
        actions::get_selected_workouts_for_user(&state.pool, id).await,
    )
}

async fn add_selection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AddSelectionBody>,
) -> Response {
    let result = match body.position_in_week {
        Some(position_in_week) => {
            actions::plan_workout_schedule(
                &state.pool,
                &PlaceWorkoutRequest {
                    user_id: id,
                    workout_id: body.workout_id,
                    week_number: body.week_number,
                    position_in_week,
                },
                &state.budgets,
            )
            .await
        }
        None => {
            actions::insert_workout_into_week(
                &state.pool,
                &InsertWorkoutRequest {
                    user_id: id,
                    week_number: body.week_number,
                    workout_id: body.workout_id,
                },
                &state.budgets,
            )
            .await
        }
    };
    respond(StatusCode::CREATED, result)
}

async fn remove_selection(
    State(state): State<AppState>,
    Path((id, sid)): Path<(Uuid, Uuid)>,
    Json(body): Json<RemoveSelectionBody>,
) -> Response {
    respond(
        StatusCode::OK,
        actions::remove_workout_from_user_plan(
            &state.pool,
            &RemoveWorkoutRequest {
                user_id: id,
                selected_id: sid,
                workout_id: body.workout_id,
            },
        )
        .await,
    )
}

async fn regenerate_plan(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let mut rng = StdRng::from_os_rng();
    respond(
        StatusCode::OK,
        actions::add_workout_to_user_plan(&state.pool, id, &state.budgets, &mut rng).await,
    )
}

async fn plan_graph(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    respond(
        StatusCode::OK,
        actions::get_plan_graph(&state.pool, id, &state.budgets).await,
    )
}

async fn stress_totals(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    respond(
        StatusCode::OK,
        actions::get_user_stress_score(&state.pool, id).await,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use sqlx::PgPool;
    use tower::ServiceExt;
    use uuid::Uuid;

    use stride_core::budget::StressBudgets;
    use stride_db::models::FitnessLevel;
    use stride_db::queries::users;
    use stride_test_utils::{create_test_db, drop_test_db};

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    async fn send(pool: PgPool, request: Request<Body>) -> axum::response::Response {
        let app = super::build_router(pool, StressBudgets::default());
        app.oneshot(request).await.unwrap()
    }

    async fn send_request(pool: PgPool, uri: &str) -> axum::response::Response {
        send(pool, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_json(pool: PgPool, uri: &str, body: serde_json::Value) -> axum::response::Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(pool, request).await
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Pure helpers
    // -----------------------------------------------------------------------

    #[test]
    fn escape_html_replaces_markup() {
        assert_eq!(
            super::escape_html("<b>\"5 & 10\"</b>"),
            "&lt;b&gt;&quot;5 &amp; 10&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn failure_kinds_map_to_status_codes() {
        use stride_core::actions::FailureKind;
        assert_eq!(super::status_for(FailureKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(super::status_for(FailureKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            super::status_for(FailureKind::Store),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    // -----------------------------------------------------------------------
    // Routes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_index_returns_html_with_form() {
        let (pool, db_name) = create_test_db().await;

        let resp = send_request(pool.clone(), "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp
            .headers()
            .get("content-type")
            .expect("should have content-type header")
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.contains("text/html"), "got: {content_type}");
        let html = body_text(resp).await;
        assert!(html.contains("action=\"/users\""));
        assert!(html.contains("Short Hill Repeats"));

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_list_workouts() {
        let (pool, db_name) = create_test_db().await;

        let resp = send_request(pool.clone(), "/api/workouts").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"].as_array().unwrap().len(), 10);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_create_user_json_then_graph() {
        let (pool, db_name) = create_test_db().await;

        let resp = post_json(
            pool.clone(),
            "/api/users",
            serde_json::json!({"fitness_level": 1, "sessions_per_week": 3}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        let user_id = json["data"]["user"]["user_id"].as_str().unwrap().to_string();

        let resp = send_request(pool.clone(), &format!("/api/users/{user_id}/graph")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let graph = body_json(resp).await;
        let nodes = graph["data"]["nodes"].as_array().unwrap();
        assert_eq!(nodes[0]["id"], "root");
        assert_eq!(nodes[0]["data"]["stress_budget"], 30);

        let resp = send_request(pool.clone(), &format!("/api/users/{user_id}/stress")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let stress = body_json(resp).await;
        for week in stress["data"].as_array().unwrap() {
            assert!(week["total_stress"].as_i64().unwrap() <= 30);
        }

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_create_user_validation_is_400() {
        let (pool, db_name) = create_test_db().await;

        let resp = post_json(
            pool.clone(),
            "/api/users",
            serde_json::json!({"fitness_level": "beginner", "sessions_per_week": 0}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().starts_with("Validation error:"));

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_create_user_form_redirects_to_plan_page() {
        let (pool, db_name) = create_test_db().await;

        let request = Request::builder()
            .method("POST")
            .uri("/users")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("fitness_level=2&workout_times_per_week=4"))
            .unwrap();
        let resp = send(pool.clone(), request).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let location = resp
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(location.starts_with("/users/") && location.ends_with("/plan"));

        let resp = send_request(pool.clone(), &location).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("id=\"plan-graph\""));
        assert!(html.contains("stress budget 40"));

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_create_user_form_failure_is_not_redirected() {
        let (pool, db_name) = create_test_db().await;

        let request = Request::builder()
            .method("POST")
            .uri("/users")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("fitness_level=5&workout_times_per_week=3"))
            .unwrap();
        let resp = send(pool.clone(), request).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.headers().get(header::LOCATION).is_none());

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_add_and_remove_selection() {
        let (pool, db_name) = create_test_db().await;
        let user = users::insert_user(&pool, FitnessLevel::Beginner, 1)
            .await
            .unwrap();
        let base = format!("/api/users/{}/selections", user.user_id);

        let resp = post_json(
            pool.clone(),
            &base,
            serde_json::json!({"workout_id": "tempo-classic", "week_number": 2}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let added = body_json(resp).await;
        assert_eq!(added["data"]["position_in_week"], 1);
        let selected_id = added["data"]["selected_id"].as_str().unwrap().to_string();

        // One session per week: the week is now full.
        let resp = post_json(
            pool.clone(),
            &base,
            serde_json::json!({"workout_id": "steady-recovery", "week_number": 2}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = post_json(
            pool.clone(),
            &format!("{base}/{selected_id}/remove"),
            serde_json::json!({"workout_id": "tempo-classic"}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send_request(pool.clone(), &base).await;
        let live = body_json(resp).await;
        assert_eq!(live["data"], serde_json::json!([]));

        let resp = post_json(
            pool.clone(),
            &format!("{base}/{}/remove", Uuid::new_v4()),
            serde_json::json!({"workout_id": "tempo-classic"}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_place_selection_at_explicit_slot() {
        let (pool, db_name) = create_test_db().await;
        let user = users::insert_user(&pool, FitnessLevel::Advanced, 3)
            .await
            .unwrap();
        let base = format!("/api/users/{}/selections", user.user_id);

        let resp = post_json(
            pool.clone(),
            &base,
            serde_json::json!({"workout_id": "long-easy", "week_number": 4, "position_in_week": 3}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let placed = body_json(resp).await;
        assert_eq!(placed["data"]["position_in_week"], 3);
        assert_eq!(placed["data"]["week_number"], 4);

        // 12 + 15 fits the advanced budget of 40; a second 15 does not.
        let resp = post_json(
            pool.clone(),
            &base,
            serde_json::json!({"workout_id": "long-progression", "week_number": 4, "position_in_week": 1}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = post_json(
            pool.clone(),
            &base,
            serde_json::json!({"workout_id": "long-progression", "week_number": 4, "position_in_week": 2}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let rejected = body_json(resp).await;
        assert_eq!(rejected["success"], false);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_regenerate_and_unknown_user() {
        let (pool, db_name) = create_test_db().await;
        let user = users::insert_user(&pool, FitnessLevel::Intermediate, 2)
            .await
            .unwrap();

        let resp = post_json(
            pool.clone(),
            &format!("/api/users/{}/plan", user.user_id),
            serde_json::json!({}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(!json["data"]["selections"].as_array().unwrap().is_empty());

        let missing = Uuid::new_v4();
        for uri in [
            format!("/api/users/{missing}/graph"),
            format!("/api/users/{missing}/stress"),
            format!("/api/users/{missing}/selections"),
            format!("/users/{missing}/plan"),
        ] {
            let resp = send_request(pool.clone(), &uri).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        }

        pool.close().await;
        drop_test_db(&db_name).await;
    }
}
