// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, generate, projects, quiz},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (admin, projects, quiz, generation).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (`AppState`).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    // Every generation response is uncacheable, the 405 for other methods included.
    let generate_route = get(generate::generator_status)
        .post(generate::generate_questions)
        .fallback(generate::method_not_allowed)
        .layer(ServiceBuilder::new().layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        )));

    let project_routes = Router::new()
        .route("/", get(projects::list_published))
        .route("/{id}/respondents", get(projects::list_respondents));

    let quiz_routes = Router::new()
        .route("/sessions", post(quiz::create_session))
        .route(
            "/sessions/{id}",
            get(quiz::get_session).delete(quiz::delete_session),
        )
        .route("/sessions/{id}/identity", post(quiz::set_identity))
        .route("/sessions/{id}/answers", put(quiz::answer))
        .route("/sessions/{id}/grade", post(quiz::grade))
        .route("/sessions/{id}/retry", post(quiz::retry))
        .route("/sessions/{id}/submit", post(quiz::submit))
        .route("/sessions/{id}/reset", post(quiz::reset));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/roster", post(admin::replace_roster))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/projects",
            get(admin::list_projects).post(admin::create_project),
        )
        .route(
            "/projects/{id}",
            get(admin::get_project)
                .put(admin::update_project)
                .delete(admin::delete_project),
        )
        .route("/projects/{id}/publish", put(admin::set_published))
        .route("/submissions", get(admin::list_submissions))
        .route("/submissions/{id}", delete(admin::delete_submission))
        .route("/attempts", get(admin::list_attempts));

    Router::new()
        .route("/api/status", get(projects::status))
        .route("/api/generate-questions", generate_route)
        .nest("/api/projects", project_routes)
        .nest("/api/quiz", quiz_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
