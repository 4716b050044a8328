use axum::{
    body::Body,
    extract::State,
    http::{header::HeaderMap, Request, StatusCode},
    middleware::{from_fn, Next},
    response::{Html, IntoResponse},
    routing::{get, post, put},
    Router,
};
use tower_http::services::ServeDir;

pub mod audit;
pub mod auth;
pub mod core;
pub mod db;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: db::DbPool,
    pub index_template: String,
}

/// Routes plus the auth guard. Transport-level layers (CORS, rate limit,
/// tracing, security headers) are added by the binary.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/index.html", get(serve_index))
        .route("/health", get(health_check))
        // Public API
        .route("/api/donors", get(routes::donors::list_donors))
        .route("/api/categories", get(routes::categories::list_categories))
        .route("/api/display-settings", get(routes::settings::display_settings))
        .route("/api/community", get(routes::community::list_posts).post(routes::community::create_post))
        // Admin API
        .route("/api/admin/me", get(auth::me))
        .route("/api/admin/donations", get(routes::donations::list_donations).post(routes::donations::create_donation))
        .route("/api/admin/donations/import", post(routes::donations::import_donations))
        .route("/api/admin/donations/export", get(routes::donations::export_csv))
        .route("/api/admin/donations/{id}", put(routes::donations::update_donation).delete(routes::donations::delete_donation))
        .route("/api/admin/donations/{id}/approve", post(routes::donations::approve_donation))
        .route("/api/admin/categories", post(routes::categories::create_category))
        .route("/api/admin/categories/order", put(routes::categories::reorder_categories))
        .route("/api/admin/categories/{id}", put(routes::categories::rename_category).delete(routes::categories::delete_category))
        .route("/api/admin/categories/{id}/move-up", post(routes::categories::move_category_up))
        .route("/api/admin/categories/{id}/move-down", post(routes::categories::move_category_down))
        .route("/api/admin/subadmins", get(routes::subadmins::list_subadmins).post(routes::subadmins::create_subadmin))
        .route("/api/admin/subadmins/{id}", put(routes::subadmins::update_subadmin).delete(routes::subadmins::delete_subadmin))
        .route("/api/admin/settings", get(routes::settings::get_settings).put(routes::settings::update_settings))
        .route("/api/admin/logs", get(routes::logs::list_logs))
        .route("/api/admin/logs/export", get(routes::logs::export_logs_csv))
        // Auth Routes
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .nest_service("/assets", ServeDir::new("static/assets"))
        .fallback(get(spa_fallback))
        .layer(from_fn(require_auth))
        .with_state(state)
}

async fn require_auth(req: Request<Body>, next: Next) -> impl IntoResponse {
    // Only operator endpoints need a session; the donor board, category
    // list and community board are public documents.
    let path = req.uri().path();
    if req.method() == axum::http::Method::OPTIONS || !path.starts_with("/api/admin") {
        return next.run(req).await;
    }

    // Check headers for token
    let headers: &HeaderMap = req.headers();
    if let Some(token) = auth::extract_token_from_headers(headers) {
        if auth::validate_token_str(&token).is_ok() {
            return next.run(req).await;
        }
    }

    // Not authenticated: operator routes get 401.
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

async fn health_check() -> &'static str {
    "OK"
}

async fn serve_index(State(state): State<AppState>) -> impl IntoResponse {
    Html(state.index_template.clone())
}

async fn spa_fallback(State(state): State<AppState>, req: Request<Body>) -> impl IntoResponse {
    let path = req.uri().path();
    if path.starts_with("/api/") {
        return StatusCode::NOT_FOUND.into_response();
    }
    serve_index(State(state)).await.into_response()
}
