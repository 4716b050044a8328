use axum::{
    extract::{ConnectInfo, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::audit;
use crate::auth::AuthSession;
use crate::core::ordering;
use crate::core::permissions::{is_allowed, Action};
use crate::db;
use crate::routes::require_actor;
use crate::AppState;

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct OrderAssignment {
    pub id: String,
    pub order_key: i64,
}

/// Public listing in display order.
pub async fn list_categories(State(state): State<AppState>) -> Response {
    match db::list_categories(&state.db).await {
        Ok(list) => {
            let ordered = ordering::sort_for_display(list);
            AxumJson(serde_json::json!({ "categories": ordered })).into_response()
        }
        Err(e) => {
            tracing::error!("Category list failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_category(
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CategoryRequest>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::ManageCategories) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Category name is required").into_response();
    }

    let existing = match db::list_categories(&state.db).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("Category list failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let id = Uuid::new_v4().to_string();
    let order_key = ordering::next_order_key(&existing);
    if let Err(e) = db::create_category(&state.db, &id, &name, order_key, chrono::Utc::now()).await
    {
        tracing::error!("Category create failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    audit::record(
        &state.db,
        "category_added",
        "categories",
        Some(&id),
        &format!("Added category {}", name),
        &session.id,
        &session.role,
        &addr.ip().to_string(),
    )
    .await;

    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({ "status": "created", "id": id, "order_key": order_key })),
    )
        .into_response()
}

pub async fn rename_category(
    Path(id): Path<String>,
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CategoryRequest>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::ManageCategories) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Category name is required").into_response();
    }

    match db::rename_category(&state.db, &id, &name).await {
        Ok(true) => {
            audit::record(
                &state.db,
                "category_updated",
                "categories",
                Some(&id),
                &format!("Renamed category to {}", name),
                &session.id,
                &session.role,
                &addr.ip().to_string(),
            )
            .await;
            (StatusCode::OK, AxumJson(serde_json::json!({ "status": "updated", "id": id })))
                .into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Category rename failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Refused while donations still reference the category; the conflict body
/// carries the blocking count so the caller can report it.
pub async fn delete_category(
    Path(id): Path<String>,
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::ManageCategories) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }

    let referencing = match db::count_donations_for_category(&state.db, &id).await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("Category reference count failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if referencing > 0 {
        return (
            StatusCode::CONFLICT,
            AxumJson(serde_json::json!({
                "error": "Category has donations",
                "donations": referencing,
            })),
        )
            .into_response();
    }

    match db::delete_category(&state.db, &id).await {
        Ok(true) => {
            audit::record(
                &state.db,
                "category_deleted",
                "categories",
                Some(&id),
                &format!("Deleted category {}", id),
                &session.id,
                &session.role,
                &addr.ip().to_string(),
            )
            .await;
            (StatusCode::OK, "Deleted").into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Category delete failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn move_category_up(
    Path(id): Path<String>,
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    move_category(state, session, addr, id, Direction::Up).await
}

pub async fn move_category_down(
    Path(id): Path<String>,
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    move_category(state, session, addr, id, Direction::Down).await
}

enum Direction {
    Up,
    Down,
}

async fn move_category(
    state: AppState,
    session: AuthSession,
    addr: SocketAddr,
    id: String,
    direction: Direction,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::ManageCategories) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }

    let categories = match db::list_categories(&state.db).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("Category list failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if !categories.iter().any(|c| c.id == id) {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    let (plan, action) = match direction {
        Direction::Up => (ordering::plan_move_up(&categories, &id), "category_moved_up"),
        Direction::Down => (ordering::plan_move_down(&categories, &id), "category_moved_down"),
    };

    // Already at the boundary: nothing to exchange.
    let Some(assignments) = plan else {
        return (StatusCode::OK, AxumJson(serde_json::json!({ "status": "unchanged", "id": id })))
            .into_response();
    };

    if let Err(e) = db::swap_category_order(&state.db, assignments).await {
        tracing::error!("Category move failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    audit::record(
        &state.db,
        action,
        "categories",
        Some(&id),
        &format!("Reordered category {}", id),
        &session.id,
        &session.role,
        &addr.ip().to_string(),
    )
    .await;

    (StatusCode::OK, AxumJson(serde_json::json!({ "status": "moved", "id": id }))).into_response()
}

/// Applies each assignment independently, best effort: a row that fails is
/// logged and skipped, earlier assignments stay applied.
pub async fn reorder_categories(
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(assignments): Json<Vec<OrderAssignment>>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::ManageCategories) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }

    let mut updated = 0usize;
    for assignment in &assignments {
        match db::set_category_order(&state.db, &assignment.id, assignment.order_key).await {
            Ok(true) => updated += 1,
            Ok(false) => tracing::warn!("Reorder skipped unknown category {}", assignment.id),
            Err(e) => tracing::error!("Reorder failed for {}: {}", assignment.id, e),
        }
    }

    audit::record(
        &state.db,
        "categories_reordered",
        "categories",
        None,
        &format!("Reordered {} of {} categories", updated, assignments.len()),
        &session.id,
        &session.role,
        &addr.ip().to_string(),
    )
    .await;

    (StatusCode::OK, AxumJson(serde_json::json!({ "updated": updated }))).into_response()
}
