use axum::{
    extract::{ConnectInfo, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::audit;
use crate::auth::{AuthSession, ROLE_ADMIN};
use crate::db::{self, models::SubAdmin};
use crate::AppState;

/// Outward shape of an account. The stored secret never appears here.
#[derive(Serialize)]
pub struct SubAdminView {
    pub id: String,
    pub username: String,
    pub can_add: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_manage_categories: bool,
    pub assigned_categories: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SubAdmin> for SubAdminView {
    fn from(account: SubAdmin) -> Self {
        SubAdminView {
            id: account.id,
            username: account.username,
            can_add: account.can_add,
            can_edit: account.can_edit,
            can_delete: account.can_delete,
            can_manage_categories: account.can_manage_categories,
            assigned_categories: account.assigned_categories,
            created_at: account.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateSubAdminRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub can_add: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_manage_categories: bool,
    #[serde(default)]
    pub assigned_categories: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateSubAdminRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub can_add: Option<bool>,
    pub can_edit: Option<bool>,
    pub can_delete: Option<bool>,
    pub can_manage_categories: Option<bool>,
    pub assigned_categories: Option<Vec<String>>,
}

fn admin_only(session: &AuthSession) -> Option<Response> {
    if session.role != ROLE_ADMIN {
        return Some((StatusCode::FORBIDDEN, "Admin only").into_response());
    }
    None
}

pub async fn list_subadmins(State(state): State<AppState>, session: AuthSession) -> Response {
    if let Some(denied) = admin_only(&session) {
        return denied;
    }
    match db::list_subadmins(&state.db).await {
        Ok(accounts) => {
            let views: Vec<SubAdminView> = accounts.into_iter().map(Into::into).collect();
            AxumJson(serde_json::json!({ "subadmins": views })).into_response()
        }
        Err(e) => {
            tracing::error!("Sub-admin list failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_subadmin(
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CreateSubAdminRequest>,
) -> Response {
    if let Some(denied) = admin_only(&session) {
        return denied;
    }

    let username = req.username.trim().to_string();
    if username.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Username is required").into_response();
    }
    if req.password.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Password is required").into_response();
    }

    match db::find_subadmin_by_username(&state.db, &username).await {
        Ok(Some(_)) => {
            return (StatusCode::CONFLICT, "Username already exists").into_response()
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Sub-admin lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    let account = SubAdmin {
        id: Uuid::new_v4().to_string(),
        username: username.clone(),
        secret: req.password,
        can_add: req.can_add,
        can_edit: req.can_edit,
        can_delete: req.can_delete,
        can_manage_categories: req.can_manage_categories,
        assigned_categories: req.assigned_categories,
        created_at: Utc::now(),
    };

    if let Err(e) = db::create_subadmin(&state.db, &account).await {
        tracing::error!("Sub-admin create failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    audit::record(
        &state.db,
        "subadmin_added",
        "subadmins",
        Some(&account.id),
        &format!("Added sub-admin {}", username),
        &session.id,
        &session.role,
        &addr.ip().to_string(),
    )
    .await;

    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({ "status": "created", "id": account.id })),
    )
        .into_response()
}

pub async fn update_subadmin(
    Path(id): Path<String>,
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<UpdateSubAdminRequest>,
) -> Response {
    if let Some(denied) = admin_only(&session) {
        return denied;
    }

    let username = req.username.as_ref().map(|u| u.trim().to_string());
    if username.as_deref() == Some("") {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Username is required").into_response();
    }
    if req.password.as_deref() == Some("") {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Password is required").into_response();
    }

    // A username change must not collide with another account.
    if let Some(new_username) = &username {
        match db::find_subadmin_by_username(&state.db, new_username).await {
            Ok(Some(existing)) if existing.id != id => {
                return (StatusCode::CONFLICT, "Username already exists").into_response()
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Sub-admin lookup failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
            }
        }
    }

    match db::update_subadmin(
        &state.db,
        &id,
        username,
        req.password,
        req.can_add,
        req.can_edit,
        req.can_delete,
        req.can_manage_categories,
        req.assigned_categories,
    )
    .await
    {
        Ok(true) => {
            audit::record(
                &state.db,
                "subadmin_updated",
                "subadmins",
                Some(&id),
                &format!("Updated sub-admin {}", id),
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
            tracing::error!("Sub-admin update failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_subadmin(
    Path(id): Path<String>,
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    if let Some(denied) = admin_only(&session) {
        return denied;
    }

    match db::delete_subadmin(&state.db, &id).await {
        Ok(true) => {
            audit::record(
                &state.db,
                "subadmin_deleted",
                "subadmins",
                Some(&id),
                &format!("Deleted sub-admin {}", id),
                &session.id,
                &session.role,
                &addr.ip().to_string(),
            )
            .await;
            (StatusCode::OK, "Deleted").into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Sub-admin delete failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
