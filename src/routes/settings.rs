use axum::{
    extract::{ConnectInfo, Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::audit;
use crate::auth::{AuthSession, ROLE_ADMIN};
use crate::db;
use crate::AppState;

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub view_mode: Option<String>,
    pub community_enabled: Option<bool>,
    pub show_dates: Option<bool>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

/// Flags the public front-end needs; credentials stay out.
pub async fn display_settings(State(state): State<AppState>) -> Response {
    match db::get_settings(&state.db).await {
        Ok(settings) => AxumJson(serde_json::json!({
            "view_mode": settings.view_mode,
            "community_enabled": settings.community_enabled,
            "show_dates": settings.show_dates,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Settings fetch failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn get_settings(State(state): State<AppState>, session: AuthSession) -> Response {
    if session.role != ROLE_ADMIN {
        return (StatusCode::FORBIDDEN, "Admin only").into_response();
    }
    match db::get_settings(&state.db).await {
        Ok(settings) => AxumJson(serde_json::json!({
            "view_mode": settings.view_mode,
            "community_enabled": settings.community_enabled,
            "show_dates": settings.show_dates,
            "admin_username": settings.admin_username,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Settings fetch failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_settings(
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Response {
    if session.role != ROLE_ADMIN {
        return (StatusCode::FORBIDDEN, "Admin only").into_response();
    }

    if let Some(mode) = &req.view_mode {
        if mode != "list" && mode != "grouped" {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                "View mode must be list or grouped",
            )
                .into_response();
        }
    }
    if req.admin_username.as_deref().is_some_and(|u| u.trim().is_empty()) {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Admin username is required").into_response();
    }
    if req.admin_password.as_deref() == Some("") {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Admin password is required").into_response();
    }

    let mut changed: Vec<&str> = Vec::new();
    if req.view_mode.is_some() {
        changed.push("view_mode");
    }
    if req.community_enabled.is_some() {
        changed.push("community_enabled");
    }
    if req.show_dates.is_some() {
        changed.push("show_dates");
    }
    if req.admin_username.is_some() {
        changed.push("admin_username");
    }
    if req.admin_password.is_some() {
        changed.push("admin_credential");
    }
    if changed.is_empty() {
        return (StatusCode::OK, AxumJson(serde_json::json!({ "status": "unchanged" })))
            .into_response();
    }

    if let Err(e) = db::update_settings(
        &state.db,
        req.view_mode,
        req.community_enabled,
        req.show_dates,
        req.admin_username.map(|u| u.trim().to_string()),
        req.admin_password,
    )
    .await
    {
        tracing::error!("Settings update failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    audit::record(
        &state.db,
        "settings_updated",
        "settings",
        None,
        &format!("Changed {}", changed.join(", ")),
        &session.id,
        &session.role,
        &addr.ip().to_string(),
    )
    .await;

    (StatusCode::OK, AxumJson(serde_json::json!({ "status": "updated" }))).into_response()
}
