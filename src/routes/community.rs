use axum::{
    extract::{ConnectInfo, Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::audit;
use crate::db;
use crate::AppState;

const MAX_MESSAGE_LEN: usize = 500;
const POSTS_SHOWN: i64 = 100;

/// Blocklist check for board messages. Kept here as a swappable predicate
/// rather than inside the core; the list covers common English and Hindi
/// slurs in lowercase.
fn message_blocked(message: &str) -> bool {
    const BLOCKLIST: &[&str] = &[
        "idiot", "stupid", "bloody", "kamina", "kaminey", "saala", "sala", "harami",
    ];
    let lowered = message.to_lowercase();
    BLOCKLIST.iter().any(|word| lowered.contains(word))
}

#[derive(Deserialize)]
pub struct PostRequest {
    pub alias: Option<String>,
    pub message: String,
}

pub async fn list_posts(State(state): State<AppState>) -> Response {
    match db::get_settings(&state.db).await {
        Ok(settings) if !settings.community_enabled => {
            (StatusCode::FORBIDDEN, "Community board is disabled").into_response()
        }
        Ok(_) => match db::list_community_posts(&state.db, POSTS_SHOWN).await {
            Ok(posts) => AxumJson(serde_json::json!({ "posts": posts })).into_response(),
            Err(e) => {
                tracing::error!("Community list failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
            }
        },
        Err(e) => {
            tracing::error!("Settings fetch failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_post(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<PostRequest>,
) -> Response {
    match db::get_settings(&state.db).await {
        Ok(settings) if !settings.community_enabled => {
            return (StatusCode::FORBIDDEN, "Community board is disabled").into_response()
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("Settings fetch failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    let message = req.message.trim().to_string();
    if message.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Message is required").into_response();
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Message is too long").into_response();
    }
    if message_blocked(&message) {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Message rejected").into_response();
    }

    let alias = req
        .alias
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());

    let id = Uuid::new_v4().to_string();
    if let Err(e) =
        db::add_community_post(&state.db, &id, &alias, &message, chrono::Utc::now()).await
    {
        tracing::error!("Community post failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    audit::record(
        &state.db,
        "community_posted",
        "community_posts",
        Some(&id),
        &format!("Board post by {}", alias.as_deref().unwrap_or("anonymous")),
        "visitor",
        audit::KIND_ANONYMOUS,
        &addr.ip().to_string(),
    )
    .await;

    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({ "status": "created", "id": id })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::message_blocked;

    #[test]
    fn blocklist_is_case_insensitive() {
        assert!(message_blocked("What an IDIOT move"));
        assert!(!message_blocked("Wishing everyone a blessed festival"));
    }
}
