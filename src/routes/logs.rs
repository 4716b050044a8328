use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;

use crate::auth::{AuthSession, ROLE_ADMIN};
use crate::db;
use crate::AppState;

#[derive(Deserialize)]
pub struct LogParams {
    pub since: Option<String>, // RFC3339
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        let escaped = s.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        s.to_string()
    }
}

fn parse_since(raw: &Option<String>) -> Option<chrono::DateTime<chrono::Utc>> {
    raw.as_ref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

pub async fn list_logs(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<LogParams>,
) -> Response {
    if session.role != ROLE_ADMIN {
        return (StatusCode::FORBIDDEN, "Admin only").into_response();
    }

    match db::list_activity_logs(&state.db, parse_since(&params.since)).await {
        Ok(logs) => AxumJson(serde_json::json!({ "logs": logs })).into_response(),
        Err(e) => {
            tracing::error!("Activity log query failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn export_logs_csv(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<LogParams>,
) -> Response {
    if session.role != ROLE_ADMIN {
        return (StatusCode::FORBIDDEN, "Admin only").into_response();
    }

    match db::list_activity_logs(&state.db, parse_since(&params.since)).await {
        Ok(logs) => {
            let mut w = String::new();
            w.push_str("id,action,entity,entity_id,details,actor_id,actor_kind,origin,created_at\n");
            for entry in logs {
                let entity_id = entry.entity_id.unwrap_or_default();
                let details = entry.details.unwrap_or_default();
                let created = entry.created_at.to_rfc3339();
                w.push_str(&format!(
                    "{},{},{},{},{},{},{},{},{}\n",
                    csv_escape(&entry.id),
                    csv_escape(&entry.action),
                    csv_escape(&entry.entity),
                    csv_escape(&entity_id),
                    csv_escape(&details),
                    csv_escape(&entry.actor_id),
                    csv_escape(&entry.actor_kind),
                    csv_escape(&entry.origin),
                    csv_escape(&created),
                ));
            }

            let mut resp = Response::new(w.into());
            let headers = resp.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            );
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=activity_logs.csv"),
            );
            resp
        }
        Err(e) => {
            tracing::error!("Activity log query failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
