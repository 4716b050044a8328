use axum::{http::StatusCode, response::IntoResponse};

use crate::auth::{self, AuthSession};
use crate::core::permissions::Actor;
use crate::AppState;

pub mod categories;
pub mod community;
pub mod donations;
pub mod donors;
pub mod logs;
pub mod settings;
pub mod subadmins;

/// Loads the explicit actor for the current session, or the error response
/// to return instead. Sessions whose account has been deleted get a 401.
pub(crate) async fn require_actor(
    state: &AppState,
    session: &AuthSession,
) -> Result<Actor, axum::response::Response> {
    match auth::resolve_actor(&state.db, session).await {
        Ok(Some(actor)) => Ok(actor),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "Unknown account").into_response()),
        Err(e) => {
            tracing::error!("Actor resolution failed: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response())
        }
    }
}
