use std::future::Future;
use axum::{
    extract::{ConnectInfo, FromRequestParts, Json, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use chrono::{Duration, Utc};

use crate::audit;
use crate::core::permissions::{Actor, PermissionSet};
use crate::db::{self, DbPool};
use crate::AppState;

const AUTH_COOKIE_NAME: &str = "auth_token";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_SUBADMIN: &str = "subadmin";

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub id: String,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    exp: usize,
}

/// Identity carried by a valid token. Permissions are not embedded here;
/// they are loaded fresh from storage via [`resolve_actor`] so grant edits
/// take effect on the next request.
pub struct AuthSession {
    pub id: String,
    pub role: String,
}

impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync + 'static,
{
    type Rejection = (StatusCode, String);

    fn from_request_parts(parts: &mut Parts, _state: &S) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let token = extract_token_from_headers(&parts.headers)
                .ok_or((StatusCode::UNAUTHORIZED, "Missing auth token".to_string()))?;
            let session = validate_token_str(&token).map_err(|e| {
                tracing::error!("Token error: {}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            })?;

            Ok(session)
        }
    }
}

/// Builds the explicit actor every core call receives. `None` means the
/// session points at an account that no longer exists.
pub async fn resolve_actor(pool: &DbPool, session: &AuthSession) -> anyhow::Result<Option<Actor>> {
    if session.role == ROLE_ADMIN {
        return Ok(Some(Actor::Admin));
    }
    let Some(account) = db::get_subadmin(pool, &session.id).await? else {
        return Ok(None);
    };
    Ok(Some(Actor::SubAdmin(PermissionSet {
        can_add: account.can_add,
        can_edit: account.can_edit,
        can_delete: account.can_delete,
        can_manage_categories: account.can_manage_categories,
        assigned_categories: account.assigned_categories,
    })))
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let origin = addr.ip().to_string();

    let settings = match db::get_settings(&state.db).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Settings fetch failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    if payload.username == settings.admin_username && payload.password == settings.admin_secret {
        let env_mode = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
        if env_mode == "production" && settings.admin_secret == "changeme" {
            tracing::warn!("Refusing admin login with the seed credential in production");
            return (StatusCode::FORBIDDEN, "Admin credential not configured").into_response();
        }
        return issue_session(
            &state,
            "admin",
            &settings.admin_username,
            ROLE_ADMIN,
            &origin,
        )
        .await;
    }

    match db::find_subadmin_by_username(&state.db, &payload.username).await {
        Ok(Some(account)) if account.secret == payload.password => {
            issue_session(&state, &account.id, &account.username, ROLE_SUBADMIN, &origin).await
        }
        Ok(_) => {
            audit::record(
                &state.db,
                "login_failed",
                "session",
                None,
                &format!("Failed login for username {}", payload.username),
                &payload.username,
                audit::KIND_ANONYMOUS,
                &origin,
            )
            .await;
            (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response()
        }
        Err(e) => {
            tracing::error!("Login lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

async fn issue_session(
    state: &AppState,
    id: &str,
    username: &str,
    role: &str,
    origin: &str,
) -> axum::response::Response {
    let token = match create_jwt(id, role) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("JWT creation failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Auth failed").into_response();
        }
    };

    audit::record(
        &state.db,
        "login",
        "session",
        None,
        &format!("{} logged in", username),
        id,
        role,
        origin,
    )
    .await;

    let cookie = build_auth_cookie(&token);
    let body = LoginResponse {
        id: id.to_string(),
        username: username.to_string(),
        role: role.to_string(),
    };
    let mut response = Json(body).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
    response
}

pub async fn logout() -> impl IntoResponse {
    let cookie = clear_auth_cookie();
    let mut response = (StatusCode::OK, "OK").into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
    response
}

pub async fn me(session: AuthSession) -> impl IntoResponse {
    Json(serde_json::json!({ "id": session.id, "role": session.role }))
}

fn create_jwt(id: &str, role: &str) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(1))
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: id.to_string(),
        role: role.to_string(),
        exp: expiration as usize,
    };

    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))?;

    Ok(token)
}

pub fn validate_token_str(token: &str) -> anyhow::Result<AuthSession> {
    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;
    Ok(AuthSession {
        id: data.claims.sub,
        role: data.claims.role,
    })
}

pub fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if auth_header.starts_with("Bearer ") {
            return Some(auth_header[7..].to_string());
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|h| h.to_str().ok()) {
        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some((k, v)) = cookie.split_once('=') {
                if k == AUTH_COOKIE_NAME {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn build_auth_cookie(token: &str) -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=86400",
        AUTH_COOKIE_NAME, token
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_auth_cookie() -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        AUTH_COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
