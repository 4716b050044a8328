use axum::body::{to_bytes, Body};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower::ServiceExt;
use uuid::Uuid;

use mandir_ledger::{create_app, db, AppState};

const TEST_SECRET: &str = "api-test-secret";

fn test_app() -> Router {
    std::env::set_var("JWT_SECRET", TEST_SECRET);
    let path = std::env::temp_dir().join(format!("mandir-api-{}.db", Uuid::new_v4()));
    let pool = db::init_pool_at(path.to_str().expect("utf8 path")).expect("init pool");
    let state = AppState {
        db: pool,
        index_template: "<html></html>".to_string(),
    };
    create_app(state).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 3000))))
}

#[derive(serde::Serialize)]
struct TestClaims {
    sub: String,
    role: String,
    exp: usize,
}

fn mint_token(sub: &str, role: &str) -> String {
    let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize;
    let claims = TestClaims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_ref()),
    )
    .expect("encode token")
}

fn authed(request: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    request.header("cookie", format!("auth_token={}", token))
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), 1024 * 1024).await.expect("read body");
    serde_json::from_slice(&body).expect("json body")
}

async fn create_category(app: &Router, token: &str, name: &str) -> String {
    let request = authed(
        Request::builder()
            .method("POST")
            .uri("/api/admin/categories")
            .header("content-type", "application/json"),
        token,
    )
    .body(Body::from(json!({ "name": name }).to_string()))
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    body["id"].as_str().expect("category id").to_string()
}

async fn create_donation(app: &Router, token: &str, category_id: &str, donor: &str, amount: i64) {
    let request = authed(
        Request::builder()
            .method("POST")
            .uri("/api/admin/donations")
            .header("content-type", "application/json"),
        token,
    )
    .body(Body::from(
        json!({
            "donor_name": donor,
            "amount": amount,
            "date": "2026-03-01",
            "category_id": category_id,
        })
        .to_string(),
    ))
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn health_check_works() {
    let app = test_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn operator_routes_require_a_token() {
    let app = test_app();
    let request = Request::builder()
        .uri("/api/admin/donations")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subadmin_without_grants_is_denied() {
    let app = test_app();
    let admin = mint_token("admin", "admin");
    let category_id = create_category(&app, &admin, "Annadaan").await;

    // A locked-down sub-admin created through the API
    let request = authed(
        Request::builder()
            .method("POST")
            .uri("/api/admin/subadmins")
            .header("content-type", "application/json"),
        &admin,
    )
    .body(Body::from(
        json!({ "username": "ramu", "password": "seva123" }).to_string(),
    ))
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let subadmin_id = json_body(response).await["id"]
        .as_str()
        .expect("subadmin id")
        .to_string();

    let token = mint_token(&subadmin_id, "subadmin");
    let request = authed(
        Request::builder()
            .method("POST")
            .uri("/api/admin/donations")
            .header("content-type", "application/json"),
        &token,
    )
    .body(Body::from(
        json!({
            "donor_name": "Ram",
            "amount": 100,
            "date": "2026-03-01",
            "category_id": category_id,
        })
        .to_string(),
    ))
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Nothing was written
    let request = authed(
        Request::builder().uri("/api/admin/donations"),
        &admin,
    )
    .body(Body::empty())
    .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["donations"].as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn donor_board_aggregates_and_filters() {
    let app = test_app();
    let admin = mint_token("admin", "admin");
    let category_id = create_category(&app, &admin, "Bhandara").await;

    create_donation(&app, &admin, &category_id, "Ram", 500).await;
    create_donation(&app, &admin, &category_id, "ram", 300).await;
    create_donation(&app, &admin, &category_id, "Gita", 0).await;

    let request = Request::builder()
        .uri("/api/donors?q=ram")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let donors = body["donors"].as_array().expect("array");
    assert_eq!(donors.len(), 1);
    assert_eq!(donors[0]["total"], 800);
    assert_eq!(donors[0]["history"].as_array().expect("history").len(), 2);

    // Pledged view shows only the zero-amount donor
    let request = Request::builder()
        .uri("/api/donors?payment=pledged")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let body = json_body(response).await;
    let donors = body["donors"].as_array().expect("array");
    assert_eq!(donors.len(), 1);
    assert_eq!(donors[0]["donor_name"], "Gita");

    // An unknown payment value is a bad request
    let request = Request::builder()
        .uri("/api/donors?payment=partial")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn category_delete_conflict_reports_blocking_count() {
    let app = test_app();
    let admin = mint_token("admin", "admin");
    let category_id = create_category(&app, &admin, "Annadaan").await;
    create_donation(&app, &admin, &category_id, "Ram", 500).await;

    let request = authed(
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/admin/categories/{}", category_id)),
        &admin,
    )
    .body(Body::empty())
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["donations"], 1);

    // Still listed afterwards
    let request = Request::builder()
        .uri("/api/categories")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["categories"].as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn community_board_is_gated_by_settings() {
    let app = test_app();

    // Disabled by default
    let request = Request::builder()
        .uri("/api/community")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admin switches the board on
    let admin = mint_token("admin", "admin");
    let request = authed(
        Request::builder()
            .method("PUT")
            .uri("/api/admin/settings")
            .header("content-type", "application/json"),
        &admin,
    )
    .body(Body::from(json!({ "community_enabled": true }).to_string()))
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method("POST")
        .uri("/api/community")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "alias": "bhakt", "message": "Jai Shri Ram" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let request = Request::builder()
        .uri("/api/community")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["posts"].as_array().expect("array").len(), 1);
}
