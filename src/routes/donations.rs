use axum::{
    extract::{ConnectInfo, Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use uuid::Uuid;
use chrono::NaiveDate;

use crate::audit;
use crate::auth::{AuthSession, ROLE_SUBADMIN};
use crate::core::ordering;
use crate::core::permissions::{is_allowed, Action, Actor};
use crate::db::{self, models};
use crate::routes::require_actor;
use crate::AppState;

use axum::http::{header, HeaderValue};

#[derive(Deserialize)]
pub struct CreateDonationRequest {
    pub donor_name: String,
    pub amount: Option<i64>,
    pub date: Option<String>, // YYYY-MM-DD
    pub category_id: String,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateDonationRequest {
    pub donor_name: Option<String>,
    pub amount: Option<i64>,
    pub date: Option<String>, // YYYY-MM-DD
    pub category_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct ImportCsvRequest {
    pub csv: String,
}

fn category_accessible(actor: &Actor, category_id: &str) -> bool {
    is_allowed(actor, &Action::AccessCategory(category_id))
}

pub async fn list_donations(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<ListParams>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };

    match db::list_donations(&state.db, params.status.as_deref()).await {
        Ok(donations) => {
            let visible: Vec<_> = donations
                .into_iter()
                .filter(|d| category_accessible(&actor, &d.category_id))
                .collect();
            AxumJson(serde_json::json!({ "donations": visible })).into_response()
        }
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_donation(
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CreateDonationRequest>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::AddDonation) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }
    if !category_accessible(&actor, &req.category_id) {
        return (StatusCode::FORBIDDEN, "Category not assigned").into_response();
    }

    let donor_name = req.donor_name.trim().to_string();
    if donor_name.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Donor name is required").into_response();
    }
    if req.amount.is_some_and(|a| a < 0) {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Amount must not be negative").into_response();
    }

    // Sub-admin submissions need review before they reach the public
    // totals, and must carry a complete amount and date.
    let is_subadmin = session.role == ROLE_SUBADMIN;
    let status = if is_subadmin {
        models::STATUS_PENDING
    } else {
        models::STATUS_APPROVED
    };
    if is_subadmin && (req.amount.is_none() || req.date.is_none()) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Amount and date are required for sub-admin submissions",
        )
            .into_response();
    }

    let date = match &req.date {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) if is_subadmin => {
                return (StatusCode::UNPROCESSABLE_ENTITY, "Invalid date, expected YYYY-MM-DD")
                    .into_response()
            }
            Err(_) => chrono::Utc::now().date_naive(),
        },
        None => chrono::Utc::now().date_naive(),
    };

    match db::get_category(&state.db, &req.category_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (StatusCode::UNPROCESSABLE_ENTITY, "Unknown category").into_response()
        }
        Err(e) => {
            tracing::error!("Category lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    let id = Uuid::new_v4().to_string();
    let amount = req.amount.unwrap_or(0);
    if let Err(e) = db::add_donation(
        &state.db,
        &id,
        &donor_name,
        amount,
        date,
        &req.category_id,
        &req.notes,
        status,
        chrono::Utc::now(),
    )
    .await
    {
        tracing::error!("DB Error: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    audit::record(
        &state.db,
        "donation_added",
        "donations",
        Some(&id),
        &format!("Added donation of {} by {} ({})", amount, donor_name, status),
        &session.id,
        &session.role,
        &addr.ip().to_string(),
    )
    .await;

    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({ "status": "created", "id": id })),
    )
        .into_response()
}

pub async fn update_donation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<UpdateDonationRequest>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::EditDonation) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }

    let existing = match db::get_donation(&state.db, &id).await {
        Ok(Some(d)) => d,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Donation lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if !category_accessible(&actor, &existing.category_id) {
        return (StatusCode::FORBIDDEN, "Category not assigned").into_response();
    }

    if req.amount.is_some_and(|a| a < 0) {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Amount must not be negative").into_response();
    }
    if let Some(name) = &req.donor_name {
        if name.trim().is_empty() {
            return (StatusCode::UNPROCESSABLE_ENTITY, "Donor name is required").into_response();
        }
    }

    let date = match &req.date {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                return (StatusCode::UNPROCESSABLE_ENTITY, "Invalid date, expected YYYY-MM-DD")
                    .into_response()
            }
        },
        None => None,
    };

    if let Some(new_category) = &req.category_id {
        if !category_accessible(&actor, new_category) {
            return (StatusCode::FORBIDDEN, "Category not assigned").into_response();
        }
        match db::get_category(&state.db, new_category).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return (StatusCode::UNPROCESSABLE_ENTITY, "Unknown category").into_response()
            }
            Err(e) => {
                tracing::error!("Category lookup failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
            }
        }
    }

    let donor_name = req.donor_name.as_ref().map(|n| n.trim().to_string());
    match db::update_donation(
        &state.db,
        &id,
        donor_name,
        req.amount,
        date,
        req.category_id.clone(),
        &req.notes,
    )
    .await
    {
        Ok(true) => {
            audit::record(
                &state.db,
                "donation_updated",
                "donations",
                Some(&id),
                &format!("Updated donation {}", id),
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
            tracing::error!("Update donation error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_donation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::DeleteDonation) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }

    let existing = match db::get_donation(&state.db, &id).await {
        Ok(Some(d)) => d,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Donation lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if !category_accessible(&actor, &existing.category_id) {
        return (StatusCode::FORBIDDEN, "Category not assigned").into_response();
    }

    match db::delete_donation(&state.db, &id).await {
        Ok(true) => {
            audit::record(
                &state.db,
                "donation_deleted",
                "donations",
                Some(&id),
                &format!("Deleted donation by {}", existing.donor_name),
                &session.id,
                &session.role,
                &addr.ip().to_string(),
            )
            .await;
            (StatusCode::OK, "Deleted").into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Delete donation error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn approve_donation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::EditDonation) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }

    let existing = match db::get_donation(&state.db, &id).await {
        Ok(Some(d)) => d,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Donation lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if !category_accessible(&actor, &existing.category_id) {
        return (StatusCode::FORBIDDEN, "Category not assigned").into_response();
    }

    match db::approve_donation(&state.db, &id).await {
        Ok(true) => {
            audit::record(
                &state.db,
                "donation_approved",
                "donations",
                Some(&id),
                &format!("Approved donation by {}", existing.donor_name),
                &session.id,
                &session.role,
                &addr.ip().to_string(),
            )
            .await;
            (StatusCode::OK, AxumJson(serde_json::json!({ "status": "approved", "id": id })))
                .into_response()
        }
        Ok(false) => (StatusCode::CONFLICT, "Already approved").into_response(),
        Err(e) => {
            tracing::error!("Approve donation error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Bulk import from a CSV payload with a header row. Columns:
/// donor_name, amount, date (YYYY-MM-DD), category_name, notes.
/// Rows the actor may not write are skipped, not failed.
pub async fn import_donations(
    State(state): State<AppState>,
    session: AuthSession,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ImportCsvRequest>,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };
    if !is_allowed(&actor, &Action::AddDonation) {
        return (StatusCode::FORBIDDEN, "Not permitted").into_response();
    }

    let is_subadmin = session.role == ROLE_SUBADMIN;
    let status = if is_subadmin {
        models::STATUS_PENDING
    } else {
        models::STATUS_APPROVED
    };
    let origin = addr.ip().to_string();

    // Resolved once up front; refreshed locally when the import creates a
    // category mid-run.
    let mut categories = match db::list_categories(&state.db).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("Category list failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(req.csv.as_bytes());
    let mut imported = 0usize;
    let mut skipped = 0usize;

    for record in reader.records() {
        let rec = match record {
            Ok(rec) => rec,
            Err(e) => {
                tracing::error!("CSV parse error: {}", e);
                skipped += 1;
                continue;
            }
        };

        let donor_name = rec.get(0).unwrap_or("").trim().to_string();
        if donor_name.is_empty() {
            skipped += 1;
            continue;
        }
        let amount = rec.get(1).and_then(|s| s.trim().parse::<i64>().ok());
        let date = rec
            .get(2)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok());
        let category_name = rec.get(3).unwrap_or("").trim().to_string();
        let notes = rec
            .get(4)
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty());

        if amount.is_some_and(|a| a < 0) {
            skipped += 1;
            continue;
        }
        if is_subadmin && (amount.is_none() || date.is_none()) {
            skipped += 1;
            continue;
        }

        let resolved = categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(&category_name))
            .map(|c| c.id.clone());
        let category_id = match resolved {
            Some(existing) => existing,
            None => {
                if category_name.is_empty()
                    || !is_allowed(&actor, &Action::ManageCategories)
                {
                    skipped += 1;
                    continue;
                }
                let new_id = Uuid::new_v4().to_string();
                let now = chrono::Utc::now();
                let order_key = ordering::next_order_key(&categories);
                if let Err(e) =
                    db::create_category(&state.db, &new_id, &category_name, order_key, now).await
                {
                    tracing::error!("Import category create failed: {}", e);
                    skipped += 1;
                    continue;
                }
                categories.push(models::Category {
                    id: new_id.clone(),
                    name: category_name.clone(),
                    order_key,
                    created_at: now,
                });
                new_id
            }
        };

        if !category_accessible(&actor, &category_id) {
            skipped += 1;
            continue;
        }

        let id = Uuid::new_v4().to_string();
        let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
        if let Err(e) = db::add_donation(
            &state.db,
            &id,
            &donor_name,
            amount.unwrap_or(0),
            date,
            &category_id,
            &notes,
            status,
            chrono::Utc::now(),
        )
        .await
        {
            tracing::error!("Import add_donation failed: {}", e);
            skipped += 1;
        } else {
            imported += 1;
            audit::record(
                &state.db,
                "donation_imported",
                "donations",
                Some(&id),
                &format!("Imported donation id={}", id),
                &session.id,
                &session.role,
                &origin,
            )
            .await;
        }
    }

    (
        StatusCode::OK,
        AxumJson(serde_json::json!({ "imported": imported, "skipped": skipped })),
    )
        .into_response()
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        let escaped = s.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        s.to_string()
    }
}

pub async fn export_csv(
    State(state): State<AppState>,
    session: AuthSession,
) -> Response {
    let actor = match require_actor(&state, &session).await {
        Ok(a) => a,
        Err(r) => return r,
    };

    let categories = match db::list_categories(&state.db).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("Category list failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    let names: HashMap<&str, &str> = categories
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();

    match db::list_donations(&state.db, None).await {
        Ok(list) => {
            let mut w = String::new();
            w.push_str("id,donor_name,amount,date,category,status,notes\n");
            for d in list {
                if !category_accessible(&actor, &d.category_id) {
                    continue;
                }
                let date = d.donated_on.format("%Y-%m-%d").to_string();
                let category = names.get(d.category_id.as_str()).copied().unwrap_or("");
                let notes = d.notes.clone().unwrap_or_default();
                w.push_str(&format!(
                    "{},{},{},{},{},{},{}\n",
                    csv_escape(&d.id),
                    csv_escape(&d.donor_name),
                    d.amount,
                    csv_escape(&date),
                    csv_escape(category),
                    csv_escape(&d.status),
                    csv_escape(&notes),
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
                HeaderValue::from_static("attachment; filename=donations.csv"),
            );
            resp
        }
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
