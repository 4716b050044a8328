use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::core::aggregate::aggregate_donors;
use crate::core::ordering;
use crate::core::search::{filter_donors, DonorFilter, PaymentFilter};
use crate::db::{self, models};
use crate::AppState;

#[derive(Deserialize)]
pub struct DonorQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub payment: Option<String>,
}

/// Public donor board: aggregates approved donations, applies the search
/// filters and sorts for display. Grouped view orders by category display
/// position first; both views rank donors by total, highest first.
pub async fn list_donors(
    State(state): State<AppState>,
    Query(params): Query<DonorQuery>,
) -> Response {
    let payment = match PaymentFilter::parse(params.payment.as_deref().unwrap_or("")) {
        Some(p) => p,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                "Unknown payment filter, expected paid or pledged",
            )
                .into_response()
        }
    };

    let donations = match db::list_donations(&state.db, Some(models::STATUS_APPROVED)).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    let categories = match db::list_categories(&state.db).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("Category list failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    let settings = match db::get_settings(&state.db).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Settings fetch failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let known: HashSet<String> = categories.iter().map(|c| c.id.clone()).collect();
    let aggregates = aggregate_donors(&donations, &known);

    let filter = DonorFilter {
        term: params.q,
        category_id: params.category,
        payment,
    };
    let mut donors = filter_donors(aggregates, &filter);

    if settings.view_mode == "grouped" {
        let display_position: HashMap<String, usize> =
            ordering::sort_for_display(categories.clone())
                .into_iter()
                .enumerate()
                .map(|(i, c)| (c.id, i))
                .collect();
        donors.sort_by(|a, b| {
            let pa = display_position.get(&a.category_id).copied().unwrap_or(usize::MAX);
            let pb = display_position.get(&b.category_id).copied().unwrap_or(usize::MAX);
            pa.cmp(&pb).then_with(|| b.total.cmp(&a.total))
        });
    } else {
        donors.sort_by(|a, b| b.total.cmp(&a.total));
    }

    AxumJson(serde_json::json!({
        "donors": donors,
        "view_mode": settings.view_mode,
        "show_dates": settings.show_dates,
    }))
    .into_response()
}
