use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::require_user,
    error::{AppError, AppResult},
    repository::table_service::{count_rows, list_rows, RowFilter},
    schemas::{
        clamp_limit_in_range, validate_input, ApartmentExportQuery, ApartmentPath,
        BatchBalancesInput,
    },
    services::ledger::{batch_compute_balances, compute_financial_summary, CurrencyAmounts},
    state::AppState,
    tenancy::{assert_apartment_access, assert_role, ADMIN_ROLES},
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/apartments/export",
            axum::routing::get(export_apartments),
        )
        .route(
            "/apartments/balances",
            axum::routing::post(batch_balances),
        )
        .route(
            "/apartments/{apartment_id}/financial-summary",
            axum::routing::get(get_financial_summary),
        )
}

async fn get_financial_summary(
    State(state): State<AppState>,
    Path(path): Path<ApartmentPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    if path.apartment_id <= 0 {
        return Err(AppError::BadRequest(
            "apartment_id must be a positive integer.".to_string(),
        ));
    }
    let pool = state.db_pool()?;
    assert_apartment_access(pool, &user, path.apartment_id).await?;

    let summary = compute_financial_summary(pool, path.apartment_id).await?;
    Ok(Json(json!({
        "success": true,
        "data": summary,
        "message": "Financial summary retrieved successfully.",
    })))
}

async fn batch_balances(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BatchBalancesInput>,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    assert_role(&user, ADMIN_ROLES)?;
    validate_input(&payload)?;
    let pool = state.db_pool()?;

    let balances = batch_compute_balances(pool, &payload.apartment_ids).await?;
    Ok(Json(json!({
        "success": true,
        "data": balances,
        "message": "Balances retrieved successfully.",
    })))
}

/// Apartment listing annotated with net balances, for spreadsheet/PDF export.
async fn export_apartments(
    State(state): State<AppState>,
    Query(query): Query<ApartmentExportQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    assert_role(&user, ADMIN_ROLES)?;
    validate_input(&query)?;
    let pool = state.db_pool()?;

    let row_cap = state.config.export_row_cap;
    let filters = export_filters(&query);
    let limit = clamp_limit_in_range(query.limit, 1, row_cap);

    let (rows, total) = tokio::try_join!(
        list_rows(
            pool,
            "apartments",
            &filters,
            limit,
            row_cap,
            query.offset,
            &query.order_by,
            query.ascending,
        ),
        count_rows(pool, "apartments", &filters),
    )?;

    let apartment_ids = rows
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_i64))
        .collect::<Vec<_>>();
    let balances = batch_compute_balances(pool, &apartment_ids).await?;

    let count = rows.len();
    let data = rows
        .into_iter()
        .map(|row| {
            let balance = row
                .get("id")
                .and_then(Value::as_i64)
                .and_then(|id| balances.get(&id).copied())
                .unwrap_or_default();
            with_balance(row, balance)
        })
        .collect::<Vec<_>>();
    let truncated = query.offset + (count as i64) < total;

    tracing::info!(
        user_id = user.id,
        count,
        total,
        truncated,
        "Exported apartment balances"
    );

    Ok(Json(json!({
        "success": true,
        "data": data,
        "count": count,
        "total": total,
        "truncated": truncated,
        "message": "Apartments exported successfully.",
    })))
}

fn export_filters(query: &ApartmentExportQuery) -> Vec<RowFilter> {
    let mut filters = Vec::new();
    if let Some(village_id) = query.village_id {
        filters.push(RowFilter::Equals("village_id", village_id));
    }
    if let Some(owner_id) = query.owner_id {
        filters.push(RowFilter::Equals("owner_id", owner_id));
    }
    if let Some(phase) = query.phase {
        filters.push(RowFilter::Equals("phase", phase));
    }
    if let Some(pattern) = query.search.as_deref().and_then(like_pattern) {
        filters.push(RowFilter::ILike("name", pattern));
    }
    filters
}

fn like_pattern(search: &str) -> Option<String> {
    let trimmed = search.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut escaped = String::with_capacity(trimmed.len() + 2);
    escaped.push('%');
    for character in trimmed.chars() {
        if matches!(character, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped.push('%');
    Some(escaped)
}

fn with_balance(row: Value, balance: CurrencyAmounts) -> Value {
    let mut object = match row {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    object.insert("balance".to_string(), json!(balance));
    Value::Object(object)
}
