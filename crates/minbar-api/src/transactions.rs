use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use minbar_db::models::TransactionRow;
use minbar_types::api::{NewTransactionRequest, UpdateTransactionRequest};
use minbar_types::models::{Fund, Session, Transaction};

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

/// GET /transactions — public recent-first listing.
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let limit = query.limit.min(1000);
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_transactions(limit))
        .await
        .map_err(ApiError::backend)?
        .map_err(ApiError::backend)?;

    Ok(Json(rows.into_iter().map(to_response).collect()))
}

/// POST /transactions — cashier only. The stored `created_by` is always the
/// session identity, never caller-supplied.
pub async fn add_transaction(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<NewTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    validate_amount(req.amount)?;
    let purpose = validate_purpose(&req.purpose)?;
    validate_date(&req.transaction_date)?;

    let id = Uuid::new_v4().to_string();
    let row = {
        let db = state.db.clone();
        let id = id.clone();
        let created_by = session.user_id.to_string();
        let amount = req.amount;
        let fund = req.fund;
        let date = req.transaction_date;
        tokio::task::spawn_blocking(move || -> anyhow::Result<TransactionRow> {
            db.insert_transaction(&id, amount, &purpose, fund.as_str(), &date, &created_by)?;
            db.get_transaction(&id)?
                .context("transaction row missing after insert")
        })
        .await
        .map_err(ApiError::backend)?
        .map_err(ApiError::backend)?
    };

    info!(
        "Transaction {} recorded by {}: {} to {}",
        id, session.name, row.amount, row.fund
    );

    Ok((StatusCode::CREATED, Json(to_response(row))))
}

/// PUT /transactions/{id} — cashier only, partial update.
pub async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let id = id.to_string();

    let existing = {
        let db = state.db.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || db.get_transaction(&id))
            .await
            .map_err(ApiError::backend)?
            .map_err(ApiError::backend)?
    }
    .ok_or(ApiError::NotFound)?;

    let amount = req.amount.unwrap_or(existing.amount);
    let purpose_raw = req.purpose.unwrap_or(existing.purpose);
    let fund = req
        .fund
        .map(|f| f.as_str().to_string())
        .unwrap_or(existing.fund);
    let date = req.transaction_date.unwrap_or(existing.transaction_date);

    validate_amount(amount)?;
    let purpose = validate_purpose(&purpose_raw)?;
    validate_date(&date)?;

    let row = {
        let db = state.db.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<TransactionRow>> {
            if !db.update_transaction(&id, amount, &purpose, &fund, &date)? {
                return Ok(None);
            }
            db.get_transaction(&id)
        })
        .await
        .map_err(ApiError::backend)?
        .map_err(ApiError::backend)?
    }
    .ok_or(ApiError::NotFound)?;

    Ok(Json(to_response(row)))
}

/// DELETE /transactions/{id} — cashier only.
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    let id = id.to_string();
    let deleted = tokio::task::spawn_blocking(move || db.delete_transaction(&id))
        .await
        .map_err(ApiError::backend)?
        .map_err(ApiError::backend)?;

    if !deleted {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

fn validate_amount(amount: i64) -> Result<(), ApiError> {
    if amount <= 0 {
        return Err(ApiError::Validation("amount must be positive".into()));
    }
    Ok(())
}

fn validate_purpose(purpose: &str) -> Result<String, ApiError> {
    let trimmed = purpose.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("purpose must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

fn validate_date(date: &str) -> Result<(), ApiError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ApiError::Validation("transaction_date must be YYYY-MM-DD".into()))
}

pub(crate) fn to_response(row: TransactionRow) -> Transaction {
    let id = row.id.parse().unwrap_or_else(|e| {
        warn!("Corrupt transaction id '{}': {}", row.id, e);
        Uuid::default()
    });
    let fund = Fund::parse(&row.fund).unwrap_or_else(|| {
        warn!("Corrupt fund '{}' on transaction '{}'", row.fund, row.id);
        Fund::Mosque
    });
    let created_at = crate::parse_db_timestamp(&row.created_at, "transaction", &row.id);

    Transaction {
        id,
        amount: row.amount,
        purpose: row.purpose,
        fund,
        transaction_date: row.transaction_date,
        created_at,
        created_by: row.created_by.as_deref().and_then(|s| s.parse().ok()),
        created_by_name: row.created_by_name,
    }
}
