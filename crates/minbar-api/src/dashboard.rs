use axum::{Json, extract::State};

use minbar_types::models::{DashboardStats, Fund};

use crate::auth::AppState;
use crate::error::ApiError;

/// GET /dashboard — public fund balances. Balances are sums of transaction
/// amounts; income mirrors the balance and expense is always zero because
/// no subtraction path exists.
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, ApiError> {
    let db = state.db.clone();
    let (mosque, imam, total_transactions) =
        tokio::task::spawn_blocking(move || -> anyhow::Result<(i64, i64, i64)> {
            Ok((
                db.fund_balance(Fund::Mosque.as_str())?,
                db.fund_balance(Fund::Imam.as_str())?,
                db.count_transactions()?,
            ))
        })
        .await
        .map_err(ApiError::backend)?
        .map_err(ApiError::backend)?;

    Ok(Json(DashboardStats {
        mosque_balance: mosque,
        imam_balance: imam,
        total_balance: mosque + imam,
        mosque_income: mosque,
        mosque_expense: 0,
        imam_income: imam,
        imam_expense: 0,
        total_transactions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ctx, seed_user};
    use minbar_types::models::Role;
    use uuid::Uuid;

    #[tokio::test]
    async fn totals_are_the_sum_of_both_funds() {
        let ctx = ctx().await;
        let cashier = seed_user(&ctx, "Cashier", Role::Cashier, "1234");

        for (amount, fund) in [(100, "mosque"), (50, "mosque"), (30, "imam")] {
            ctx.state
                .db
                .insert_transaction(
                    &Uuid::new_v4().to_string(),
                    amount,
                    "Donation",
                    fund,
                    "2024-01-01",
                    &cashier.to_string(),
                )
                .unwrap();
        }

        let Json(stats) = dashboard_stats(State(ctx.state.clone())).await.unwrap();
        assert_eq!(stats.mosque_balance, 150);
        assert_eq!(stats.imam_balance, 30);
        assert_eq!(stats.total_balance, stats.mosque_balance + stats.imam_balance);
        assert_eq!(stats.mosque_income, stats.mosque_balance);
        assert_eq!(stats.mosque_expense, 0);
        assert_eq!(stats.imam_expense, 0);
        assert_eq!(stats.total_transactions, 3);
    }

    #[tokio::test]
    async fn empty_store_reports_zeroes() {
        let ctx = ctx().await;
        let Json(stats) = dashboard_stats(State(ctx.state.clone())).await.unwrap();
        assert_eq!(stats.total_balance, 0);
        assert_eq!(stats.total_transactions, 0);
    }
}
