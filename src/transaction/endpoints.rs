//! JSON endpoints for managing transactions.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    Error, LedgerStore,
    transaction::{NewTransaction, Transaction, TransactionId, TransactionUpdate, YearMonth},
};

/// The query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    /// Only list transactions in this month. Takes precedence over `limit`.
    pub year_month: Option<YearMonth>,
    /// The maximum number of transactions to list across all months.
    pub limit: Option<u32>,
}

/// Create a transaction, responds with the stored transaction and 201 Created.
pub async fn create_transaction_endpoint(
    State(store): State<LedgerStore>,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let Json(new_transaction) = payload?;
    tracing::info!(
        "Creating transaction of {} in category {} on {}",
        new_transaction.amount.value(),
        new_transaction.category_id,
        new_transaction.date
    );

    let transaction = store.create_transaction(new_transaction)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// List transactions for a month, or the most recent transactions across all months.
pub async fn get_transactions_endpoint(
    State(store): State<LedgerStore>,
    query: Result<Query<TransactionQuery>, QueryRejection>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let Query(query) = query?;

    let transactions = match query.year_month {
        Some(year_month) => store.get_transactions_by_month(&year_month)?,
        None => store.get_all_transactions(query.limit)?,
    };
    tracing::debug!("Retrieved {} transactions", transactions.len());

    Ok(Json(transactions))
}

/// Get a single transaction.
pub async fn get_transaction_endpoint(
    State(store): State<LedgerStore>,
    path: Result<Path<TransactionId>, PathRejection>,
) -> Result<Json<Transaction>, Error> {
    let Path(transaction_id) = path?;
    store.get_transaction(&transaction_id).map(Json)
}

/// Apply a partial update to a transaction.
pub async fn update_transaction_endpoint(
    State(store): State<LedgerStore>,
    path: Result<Path<TransactionId>, PathRejection>,
    payload: Result<Json<TransactionUpdate>, JsonRejection>,
) -> Result<Json<Transaction>, Error> {
    let Path(transaction_id) = path?;
    let Json(update) = payload?;
    tracing::info!("Updating transaction: {transaction_id}");

    store.update_transaction(&transaction_id, update).map(Json)
}

/// Delete a transaction.
pub async fn delete_transaction_endpoint(
    State(store): State<LedgerStore>,
    path: Result<Path<TransactionId>, PathRejection>,
) -> Result<Json<Value>, Error> {
    let Path(transaction_id) = path?;
    tracing::info!("Deleting transaction: {transaction_id}");
    store.delete_transaction(&transaction_id)?;

    Ok(Json(json!({ "message": "Transaction deleted successfully" })))
}

/// List the months that have transactions, most recent first.
pub async fn get_available_months_endpoint(
    State(store): State<LedgerStore>,
) -> Result<Json<Vec<YearMonth>>, Error> {
    store.get_available_months().map(Json)
}
