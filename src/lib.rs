//! Expense Ledger is the storage backend of a personal expense tracker.
//!
//! The core of the library is the [LedgerStore], an embedded SQLite store of
//! spending categories and transactions. Transactions are bucketed by the
//! calendar month of their date, which is the main access path for listing
//! and summarising spending. The whole database can be exported to, and
//! restored from, a JSON [Snapshot].
//!
//! The library also provides a JSON REST API that maps one-to-one onto the
//! store operations, see [build_router].

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use tokio::signal;

mod app_state;
mod category;
mod db;
mod endpoints;
mod logging;
mod routing;
mod snapshot;
mod store;
mod summary;
#[cfg(test)]
mod test_utils;
mod transaction;

pub use app_state::AppState;
pub use category::{Category, CategoryId, CategoryName, CategoryUpdate, HexColor, NewCategory};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use snapshot::{ImportSummary, Snapshot};
pub use store::{LedgerStore, StoreConfig};
pub use summary::{CategoryTotal, LargestTransaction, MonthlySummary};
pub use transaction::{
    Amount, NewTransaction, Transaction, TransactionDate, TransactionId, TransactionUpdate,
    YearMonth,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Could not listen for the ctrl+c signal: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate_signal) => {
                terminate_signal.recv().await;
            }
            Err(error) => {
                tracing::error!("Could not listen for the terminate signal: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal_name = tokio::select! {
        _ = ctrl_c => "ctrl+c",
        _ = terminate => "terminate",
    };

    tracing::info!("Received {signal_name} signal, shutting down.");
    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

/// The broad class of an [Error], used to decide how it is reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input was malformed or incomplete.
    Validation,
    /// A referenced category or transaction does not exist.
    NotFound,
    /// The operation would break a uniqueness or referential integrity rule.
    Conflict,
    /// Something went wrong inside the store, e.g. an SQL error.
    Internal,
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A field did not pass validation.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A year-month string was not of the form `YYYY-MM`.
    #[error("\"{0}\" is not a valid year-month, expected the format YYYY-MM")]
    InvalidYearMonth(String),

    /// An update did not set any fields.
    #[error("no fields to update")]
    EmptyUpdate,

    /// The request body or query string could not be parsed.
    #[error("could not parse the request: {0}")]
    InvalidRequest(String),

    /// The category ID does not refer to a stored category.
    #[error("the category \"{0}\" could not be found")]
    CategoryNotFound(CategoryId),

    /// The transaction ID does not refer to a stored transaction.
    #[error("the transaction \"{0}\" could not be found")]
    TransactionNotFound(TransactionId),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The category name is already used by another category.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategoryName(CategoryName),

    /// The category ID is already used by another category.
    #[error("a category with the ID \"{0}\" already exists")]
    DuplicateCategoryId(CategoryId),

    /// The transaction ID is already used by another transaction.
    #[error("a transaction with the ID \"{0}\" already exists")]
    DuplicateTransactionId(TransactionId),

    /// Tried to delete a category that transactions still refer to.
    ///
    /// The caller should delete those transactions or move them to another
    /// category first.
    #[error(
        "the category \"{category_id}\" cannot be deleted because {transaction_count} transaction(s) still use it"
    )]
    CategoryInUse {
        /// The category that was to be deleted.
        category_id: CategoryId,
        /// How many transactions refer to the category.
        transaction_count: u64,
    },

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl Error {
    /// The class of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidField { .. }
            | Error::InvalidYearMonth(_)
            | Error::EmptyUpdate
            | Error::InvalidRequest(_) => ErrorKind::Validation,
            Error::CategoryNotFound(_) | Error::TransactionNotFound(_) | Error::NotFound => {
                ErrorKind::NotFound
            }
            Error::DuplicateCategoryName(_)
            | Error::DuplicateCategoryId(_)
            | Error::DuplicateTransactionId(_)
            | Error::CategoryInUse { .. } => ErrorKind::Conflict,
            Error::SqlError(_) | Error::DatabaseLockError => ErrorKind::Internal,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

/// The JSON body sent to clients when a request fails.
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = match self.kind() {
            // Internal errors are not intended to be shown to the client.
            ErrorKind::Internal => {
                tracing::error!("An unexpected error occurred: {}", self);
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}
