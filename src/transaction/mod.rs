//! Transactions, the individual expenses recorded in the ledger.
//!
//! This module contains:
//! - The [Transaction] model and the validated types it is made of
//! - Database functions for storing, querying and managing transactions
//! - The JSON endpoints for transactions

mod db;
mod domain;
mod endpoints;

pub use db::{
    create_transaction, create_transaction_table, delete_transaction, get_all_transactions,
    get_available_months, get_transaction, get_transactions_by_month, update_transaction,
};
pub(crate) use db::upsert_transaction;
pub use domain::{
    Amount, NewTransaction, Transaction, TransactionDate, TransactionId, TransactionUpdate,
    YearMonth,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint,
    get_available_months_endpoint, get_transaction_endpoint, get_transactions_endpoint,
    update_transaction_endpoint,
};
