#![allow(missing_docs)]

use axum_test::TestServer;
use rusqlite::Connection;

use crate::{
    AppState, build_router,
    category::{Category, CategoryId, CategoryName, NewCategory, create_category},
    db::{configure_connection, initialize},
    store::LedgerStore,
    transaction::{Amount, Transaction, TransactionDate, TransactionId, create_transaction},
};

#[track_caller]
pub(crate) fn must_create_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    configure_connection(&connection).expect("Could not configure database connection.");
    initialize(&connection).expect("Could not initialize database.");

    connection
}

#[track_caller]
pub(crate) fn must_create_test_server() -> TestServer {
    let store = LedgerStore::open_in_memory().expect("Could not open store in memory.");
    let app = build_router(AppState::new(store));

    TestServer::new(app)
}

#[track_caller]
pub(crate) fn must_create_category(id: &str, name: &str, connection: &Connection) -> Category {
    create_category(
        NewCategory::new(CategoryName::new(name).expect("Invalid category name"))
            .id(CategoryId::new(id).expect("Invalid category ID")),
        connection,
    )
    .expect("Could not create category")
}

#[track_caller]
pub(crate) fn must_create_transaction(
    id: &str,
    amount: f64,
    category_id: &CategoryId,
    date: &str,
    connection: &Connection,
) -> Transaction {
    create_transaction(
        Transaction::build(
            Amount::new(amount).expect("Invalid amount"),
            category_id.clone(),
            TransactionDate::new(date).expect("Invalid date"),
        )
        .id(TransactionId::new(id).expect("Invalid transaction ID")),
        connection,
    )
    .expect("Could not create transaction")
}
