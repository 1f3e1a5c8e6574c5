//! Exporting the whole ledger to a [Snapshot] and restoring it again.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, LedgerStore,
    category::{Category, get_all_categories, release_category_names, upsert_category},
    db::now,
    transaction::{Transaction, get_all_transactions, upsert_transaction},
};

/// Every category and transaction in the ledger at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken. Optional when importing.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub exported_at: Option<OffsetDateTime>,
    /// The categories, oldest first.
    #[serde(default)]
    pub categories: Vec<Category>,
    /// The transactions, most recent first.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// How many records an import wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// The number of categories inserted or overwritten.
    pub categories_imported: u64,
    /// The number of transactions inserted or overwritten.
    pub transactions_imported: u64,
}

/// Read every category and transaction.
///
/// `connection` should be inside an SQL transaction so that the categories
/// and transactions come from the same snapshot of the database.
///
/// # Errors
/// Returns an [Error::SqlError] if any of the queries fail.
pub fn export_data(connection: &Connection) -> Result<Snapshot, Error> {
    let categories = get_all_categories(connection)?;
    let transactions = get_all_transactions(None, connection)?;

    Ok(Snapshot {
        exported_at: Some(now()),
        categories,
        transactions,
    })
}

/// Write every record in `snapshot`, overwriting stored records with the same ID.
///
/// Categories are written before transactions so that transactions may refer
/// to categories from the same snapshot. Renamed categories pass their new
/// name on to stored transactions, while the snapshot's transactions keep the
/// names they were exported with. `connection` should be inside an SQL
/// transaction so that a failure part way through can be rolled back.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategoryName] if a category name is used by a stored category
///   that is not in the snapshot, or twice within the snapshot,
/// - or [Error::CategoryNotFound] if a transaction refers to a category that
///   is in neither the database nor the snapshot,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn import_data(snapshot: &Snapshot, connection: &Connection) -> Result<ImportSummary, Error> {
    release_category_names(&snapshot.categories, connection)?;
    for category in &snapshot.categories {
        upsert_category(category, connection)?;
    }

    for transaction in &snapshot.transactions {
        upsert_transaction(transaction, connection)?;
    }

    Ok(ImportSummary {
        categories_imported: snapshot.categories.len() as u64,
        transactions_imported: snapshot.transactions.len() as u64,
    })
}

/// Download every category and transaction as JSON.
pub async fn export_data_endpoint(State(store): State<LedgerStore>) -> Result<Json<Snapshot>, Error> {
    let snapshot = store.export_data()?;
    tracing::info!(
        "Exporting {} categories and {} transactions",
        snapshot.categories.len(),
        snapshot.transactions.len()
    );

    Ok(Json(snapshot))
}

/// Restore categories and transactions from a previously exported snapshot.
pub async fn import_data_endpoint(
    State(store): State<LedgerStore>,
    payload: Result<Json<Snapshot>, JsonRejection>,
) -> Result<Json<ImportSummary>, Error> {
    let Json(snapshot) = payload?;

    store.import_data(&snapshot).map(Json)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use time::macros::datetime;

    use crate::{
        Error, LedgerStore,
        category::{Category, CategoryId, CategoryName, NewCategory},
        endpoints,
        snapshot::{ImportSummary, Snapshot},
        test_utils::must_create_test_server,
        transaction::{Amount, Transaction, TransactionDate, TransactionId, YearMonth},
    };

    fn must_create_populated_store() -> LedgerStore {
        let store = LedgerStore::open_in_memory().expect("Could not open store");
        let food = store
            .create_category(
                NewCategory::new(CategoryName::new("Food & Dining").unwrap())
                    .id(CategoryId::new("food-001").unwrap())
                    .icon("utensils"),
            )
            .unwrap();
        let transport = store
            .create_category(NewCategory::new(CategoryName::new("Transport").unwrap()))
            .unwrap();

        for (id, amount, category_id, date) in [
            ("txn-001", 25.5, &food.id, "2024-01-15"),
            ("txn-002", 10.0, &food.id, "2024-01-15T18:30:00"),
            ("txn-003", 3.2, &transport.id, "2023-12-31"),
        ] {
            store
                .create_transaction(
                    Transaction::build(
                        Amount::new(amount).unwrap(),
                        category_id.clone(),
                        TransactionDate::new(date).unwrap(),
                    )
                    .id(TransactionId::new(id).unwrap()),
                )
                .unwrap();
        }

        store
    }

    #[test]
    fn export_then_import_into_empty_store_round_trips() {
        let source = must_create_populated_store();
        let exported = source.export_data().expect("Could not export");
        let destination = LedgerStore::open_in_memory().unwrap();

        let summary = destination.import_data(&exported).expect("Could not import");
        let reexported = destination.export_data().unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                categories_imported: 2,
                transactions_imported: 3
            }
        );
        assert_eq!(reexported.categories, exported.categories);
        assert_eq!(reexported.transactions, exported.transactions);
    }

    #[test]
    fn export_round_trips_through_json() {
        let source = must_create_populated_store();
        let exported = source.export_data().unwrap();
        let json = serde_json::to_string(&exported).unwrap();
        let destination = LedgerStore::open_in_memory().unwrap();

        destination
            .import_data(&serde_json::from_str(&json).unwrap())
            .expect("Could not import");

        let reexported = destination.export_data().unwrap();
        assert_eq!(reexported.categories, exported.categories);
        assert_eq!(reexported.transactions, exported.transactions);
    }

    #[test]
    fn reimporting_an_unchanged_export_is_idempotent() {
        let store = must_create_populated_store();
        let exported = store.export_data().unwrap();

        store.import_data(&exported).expect("Could not re-import");

        let after = store.export_data().unwrap();
        assert_eq!(after.categories, exported.categories);
        assert_eq!(after.transactions, exported.transactions);
    }

    #[test]
    fn import_with_missing_category_applies_nothing() {
        let source = must_create_populated_store();
        let mut snapshot = source.export_data().unwrap();
        // Keep the transactions but drop the category that one of them uses.
        snapshot
            .categories
            .retain(|category| category.id.as_ref() != "food-001");
        let destination = LedgerStore::open_in_memory().unwrap();

        let result = destination.import_data(&snapshot);

        assert_eq!(
            result,
            Err(Error::CategoryNotFound(CategoryId::new_unchecked("food-001")))
        );
        let after = destination.export_data().unwrap();
        assert!(after.categories.is_empty());
        assert!(after.transactions.is_empty());
    }

    #[test]
    fn import_with_conflicting_category_name_applies_nothing() {
        let store = must_create_populated_store();
        let before = store.export_data().unwrap();
        let snapshot = Snapshot {
            exported_at: None,
            categories: vec![
                Category {
                    id: CategoryId::new_unchecked("bills"),
                    name: CategoryName::new_unchecked("Bills"),
                    color: None,
                    icon: None,
                    created_at: datetime!(2024-01-01 00:00 UTC),
                },
                Category {
                    id: CategoryId::new_unchecked("food-copy"),
                    name: CategoryName::new_unchecked("Food & Dining"),
                    color: None,
                    icon: None,
                    created_at: datetime!(2024-01-01 00:00 UTC),
                },
            ],
            transactions: vec![],
        };

        let result = store.import_data(&snapshot);

        assert_eq!(
            result,
            Err(Error::DuplicateCategoryName(CategoryName::new_unchecked(
                "Food & Dining"
            )))
        );
        assert_eq!(store.export_data().unwrap().categories, before.categories);
    }

    #[test]
    fn import_normalises_timestamps_to_utc() {
        let store = LedgerStore::open_in_memory().unwrap();
        let snapshot: Snapshot = serde_json::from_value(json!({
            "categories": [{
                "id": "food",
                "name": "Food",
                "color": null,
                "icon": null,
                "created_at": "2024-01-01T13:00:00+13:00"
            }],
            "transactions": []
        }))
        .unwrap();

        store.import_data(&snapshot).unwrap();

        let category = store.get_category(&CategoryId::new_unchecked("food")).unwrap();
        assert_eq!(category.created_at, datetime!(2024-01-01 00:00 UTC));
        assert!(category.created_at.offset().is_utc());
    }

    #[test]
    fn import_recomputes_year_month() {
        let store = LedgerStore::open_in_memory().unwrap();
        let snapshot: Snapshot = serde_json::from_value(json!({
            "categories": [{
                "id": "food",
                "name": "Food",
                "created_at": "2024-01-01T00:00:00Z"
            }],
            "transactions": [{
                "id": "txn-1",
                "amount": 12.0,
                "category_id": "food",
                "category_name": "Food",
                "date": "2024-03-05",
                "year_month": "1999-01",
                "created_at": "2024-03-05T00:00:00Z",
                "updated_at": "2024-03-05T00:00:00Z"
            }]
        }))
        .unwrap();

        store.import_data(&snapshot).unwrap();

        let transaction = store
            .get_transaction(&TransactionId::new_unchecked("txn-1"))
            .unwrap();
        assert_eq!(transaction.year_month.as_ref(), "2024-03");
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: CategoryId::new_unchecked(id),
            name: CategoryName::new_unchecked(name),
            color: None,
            icon: None,
            created_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    #[test]
    fn import_renaming_category_refreshes_stored_transactions() {
        let store = LedgerStore::open_in_memory().unwrap();
        store
            .import_data(&Snapshot {
                exported_at: None,
                categories: vec![category("food", "Food")],
                transactions: vec![],
            })
            .unwrap();
        store
            .create_transaction(
                Transaction::build(
                    Amount::new(12.5).unwrap(),
                    CategoryId::new_unchecked("food"),
                    TransactionDate::new("2024-01-15").unwrap(),
                )
                .id(TransactionId::new_unchecked("txn-1")),
            )
            .unwrap();

        store
            .import_data(&Snapshot {
                exported_at: None,
                categories: vec![category("food", "Groceries")],
                transactions: vec![],
            })
            .expect("Could not import");

        let transaction = store
            .get_transaction(&TransactionId::new_unchecked("txn-1"))
            .unwrap();
        assert_eq!(transaction.category_name.as_ref(), "Groceries");
        let summary = store
            .get_monthly_summary(&YearMonth::new("2024-01").unwrap())
            .unwrap();
        assert_eq!(
            summary.category_breakdown.keys().collect::<Vec<_>>(),
            ["Groceries"]
        );
    }

    #[test]
    fn imported_transactions_keep_their_exported_category_name() {
        let store = must_create_populated_store();
        let mut snapshot = store.export_data().unwrap();
        for category in &mut snapshot.categories {
            if category.id.as_ref() == "food-001" {
                category.name = CategoryName::new_unchecked("Groceries");
            }
        }

        store.import_data(&snapshot).expect("Could not import");

        // The snapshot's transactions were exported under the old name and
        // are written after their category.
        let transaction = store
            .get_transaction(&TransactionId::new_unchecked("txn-001"))
            .unwrap();
        assert_eq!(transaction.category_name.as_ref(), "Food & Dining");
    }

    #[test]
    fn import_can_swap_category_names() {
        let store = LedgerStore::open_in_memory().unwrap();
        store
            .import_data(&Snapshot {
                exported_at: None,
                categories: vec![category("a", "Food"), category("b", "Transport")],
                transactions: vec![],
            })
            .unwrap();

        let summary = store
            .import_data(&Snapshot {
                exported_at: None,
                categories: vec![category("a", "Transport"), category("b", "Food")],
                transactions: vec![],
            })
            .expect("Could not swap names");

        assert_eq!(summary.categories_imported, 2);
        let names = store
            .get_all_categories()
            .unwrap()
            .into_iter()
            .map(|category| (category.id.to_string(), category.name.to_string()))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                ("a".to_owned(), "Transport".to_owned()),
                ("b".to_owned(), "Food".to_owned())
            ]
        );
    }

    #[test]
    fn import_reusing_a_name_within_the_snapshot_applies_nothing() {
        let store = LedgerStore::open_in_memory().unwrap();
        let before = Snapshot {
            exported_at: None,
            categories: vec![category("a", "Food"), category("b", "Transport")],
            transactions: vec![],
        };
        store.import_data(&before).unwrap();

        let result = store.import_data(&Snapshot {
            exported_at: None,
            categories: vec![category("a", "Food"), category("b", "Food")],
            transactions: vec![],
        });

        assert_eq!(
            result,
            Err(Error::DuplicateCategoryName(CategoryName::new_unchecked(
                "Food"
            )))
        );
        assert_eq!(store.get_all_categories().unwrap(), before.categories);
    }

    #[tokio::test]
    async fn export_and_import_endpoints() {
        let server = must_create_test_server();
        server
            .post(endpoints::CATEGORIES)
            .json(&json!({ "id": "food", "name": "Food" }))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({ "amount": 4.5, "category_id": "food", "date": "2024-01-15" }))
            .await
            .assert_status(StatusCode::CREATED);

        let exported = server.get(endpoints::EXPORT_DATA).await.json::<Value>();
        assert!(exported["exported_at"].is_string());
        assert_eq!(exported["categories"].as_array().map(Vec::len), Some(1));

        let other_server = must_create_test_server();
        let response = other_server.post(endpoints::IMPORT_DATA).json(&exported).await;

        response.assert_status_ok();
        assert_eq!(
            response.json::<ImportSummary>(),
            ImportSummary {
                categories_imported: 1,
                transactions_imported: 1
            }
        );
    }

    #[tokio::test]
    async fn import_endpoint_rejects_bad_records() {
        let server = must_create_test_server();

        let response = server
            .post(endpoints::IMPORT_DATA)
            .json(&json!({
                "categories": [{
                    "id": "food",
                    "name": "Food",
                    "color": "orange",
                    "created_at": "2024-01-01T00:00:00Z"
                }]
            }))
            .await;

        response.assert_status_bad_request();
    }
}
