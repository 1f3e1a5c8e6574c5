//! Database operations for transactions.

use rusqlite::{Connection, OptionalExtension, Row, params};
use time::UtcOffset;

use crate::{
    Error,
    category::{CategoryId, CategoryName, get_category},
    db::{begin_write, is_foreign_key_violation, is_unique_violation, now},
    transaction::{
        Amount, NewTransaction, Transaction, TransactionDate, TransactionId, TransactionUpdate,
        YearMonth,
    },
};

const SELECT_TRANSACTION: &str = "SELECT id, amount, category_id, category_name, notes, date, \
    year_month, created_at, updated_at FROM \"transaction\"";

// Most recent first, then by ID to keep the order stable for equal dates.
const NEWEST_FIRST: &str = "ORDER BY date DESC, created_at DESC, id DESC";

/// Create a new transaction in the database.
///
/// The category name is copied from the live category and the year-month is
/// taken from the date.
///
/// # Errors
/// This function will return a:
/// - [Error::CategoryNotFound] if the category ID does not refer to a stored category,
/// - or [Error::DuplicateTransactionId] if a transaction with the ID already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = begin_write(connection)?;
    let category = get_category(&new_transaction.category_id, &sql_transaction)?;
    let created_at = now();

    let transaction = Transaction {
        id: new_transaction.id.unwrap_or_else(TransactionId::generate),
        amount: new_transaction.amount,
        category_id: category.id,
        category_name: category.name,
        notes: new_transaction.notes,
        year_month: new_transaction.date.year_month(),
        date: new_transaction.date,
        created_at,
        updated_at: created_at,
    };

    sql_transaction
        .execute(
            "INSERT INTO \"transaction\" \
                (id, amount, category_id, category_name, notes, date, year_month, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                transaction.id.as_ref(),
                transaction.amount.value(),
                transaction.category_id.as_ref(),
                transaction.category_name.as_ref(),
                transaction.notes,
                transaction.date.as_ref(),
                transaction.year_month.as_ref(),
                transaction.created_at,
                transaction.updated_at,
            ],
        )
        .map_err(|error| map_write_error(error, &transaction))?;

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Insert `transaction` or, if its ID is taken, overwrite the stored transaction with it.
///
/// Used when restoring a snapshot, so the category name and timestamps are
/// kept as given rather than refreshed.
pub(crate) fn upsert_transaction(
    transaction: &Transaction,
    connection: &Connection,
) -> Result<(), Error> {
    connection
        .execute(
            "INSERT INTO \"transaction\" \
                (id, amount, category_id, category_name, notes, date, year_month, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                amount = excluded.amount,
                category_id = excluded.category_id,
                category_name = excluded.category_name,
                notes = excluded.notes,
                date = excluded.date,
                year_month = excluded.year_month,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            params![
                transaction.id.as_ref(),
                transaction.amount.value(),
                transaction.category_id.as_ref(),
                transaction.category_name.as_ref(),
                transaction.notes,
                transaction.date.as_ref(),
                transaction.date.year_month().as_ref(),
                transaction.created_at.to_offset(UtcOffset::UTC),
                transaction.updated_at.to_offset(UtcOffset::UTC),
            ],
        )
        .map_err(|error| map_write_error(error, transaction))?;

    Ok(())
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: &TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(&format!("{SELECT_TRANSACTION} WHERE id = :id"))?
        .query_row(&[(":id", id.as_ref())], map_transaction_row)
        .optional()?
        .ok_or_else(|| Error::TransactionNotFound(id.clone()))
}

/// Get the transactions in the month `year_month`, most recent first.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_transactions_by_month(
    year_month: &YearMonth,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_TRANSACTION} WHERE year_month = :year_month {NEWEST_FIRST}"
        ))?
        .query_map(&[(":year_month", year_month.as_ref())], map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}

/// Get up to `limit` transactions across all months, most recent first.
///
/// All transactions are returned if `limit` is `None`.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_all_transactions(
    limit: Option<u32>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    // A negative limit means no limit in SQLite.
    let limit = limit.map_or(-1, i64::from);

    connection
        .prepare(&format!("{SELECT_TRANSACTION} {NEWEST_FIRST} LIMIT :limit"))?
        .query_map(&[(":limit", &limit)], map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}

/// Apply the fields set in `update` to the transaction `id` and return the result.
///
/// Changing the date recomputes the year-month, changing the category
/// refreshes the category name, and `updated_at` is always refreshed.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyUpdate] if `update` does not set any fields,
/// - or [Error::TransactionNotFound] if `id` does not refer to a transaction,
/// - or [Error::CategoryNotFound] if the new category does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: &TransactionId,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if update.is_empty() {
        return Err(Error::EmptyUpdate);
    }

    let sql_transaction = begin_write(connection)?;
    let mut transaction = get_transaction(id, &sql_transaction)?;

    if let Some(amount) = update.amount {
        transaction.amount = amount;
    }
    if let Some(category_id) = update.category_id {
        let category = get_category(&category_id, &sql_transaction)?;
        transaction.category_id = category.id;
        transaction.category_name = category.name;
    }
    if let Some(notes) = update.notes {
        transaction.notes = notes;
    }
    if let Some(date) = update.date {
        transaction.year_month = date.year_month();
        transaction.date = date;
    }
    transaction.updated_at = now();

    sql_transaction
        .execute(
            "UPDATE \"transaction\" SET \
                amount = ?1, \
                category_id = ?2, \
                category_name = ?3, \
                notes = ?4, \
                date = ?5, \
                year_month = ?6, \
                updated_at = ?7 \
            WHERE id = ?8",
            params![
                transaction.amount.value(),
                transaction.category_id.as_ref(),
                transaction.category_name.as_ref(),
                transaction.notes,
                transaction.date.as_ref(),
                transaction.year_month.as_ref(),
                transaction.updated_at,
                transaction.id.as_ref(),
            ],
        )
        .map_err(|error| map_write_error(error, &transaction))?;

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Delete a transaction by ID.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(id: &TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = :id",
        &[(":id", id.as_ref())],
    )?;

    if rows_affected == 0 {
        return Err(Error::TransactionNotFound(id.clone()));
    }

    Ok(())
}

/// Get the distinct months that have at least one transaction, most recent first.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_available_months(connection: &Connection) -> Result<Vec<YearMonth>, Error> {
    connection
        .prepare("SELECT DISTINCT year_month FROM \"transaction\" ORDER BY year_month DESC")?
        .query_map([], |row| {
            let raw_year_month: String = row.get(0)?;
            Ok(YearMonth::new_unchecked(&raw_year_month))
        })?
        .map(|year_month_result| year_month_result.map_err(Error::from))
        .collect()
}

/// Create the transaction table and its indexes.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id TEXT PRIMARY KEY,
            amount REAL NOT NULL CHECK (amount > 0),
            category_id TEXT NOT NULL,
            category_name TEXT NOT NULL,
            notes TEXT,
            date TEXT NOT NULL,
            year_month TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_year_month ON \"transaction\"(year_month, date);
        CREATE INDEX IF NOT EXISTS idx_transaction_date ON \"transaction\"(date);
        CREATE INDEX IF NOT EXISTS idx_transaction_category ON \"transaction\"(category_id);",
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let raw_id: String = row.get(0)?;
    let raw_category_id: String = row.get(2)?;
    let raw_category_name: String = row.get(3)?;
    let raw_date: String = row.get(5)?;
    let raw_year_month: String = row.get(6)?;

    Ok(Transaction {
        id: TransactionId::new_unchecked(&raw_id),
        amount: map_amount(row.get(1)?)?,
        category_id: CategoryId::new_unchecked(&raw_category_id),
        category_name: CategoryName::new_unchecked(&raw_category_name),
        notes: row.get(4)?,
        date: TransactionDate::new_unchecked(&raw_date),
        year_month: YearMonth::new_unchecked(&raw_year_month),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_amount(raw_amount: f64) -> Result<Amount, rusqlite::Error> {
    Amount::new(raw_amount).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Real, Box::new(error))
    })
}

fn map_write_error(error: rusqlite::Error, transaction: &Transaction) -> Error {
    if is_unique_violation(&error, "transaction.id") {
        Error::DuplicateTransactionId(transaction.id.clone())
    } else if is_foreign_key_violation(&error) {
        Error::CategoryNotFound(transaction.category_id.clone())
    } else {
        error.into()
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use crate::{
        Error,
        category::CategoryId,
        test_utils::{must_create_category, must_create_test_connection, must_create_transaction},
        transaction::{
            Amount, Transaction, TransactionDate, TransactionId, TransactionUpdate, YearMonth,
            create_transaction, delete_transaction, get_all_transactions, get_available_months,
            get_transaction, get_transactions_by_month, update_transaction,
        },
    };

    #[test]
    fn create_transaction_succeeds() {
        let connection = must_create_test_connection();
        let category = must_create_category("food-001", "Food & Dining", &connection);

        let transaction = create_transaction(
            Transaction::build(
                Amount::new(25.5).unwrap(),
                category.id.clone(),
                TransactionDate::new("2024-01-15").unwrap(),
            )
            .id(TransactionId::new_unchecked("txn-001"))
            .notes("Lunch"),
            &connection,
        )
        .expect("Could not create transaction");

        assert_eq!(transaction.id.as_ref(), "txn-001");
        assert_eq!(transaction.amount.value(), 25.5);
        assert_eq!(transaction.category_name, category.name);
        assert_eq!(transaction.year_month.as_ref(), "2024-01");
        assert_eq!(transaction.notes.as_deref(), Some("Lunch"));
        assert_eq!(transaction.created_at, transaction.updated_at);
        assert_eq!(get_transaction(&transaction.id, &connection), Ok(transaction));
    }

    #[test]
    fn create_transaction_fails_on_missing_category() {
        let connection = must_create_test_connection();
        let category_id = CategoryId::new_unchecked("missing");

        let result = create_transaction(
            Transaction::build(
                Amount::new(1.0).unwrap(),
                category_id.clone(),
                TransactionDate::new("2024-01-15").unwrap(),
            ),
            &connection,
        );

        assert_eq!(result, Err(Error::CategoryNotFound(category_id)));
        assert_eq!(get_all_transactions(None, &connection), Ok(vec![]));
    }

    #[test]
    fn create_transaction_fails_on_duplicate_id() {
        let connection = must_create_test_connection();
        let category = must_create_category("food", "Food", &connection);
        must_create_transaction("txn-1", 1.0, &category.id, "2024-01-15", &connection);

        let result = create_transaction(
            Transaction::build(
                Amount::new(2.0).unwrap(),
                category.id,
                TransactionDate::new("2024-01-16").unwrap(),
            )
            .id(TransactionId::new_unchecked("txn-1")),
            &connection,
        );

        assert_eq!(
            result,
            Err(Error::DuplicateTransactionId(TransactionId::new_unchecked("txn-1")))
        );
    }

    #[test]
    fn get_transaction_with_invalid_id_returns_not_found() {
        let connection = must_create_test_connection();
        let id = TransactionId::new_unchecked("missing");

        assert_eq!(
            get_transaction(&id, &connection),
            Err(Error::TransactionNotFound(id))
        );
    }

    #[test]
    fn get_transactions_by_month_filters_and_orders_newest_first() {
        let connection = must_create_test_connection();
        let category = must_create_category("food", "Food", &connection);
        must_create_transaction("dec", 1.0, &category.id, "2023-12-31", &connection);
        must_create_transaction("jan-10", 2.0, &category.id, "2024-01-10", &connection);
        must_create_transaction("jan-20", 3.0, &category.id, "2024-01-20T08:00:00Z", &connection);
        must_create_transaction("jan-01", 4.0, &category.id, "2024-01-01", &connection);
        must_create_transaction("feb", 5.0, &category.id, "2024-02-01", &connection);

        let got = get_transactions_by_month(&YearMonth::new_unchecked("2024-01"), &connection)
            .expect("Could not query transactions");

        let got_ids: Vec<&str> = got.iter().map(|transaction| transaction.id.as_ref()).collect();
        assert_eq!(got_ids, ["jan-20", "jan-10", "jan-01"]);
        assert!(
            got.iter()
                .all(|transaction| transaction.year_month.as_ref() == "2024-01")
        );
    }

    #[test]
    fn get_transactions_by_month_with_no_data_is_empty() {
        let connection = must_create_test_connection();

        let got = get_transactions_by_month(&YearMonth::new_unchecked("2024-01"), &connection);

        assert_eq!(got, Ok(vec![]));
    }

    #[test]
    fn get_all_transactions_respects_limit() {
        let connection = must_create_test_connection();
        let category = must_create_category("food", "Food", &connection);
        for day in 1..=5 {
            must_create_transaction(
                &format!("txn-{day}"),
                day as f64,
                &category.id,
                &format!("2024-01-0{day}"),
                &connection,
            );
        }

        let limited = get_all_transactions(Some(2), &connection).unwrap();
        let unlimited = get_all_transactions(None, &connection).unwrap();

        let limited_ids: Vec<&str> = limited.iter().map(|t| t.id.as_ref()).collect();
        assert_eq!(limited_ids, ["txn-5", "txn-4"]);
        assert_eq!(unlimited.len(), 5);
    }

    #[test]
    fn updating_notes_leaves_other_fields_and_refreshes_updated_at() {
        let connection = must_create_test_connection();
        let category = must_create_category("food", "Food", &connection);
        let original = must_create_transaction("txn-1", 25.5, &category.id, "2024-01-15", &connection);
        thread::sleep(Duration::from_millis(5));

        let updated = update_transaction(
            &original.id,
            TransactionUpdate {
                notes: Some(Some("Team lunch".to_owned())),
                ..Default::default()
            },
            &connection,
        )
        .expect("Could not update transaction");

        assert_eq!(updated.notes.as_deref(), Some("Team lunch"));
        assert_eq!(updated.amount, original.amount);
        assert_eq!(updated.category_id, original.category_id);
        assert_eq!(updated.date, original.date);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at > original.updated_at);
        assert_eq!(get_transaction(&original.id, &connection), Ok(updated));
    }

    #[test]
    fn updating_date_recomputes_year_month() {
        let connection = must_create_test_connection();
        let category = must_create_category("food", "Food", &connection);
        let original = must_create_transaction("txn-1", 1.0, &category.id, "2024-01-31", &connection);

        let updated = update_transaction(
            &original.id,
            TransactionUpdate {
                date: Some(TransactionDate::new("2024-02-01T09:00:00").unwrap()),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();

        assert_eq!(updated.year_month.as_ref(), "2024-02");
        assert_eq!(
            get_transactions_by_month(&YearMonth::new_unchecked("2024-01"), &connection),
            Ok(vec![])
        );
        assert_eq!(
            get_transactions_by_month(&YearMonth::new_unchecked("2024-02"), &connection),
            Ok(vec![updated])
        );
    }

    #[test]
    fn updating_category_refreshes_category_name() {
        let connection = must_create_test_connection();
        let food = must_create_category("food", "Food", &connection);
        let bills = must_create_category("bills", "Bills", &connection);
        let original = must_create_transaction("txn-1", 1.0, &food.id, "2024-01-31", &connection);

        let updated = update_transaction(
            &original.id,
            TransactionUpdate {
                category_id: Some(bills.id.clone()),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();

        assert_eq!(updated.category_id, bills.id);
        assert_eq!(updated.category_name, bills.name);
    }

    #[test]
    fn updating_to_missing_category_fails_and_leaves_transaction_unchanged() {
        let connection = must_create_test_connection();
        let food = must_create_category("food", "Food", &connection);
        let original = must_create_transaction("txn-1", 1.0, &food.id, "2024-01-31", &connection);
        let missing = CategoryId::new_unchecked("missing");

        let result = update_transaction(
            &original.id,
            TransactionUpdate {
                amount: Some(Amount::new(99.0).unwrap()),
                category_id: Some(missing.clone()),
                ..Default::default()
            },
            &connection,
        );

        assert_eq!(result, Err(Error::CategoryNotFound(missing)));
        assert_eq!(get_transaction(&original.id, &connection), Ok(original));
    }

    #[test]
    fn update_missing_transaction_returns_not_found() {
        let connection = must_create_test_connection();
        let id = TransactionId::new_unchecked("missing");

        let result = update_transaction(
            &id,
            TransactionUpdate {
                amount: Some(Amount::new(1.0).unwrap()),
                ..Default::default()
            },
            &connection,
        );

        assert_eq!(result, Err(Error::TransactionNotFound(id)));
    }

    #[test]
    fn empty_update_fails() {
        let connection = must_create_test_connection();
        let category = must_create_category("food", "Food", &connection);
        let original = must_create_transaction("txn-1", 1.0, &category.id, "2024-01-31", &connection);

        let result = update_transaction(&original.id, TransactionUpdate::default(), &connection);

        assert_eq!(result, Err(Error::EmptyUpdate));
    }

    #[test]
    fn delete_transaction_succeeds() {
        let connection = must_create_test_connection();
        let category = must_create_category("food", "Food", &connection);
        let transaction = must_create_transaction("txn-1", 1.0, &category.id, "2024-01-31", &connection);

        assert_eq!(delete_transaction(&transaction.id, &connection), Ok(()));
        assert_eq!(
            get_transaction(&transaction.id, &connection),
            Err(Error::TransactionNotFound(transaction.id))
        );
    }

    #[test]
    fn delete_missing_transaction_returns_not_found() {
        let connection = must_create_test_connection();
        let id = TransactionId::new_unchecked("missing");

        assert_eq!(
            delete_transaction(&id, &connection),
            Err(Error::TransactionNotFound(id))
        );
    }

    #[test]
    fn available_months_are_distinct_and_newest_first() {
        let connection = must_create_test_connection();
        let category = must_create_category("food", "Food", &connection);
        must_create_transaction("a", 1.0, &category.id, "2024-01-10", &connection);
        must_create_transaction("b", 1.0, &category.id, "2023-11-10", &connection);
        must_create_transaction("c", 1.0, &category.id, "2024-01-20", &connection);
        must_create_transaction("d", 1.0, &category.id, "2024-03-01", &connection);

        let months = get_available_months(&connection).unwrap();

        let months: Vec<&str> = months.iter().map(|month| month.as_ref()).collect();
        assert_eq!(months, ["2024-03", "2024-01", "2023-11"]);
    }
}
