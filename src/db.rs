//! Connection setup, schema creation and shared SQL helpers.

use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior, Transaction as SqlTransaction, ffi};
use time::OffsetDateTime;

use crate::{Error, category::create_category_table, transaction::create_transaction_table};

/// How long a connection waits on a locked database file before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the tables and indexes for the domain models if they do not exist.
///
/// # Errors
/// Returns an error if the schema cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Apply the per-connection settings needed by a connection that writes.
///
/// Foreign keys are off by default in SQLite and must be enabled on every
/// connection for `transaction.category_id` to be enforced.
pub(crate) fn configure_connection(connection: &Connection) -> Result<(), Error> {
    connection.busy_timeout(BUSY_TIMEOUT)?;
    connection.pragma_update(None, "foreign_keys", true)?;

    Ok(())
}

/// Switch a file-backed database to write-ahead logging so that readers do
/// not block the writer and vice versa.
pub(crate) fn enable_write_ahead_log(connection: &Connection) -> Result<(), Error> {
    let journal_mode: String =
        connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    if !journal_mode.eq_ignore_ascii_case("wal") {
        tracing::warn!("Could not enable WAL mode, database is using {journal_mode}");
    }

    Ok(())
}

/// Start an SQL transaction for a multi-statement write.
///
/// The write lock is taken up front so that the statements see a stable
/// database and either all apply or none do.
pub(crate) fn begin_write(connection: &Connection) -> Result<SqlTransaction<'_>, Error> {
    SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate).map_err(Error::from)
}

/// Start an SQL transaction for reads that must observe a single snapshot.
pub(crate) fn begin_read(connection: &Connection) -> Result<SqlTransaction<'_>, Error> {
    SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred).map_err(Error::from)
}

/// The current time in UTC, used for `created_at` and `updated_at`.
pub(crate) fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Whether `error` is a UNIQUE or PRIMARY KEY violation on `table.column`.
///
/// SQLite reports both as "UNIQUE constraint failed: table.column".
pub(crate) fn is_unique_violation(error: &rusqlite::Error, column: &str) -> bool {
    match error {
        rusqlite::Error::SqliteFailure(sql_error, Some(description)) => {
            (sql_error.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || sql_error.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
                && description.ends_with(column)
        }
        _ => false,
    }
}

/// Whether `error` is a FOREIGN KEY violation.
pub(crate) fn is_foreign_key_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: _,
                extended_code: ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            },
            _,
        )
    )
}
