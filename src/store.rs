//! The [LedgerStore], the entry point for every ledger operation.

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use rusqlite::{Connection, OpenFlags};

use crate::{
    Error,
    category::{
        Category, CategoryId, CategoryUpdate, NewCategory, create_category, delete_category,
        get_all_categories, get_category, update_category,
    },
    db::{begin_read, begin_write, configure_connection, enable_write_ahead_log, initialize},
    snapshot::{ImportSummary, Snapshot, export_data, import_data},
    summary::{MonthlySummary, get_monthly_summary},
    transaction::{
        NewTransaction, Transaction, TransactionId, TransactionUpdate, YearMonth,
        create_transaction, delete_transaction, get_all_transactions, get_available_months,
        get_transaction, get_transactions_by_month, update_transaction,
    },
};

/// Settings for opening a [LedgerStore].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// How many read-only connections to open next to the single writer.
    ///
    /// Ignored for in-memory stores. Zero sends every read to the writer.
    pub read_connections: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            read_connections: 4,
        }
    }
}

/// An embedded SQLite store of categories and transactions.
///
/// Writes are serialised through a single connection and each runs inside an
/// SQL transaction. File-backed stores use write-ahead logging with a small
/// pool of read-only connections, so reads run alongside each other and
/// alongside the writer.
///
/// Cloning the store is cheap, clones share the same connections.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    writer: Arc<Mutex<Connection>>,
    readers: Arc<[Mutex<Connection>]>,
    next_reader: Arc<AtomicUsize>,
}

impl LedgerStore {
    /// Open the database file at `path`, creating it and its tables if needed.
    ///
    /// An in-memory path such as `:memory:` behaves like [LedgerStore::open_in_memory],
    /// since read-only connections could not see its data.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the schema cannot be created.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self, Error> {
        let path = path.as_ref();
        let writer = Connection::open(path)?;

        if is_in_memory(&writer) {
            tracing::info!("Opened in-memory ledger, reads will share the write connection");
            return Self::from_connection(writer);
        }

        configure_connection(&writer)?;
        enable_write_ahead_log(&writer)?;
        initialize(&writer)?;

        let readers = (0..config.read_connections)
            .map(|_| open_reader(path))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            "Opened ledger at {} with {} read connection(s)",
            path.display(),
            readers.len()
        );

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            readers: readers.into(),
            next_reader: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Open a private in-memory store. Every operation uses the one connection.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, creating the tables if needed.
    ///
    /// Every operation uses `connection`.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be configured or the schema cannot be created.
    pub fn from_connection(connection: Connection) -> Result<Self, Error> {
        configure_connection(&connection)?;
        initialize(&connection)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(connection)),
            readers: Vec::new().into(),
            next_reader: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Create a category, see [create_category].
    pub fn create_category(&self, new_category: NewCategory) -> Result<Category, Error> {
        let category = self.write(|connection| create_category(new_category, connection))?;
        tracing::debug!("Created category {} ({})", category.name, category.id);

        Ok(category)
    }

    /// Get every category, oldest first.
    pub fn get_all_categories(&self) -> Result<Vec<Category>, Error> {
        self.read(get_all_categories)
    }

    /// Get a category by ID, see [get_category].
    pub fn get_category(&self, id: &CategoryId) -> Result<Category, Error> {
        self.read(|connection| get_category(id, connection))
    }

    /// Partially update a category, see [update_category].
    pub fn update_category(&self, id: &CategoryId, update: CategoryUpdate) -> Result<Category, Error> {
        self.write(|connection| update_category(id, update, connection))
    }

    /// Delete a category no transaction refers to, see [delete_category].
    pub fn delete_category(&self, id: &CategoryId) -> Result<(), Error> {
        self.write(|connection| delete_category(id, connection))
    }

    /// Create a transaction, see [create_transaction].
    pub fn create_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction, Error> {
        let transaction = self.write(|connection| create_transaction(new_transaction, connection))?;
        tracing::debug!(
            "Created transaction {} in {}",
            transaction.id,
            transaction.year_month
        );

        Ok(transaction)
    }

    /// Get a transaction by ID, see [get_transaction].
    pub fn get_transaction(&self, id: &TransactionId) -> Result<Transaction, Error> {
        self.read(|connection| get_transaction(id, connection))
    }

    /// Get the transactions in a month, most recent first.
    pub fn get_transactions_by_month(
        &self,
        year_month: &YearMonth,
    ) -> Result<Vec<Transaction>, Error> {
        self.read(|connection| get_transactions_by_month(year_month, connection))
    }

    /// Get up to `limit` transactions across all months, most recent first.
    pub fn get_all_transactions(&self, limit: Option<u32>) -> Result<Vec<Transaction>, Error> {
        self.read(|connection| get_all_transactions(limit, connection))
    }

    /// Partially update a transaction, see [update_transaction].
    pub fn update_transaction(
        &self,
        id: &TransactionId,
        update: TransactionUpdate,
    ) -> Result<Transaction, Error> {
        self.write(|connection| update_transaction(id, update, connection))
    }

    /// Delete a transaction, see [delete_transaction].
    pub fn delete_transaction(&self, id: &TransactionId) -> Result<(), Error> {
        self.write(|connection| delete_transaction(id, connection))
    }

    /// Summarise the spending in a month.
    pub fn get_monthly_summary(&self, year_month: &YearMonth) -> Result<MonthlySummary, Error> {
        self.read(|connection| {
            let sql_transaction = begin_read(connection)?;
            let summary = get_monthly_summary(year_month, &sql_transaction)?;
            sql_transaction.commit()?;

            Ok(summary)
        })
    }

    /// The months that have at least one transaction, most recent first.
    pub fn get_available_months(&self) -> Result<Vec<YearMonth>, Error> {
        self.read(get_available_months)
    }

    /// Read every category and transaction from a single consistent view of the database.
    pub fn export_data(&self) -> Result<Snapshot, Error> {
        self.read(|connection| {
            let sql_transaction = begin_read(connection)?;
            let snapshot = export_data(&sql_transaction)?;
            sql_transaction.commit()?;

            Ok(snapshot)
        })
    }

    /// Restore a snapshot, overwriting records with matching IDs.
    ///
    /// Either every record is written or, on error, none are.
    pub fn import_data(&self, snapshot: &Snapshot) -> Result<ImportSummary, Error> {
        let summary = self.write(|connection| {
            let sql_transaction = begin_write(connection)?;
            let summary = import_data(snapshot, &sql_transaction)?;
            sql_transaction.commit()?;

            Ok(summary)
        })?;

        tracing::info!(
            "Imported {} categories and {} transactions",
            summary.categories_imported,
            summary.transactions_imported
        );

        Ok(summary)
    }

    fn write<T>(&self, operation: impl FnOnce(&Connection) -> Result<T, Error>) -> Result<T, Error> {
        let connection = self.writer.lock().map_err(|_| Error::DatabaseLockError)?;

        operation(&connection)
    }

    fn read<T>(&self, operation: impl FnOnce(&Connection) -> Result<T, Error>) -> Result<T, Error> {
        if self.readers.is_empty() {
            return self.write(operation);
        }

        let index = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let connection = self.readers[index]
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        operation(&connection)
    }
}

fn is_in_memory(connection: &Connection) -> bool {
    connection.path().is_none_or(str::is_empty)
}

fn open_reader(path: &Path) -> Result<Mutex<Connection>, Error> {
    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI,
    )?;
    configure_connection(&connection)?;

    Ok(Mutex::new(connection))
}
