//! Monthly spending summaries.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::{
    Error, LedgerStore,
    category::CategoryName,
    transaction::{Amount, TransactionDate, TransactionId, YearMonth},
};

/// The spending in a single category over a month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    /// The sum of the transaction amounts.
    pub total: f64,
    /// The number of transactions.
    pub count: u64,
}

/// The single most expensive transaction in a month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargestTransaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// How much was spent.
    pub amount: Amount,
    /// The category name stored on the transaction.
    pub category_name: CategoryName,
    /// The notes on the transaction.
    pub notes: Option<String>,
    /// When the money was spent.
    pub date: TransactionDate,
}

/// The aggregate view of a month's spending.
///
/// A month with no transactions has a zero total, no categories and no
/// largest transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// The month being summarised.
    pub year_month: YearMonth,
    /// The sum of every transaction amount in the month.
    pub total_amount: f64,
    /// The number of transactions in the month.
    pub transaction_count: u64,
    /// The totals per category, keyed by category name.
    ///
    /// The name stored on each transaction is used, so the breakdown reflects
    /// renames as soon as they are applied.
    pub category_breakdown: BTreeMap<String, CategoryTotal>,
    /// The transaction with the largest amount, if there are any transactions.
    pub largest_transaction: Option<LargestTransaction>,
}

/// Summarise the transactions in `year_month`.
///
/// `connection` should be inside an SQL transaction so that the totals and
/// breakdown are computed from the same snapshot.
///
/// # Errors
/// Returns an [Error::SqlError] if any of the queries fail.
pub fn get_monthly_summary(
    year_month: &YearMonth,
    connection: &Connection,
) -> Result<MonthlySummary, Error> {
    let (total_amount, transaction_count) = connection.query_row(
        "SELECT COALESCE(SUM(amount), 0.0), COUNT(id) FROM \"transaction\" WHERE year_month = ?1",
        [year_month.as_ref()],
        |row| Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?)),
    )?;

    let category_breakdown = connection
        .prepare(
            "SELECT category_name, SUM(amount), COUNT(id) FROM \"transaction\"
            WHERE year_month = ?1
            GROUP BY category_name",
        )?
        .query_map([year_month.as_ref()], |row| {
            let total = CategoryTotal {
                total: row.get(1)?,
                count: row.get::<_, i64>(2)? as u64,
            };

            Ok((row.get::<_, String>(0)?, total))
        })?
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let largest_transaction = connection
        .query_row(
            "SELECT id, amount, category_name, notes, date FROM \"transaction\"
            WHERE year_month = ?1
            ORDER BY amount DESC, date DESC, id ASC
            LIMIT 1",
            [year_month.as_ref()],
            |row| {
                let raw_id: String = row.get(0)?;
                let raw_category_name: String = row.get(2)?;
                let raw_date: String = row.get(4)?;
                let amount = Amount::new(row.get(1)?).map_err(|error| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Real,
                        Box::new(error),
                    )
                })?;

                Ok(LargestTransaction {
                    id: TransactionId::new_unchecked(&raw_id),
                    amount,
                    category_name: CategoryName::new_unchecked(&raw_category_name),
                    notes: row.get(3)?,
                    date: TransactionDate::new_unchecked(&raw_date),
                })
            },
        )
        .optional()?;

    Ok(MonthlySummary {
        year_month: year_month.clone(),
        total_amount,
        transaction_count: transaction_count as u64,
        category_breakdown,
        largest_transaction,
    })
}

/// Get the spending summary for a month given as `YYYY-MM`.
pub async fn get_monthly_summary_endpoint(
    State(store): State<LedgerStore>,
    Path(year_month): Path<String>,
) -> Result<Json<MonthlySummary>, Error> {
    let year_month = YearMonth::new(&year_month)?;

    store.get_monthly_summary(&year_month).map(Json)
}
