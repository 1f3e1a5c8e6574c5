//! Core transaction domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime,
    format_description::{BorrowedFormatItem, well_known::Iso8601},
    macros::format_description,
};
use uuid::Uuid;

use crate::{
    Error,
    category::{CategoryId, CategoryName, deserialize_some},
};

const CALENDAR_DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// The opaque, unique identifier of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    /// Create a transaction ID.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidField] if `id` is empty or just whitespace.
    pub fn new(id: &str) -> Result<Self, Error> {
        let id = id.trim();

        if id.is_empty() {
            Err(Error::InvalidField {
                field: "id",
                reason: "transaction ID cannot be empty".to_owned(),
            })
        } else {
            Ok(Self(id.to_owned()))
        }
    }

    /// Create a new random transaction ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub(crate) fn new_unchecked(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl AsRef<str> for TransactionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TransactionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionId::new(s)
    }
}

impl TryFrom<String> for TransactionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TransactionId::new(&value)
    }
}

impl From<TransactionId> for String {
    fn from(value: TransactionId) -> Self {
        value.0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An amount of money spent, always finite and greater than zero.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Amount(f64);

impl Amount {
    /// Create an amount.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidField] if `amount` is zero, negative, NaN or
    /// infinite.
    pub fn new(amount: f64) -> Result<Self, Error> {
        if amount.is_finite() && amount > 0.0 {
            Ok(Self(amount))
        } else {
            Err(Error::InvalidField {
                field: "amount",
                reason: format!("{amount} is not a positive amount"),
            })
        }
    }

    /// The amount as a float.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Amount {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for f64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

/// The calendar month a transaction falls in, formatted as `YYYY-MM`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth(String);

impl YearMonth {
    /// Parse a year-month string such as `"2024-01"`.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidYearMonth] if `year_month` is not a four digit
    /// year and a month between 01 and 12 separated by a dash.
    pub fn new(year_month: &str) -> Result<Self, Error> {
        let year_month = year_month.trim();
        let is_valid = year_month.len() == 7
            && Date::parse(&format!("{year_month}-01"), CALENDAR_DATE_FORMAT).is_ok();

        if is_valid {
            Ok(Self(year_month.to_owned()))
        } else {
            Err(Error::InvalidYearMonth(year_month.to_owned()))
        }
    }

    /// The year-month that `date` falls in.
    pub fn from_date(date: Date) -> Self {
        Self(format!("{:04}-{:02}", date.year(), u8::from(date.month())))
    }

    pub(crate) fn new_unchecked(year_month: &str) -> Self {
        Self(year_month.to_owned())
    }
}

impl AsRef<str> for YearMonth {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        YearMonth::new(s)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        YearMonth::new(&value)
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.0
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// When a transaction happened, as an ISO 8601 calendar date or date-time.
///
/// Accepted forms are `YYYY-MM-DD` and `YYYY-MM-DDTHH:MM[:SS[.fff]]` with an
/// optional `Z` or `±HH:MM` offset. The text is kept exactly as given (minus
/// surrounding whitespace), so its first seven characters are always the
/// [YearMonth].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionDate(String);

impl TransactionDate {
    /// Parse an ISO 8601 date or date-time.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidField] if `date` is not in one of the
    /// accepted forms or is not a real date, e.g. `2024-02-30`.
    pub fn new(date: &str) -> Result<Self, Error> {
        let date = date.trim();

        match parse_calendar_date(date) {
            Some(_) => Ok(Self(date.to_owned())),
            None => Err(Error::InvalidField {
                field: "date",
                reason: format!("\"{date}\" is not an ISO 8601 date"),
            }),
        }
    }

    /// The year-month this date falls in.
    pub fn year_month(&self) -> YearMonth {
        YearMonth::new_unchecked(&self.0[..7])
    }

    pub(crate) fn new_unchecked(date: &str) -> Self {
        Self(date.to_owned())
    }
}

impl AsRef<str> for TransactionDate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TransactionDate {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TransactionDate::new(&value)
    }
}

impl From<TransactionDate> for String {
    fn from(value: TransactionDate) -> Self {
        value.0
    }
}

impl Display for TransactionDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse the calendar date at the start of `text`.
///
/// The leading `YYYY-MM-DD` is required so that basic-format dates like
/// `20240115` are rejected. Anything after it must make `text` a valid
/// ISO 8601 date-time.
fn parse_calendar_date(text: &str) -> Option<Date> {
    let date = Date::parse(text.get(..10)?, CALENDAR_DATE_FORMAT).ok()?;

    let is_valid = text.len() == 10
        || PrimitiveDateTime::parse(text, &Iso8601::DEFAULT).is_ok()
        || OffsetDateTime::parse(text, &Iso8601::DEFAULT).is_ok();

    is_valid.then_some(date)
}

/// An expense, i.e. an event where money was spent.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransactionRecord")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The amount of money spent.
    pub amount: Amount,
    /// The ID of the category the transaction belongs to.
    pub category_id: CategoryId,
    /// The name of the category when the transaction was written.
    pub category_name: CategoryName,
    /// Free text notes about what the transaction was for.
    pub notes: Option<String>,
    /// When the transaction happened.
    pub date: TransactionDate,
    /// The month bucket of `date`.
    pub year_month: YearMonth,
    /// When the transaction was first stored.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the transaction was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Transaction {
    /// Start building a new transaction.
    ///
    /// Shortcut for [NewTransaction::new] for discoverability.
    pub fn build(amount: Amount, category_id: CategoryId, date: TransactionDate) -> NewTransaction {
        NewTransaction::new(amount, category_id, date)
    }
}

/// The serialized form of a [Transaction].
///
/// `year_month` is derived from `date`, so any value in the input is ignored.
#[derive(Deserialize)]
struct TransactionRecord {
    id: TransactionId,
    amount: Amount,
    category_id: CategoryId,
    category_name: CategoryName,
    #[serde(default)]
    notes: Option<String>,
    date: TransactionDate,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl From<TransactionRecord> for Transaction {
    fn from(record: TransactionRecord) -> Self {
        Self {
            year_month: record.date.year_month(),
            id: record.id,
            amount: record.amount,
            category_id: record.category_id,
            category_name: record.category_name,
            notes: record.notes,
            date: record.date,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// The fields needed to create a [Transaction].
///
/// The category name and year-month are filled in by the store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTransaction {
    /// The ID to store the transaction under, a random ID is generated if `None`.
    #[serde(default)]
    pub id: Option<TransactionId>,
    /// The amount of money spent.
    pub amount: Amount,
    /// The category of the transaction, which must already exist.
    pub category_id: CategoryId,
    /// Free text notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// When the transaction happened.
    pub date: TransactionDate,
}

impl NewTransaction {
    /// Start a new transaction without an ID or notes.
    pub fn new(amount: Amount, category_id: CategoryId, date: TransactionDate) -> Self {
        Self {
            id: None,
            amount,
            category_id,
            notes: None,
            date,
        }
    }

    /// Set the ID for the transaction.
    pub fn id(mut self, id: TransactionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the notes for the transaction.
    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_owned());
        self
    }
}

/// A partial update of a [Transaction], only the fields that are `Some` change.
///
/// `notes` is nullable, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransactionUpdate {
    /// The new amount.
    #[serde(default)]
    pub amount: Option<Amount>,
    /// The new category, which must exist.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// The new notes, or `Some(None)` to remove them.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
    /// The new date, the year-month is recomputed from it.
    #[serde(default)]
    pub date: Option<TransactionDate>,
}

impl TransactionUpdate {
    /// Whether the update would not change anything.
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.category_id.is_none()
            && self.notes.is_none()
            && self.date.is_none()
    }
}
