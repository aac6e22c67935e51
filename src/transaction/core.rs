//! Defines the core data models and database queries for transactions.

use rusqlite::{
    Connection, OptionalExtension, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{CashFlowId, DatabaseId, TransactionId, UserId},
    flow_month::FlowMonth,
};

/// The currency assumed when a transaction does not specify one.
pub const DEFAULT_CURRENCY: &str = "ILS";

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, cash_flow_id, business_name, amount, \
    currency, payment_date, payment_month, payment_year, flow_month, category_name, notes, \
    payment_method, payment_identifier, excluded_from_flow, is_transfer, source_type, \
    fingerprint, created_at, updated_at";

// ============================================================================
// MODELS
// ============================================================================

/// Where a transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Entered by hand.
    #[default]
    Manual,
    /// Read from a bank or credit card statement.
    Import,
    /// Created by the application itself, e.g. goal bookkeeping.
    System,
}

impl SourceType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Import => "import",
            Self::System => "system",
        }
    }
}

impl ToSql for SourceType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SourceType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "manual" => Ok(Self::Manual),
            "import" => Ok(Self::Import),
            "system" => Ok(Self::System),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseId,
    /// The user that owns the transaction.
    pub user_id: UserId,
    /// The cash-flow group the transaction is recorded in.
    pub cash_flow_id: CashFlowId,
    /// Who the money was paid to or received from.
    pub business_name: String,
    /// The amount of money spent (negative) or earned (positive).
    pub amount: f64,
    /// The ISO 4217 currency code, e.g. "ILS".
    pub currency: String,
    /// When the money moved.
    pub payment_date: Date,
    /// The calendar month of `payment_date`, 1-12.
    pub payment_month: u8,
    /// The calendar year of `payment_date`.
    pub payment_year: i32,
    /// The month the transaction is budgeted in.
    pub flow_month: FlowMonth,
    /// The name of the category, if the transaction has been categorised.
    pub category_name: Option<String>,
    /// Free text notes.
    pub notes: String,
    /// The payment instrument, e.g. a card name.
    pub payment_method: Option<String>,
    /// An identifier from the payment provider, e.g. the last digits of a card.
    pub payment_identifier: Option<String>,
    /// Whether the transaction was manually taken out of the cash flow.
    pub excluded_from_flow: bool,
    /// Whether the transaction moves money between the user's own accounts.
    pub is_transfer: bool,
    /// Where the transaction came from.
    pub source_type: SourceType,
    /// The content fingerprint used to detect duplicates.
    pub fingerprint: String,
    /// When the row was created.
    pub created_at: OffsetDateTime,
    /// When the row was last changed.
    pub updated_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        user_id: UserId,
        cash_flow_id: CashFlowId,
        business_name: &str,
        amount: f64,
        payment_date: Date,
    ) -> TransactionBuilder {
        TransactionBuilder {
            user_id,
            cash_flow_id,
            business_name: business_name.to_owned(),
            amount,
            currency: DEFAULT_CURRENCY.to_owned(),
            payment_date,
            flow_month: None,
            category_name: None,
            notes: String::new(),
            payment_method: None,
            payment_identifier: None,
            excluded_from_flow: false,
            is_transfer: false,
            source_type: SourceType::Manual,
            fingerprint: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// # Examples
///
/// ```ignore
/// use time::macros::date;
///
/// use crate::transaction::Transaction;
///
/// let builder = Transaction::build(1, 1, "Shufersal", -45.99, date!(2025-01-15))
///     .category_name("Groceries")
///     .payment_method("Visa");
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The user that owns the transaction.
    pub user_id: UserId,

    /// The cash-flow group the transaction is recorded in.
    pub cash_flow_id: CashFlowId,

    /// Who the money was paid to or received from.
    ///
    /// For imported transactions this typically comes from the statement's
    /// description column, e.g. `"SHUFERSAL DEAL TLV"`.
    pub business_name: String,

    /// The monetary amount of the transaction.
    ///
    /// Positive values represent income, negative values represent expenses.
    ///
    /// # Examples
    /// - `12000.00` - Salary deposit
    /// - `-45.99` - Coffee shop purchase
    pub amount: f64,

    /// The ISO 4217 currency code. Defaults to [DEFAULT_CURRENCY].
    pub currency: String,

    /// The date when the transaction occurred.
    pub payment_date: Date,

    /// The month the transaction is budgeted in.
    ///
    /// Defaults to the month of `payment_date`.
    pub flow_month: Option<FlowMonth>,

    /// The category of the transaction, e.g. "Groceries", "Rent".
    pub category_name: Option<String>,

    /// Free text notes.
    ///
    /// Notes are part of the fingerprint, which is how forced imports of a
    /// duplicate are given a unique fingerprint.
    pub notes: String,

    /// The payment instrument. Not part of the fingerprint.
    pub payment_method: Option<String>,

    /// An identifier from the payment provider. Not part of the fingerprint.
    pub payment_identifier: Option<String>,

    /// Whether the transaction is kept out of the cash flow.
    pub excluded_from_flow: bool,

    /// Whether the transaction moves money between the user's own accounts.
    pub is_transfer: bool,

    /// Where the transaction came from.
    pub source_type: SourceType,

    /// A precomputed fingerprint.
    ///
    /// - `Some(fingerprint)` - Use this fingerprint, e.g. one computed when a
    ///   statement was parsed
    /// - `None` - Compute the fingerprint from the transaction's content
    pub fingerprint: Option<String>,
}

impl TransactionBuilder {
    /// Set the currency code.
    pub fn currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_owned();
        self
    }

    /// Budget the transaction in `flow_month` instead of its payment month.
    pub fn flow_month(mut self, flow_month: FlowMonth) -> Self {
        self.flow_month = Some(flow_month);
        self
    }

    /// Set the category name.
    pub fn category_name(mut self, category_name: &str) -> Self {
        self.category_name = Some(category_name.to_owned());
        self
    }

    /// Set the notes.
    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = notes.to_owned();
        self
    }

    /// Set the payment method.
    pub fn payment_method(mut self, payment_method: &str) -> Self {
        self.payment_method = Some(payment_method.to_owned());
        self
    }

    /// Set the payment identifier.
    pub fn payment_identifier(mut self, payment_identifier: &str) -> Self {
        self.payment_identifier = Some(payment_identifier.to_owned());
        self
    }

    /// Keep the transaction out of the cash flow.
    pub fn excluded_from_flow(mut self, excluded_from_flow: bool) -> Self {
        self.excluded_from_flow = excluded_from_flow;
        self
    }

    /// Mark the transaction as a transfer between the user's own accounts.
    pub fn is_transfer(mut self, is_transfer: bool) -> Self {
        self.is_transfer = is_transfer;
        self
    }

    /// Set where the transaction came from.
    pub fn source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    /// Use a precomputed fingerprint.
    pub fn fingerprint(mut self, fingerprint: &str) -> Self {
        self.fingerprint = Some(fingerprint.to_owned());
        self
    }
}

/// Parse a user-supplied amount, e.g. `"-1,234.50"`.
///
/// Thousands separators and surrounding whitespace are ignored.
///
/// # Errors
/// Returns [Error::InvalidAmount] if `input` is not a finite number.
pub fn parse_amount(input: &str) -> Result<f64, Error> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(Error::InvalidAmount(input.to_owned())),
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Insert a transaction whose duplicate check has already been done.
///
/// The builder must have its fingerprint set.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidFlowMonth] if the payment date is out of the storable range,
/// - [Error::DuplicateTransaction] if the fingerprint is already used by the
///   user in the cash flow,
/// - or [Error::StoreUnavailable] if there is some other SQL error.
pub(crate) fn insert_transaction(
    builder: &TransactionBuilder,
    fingerprint: &str,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let flow_month = resolve_flow_month(builder)?;

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" ({})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                     ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)
             RETURNING id, {}",
            insert_columns(),
            insert_columns(),
        ))?
        .query_row(
            rusqlite::params_from_iter(insert_params(
                builder,
                flow_month,
                fingerprint,
                OffsetDateTime::now_utc(),
            )),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// The columns written on insert, i.e. everything except the ID.
pub(crate) fn insert_columns() -> &'static str {
    TRANSACTION_COLUMNS.trim_start_matches("id, ")
}

/// The flow month a transaction will be stored under: the one set on the
/// builder, or else the month of its payment date.
///
/// # Errors
/// Returns [Error::InvalidFlowMonth] if the payment date is too far in the
/// past or future to be stored as a flow month.
pub(crate) fn resolve_flow_month(builder: &TransactionBuilder) -> Result<FlowMonth, Error> {
    match builder.flow_month {
        Some(flow_month) => Ok(flow_month),
        None => FlowMonth::from_date(builder.payment_date),
    }
}

/// The values for [insert_columns], minus the repeated timestamp.
pub(crate) fn insert_params(
    builder: &TransactionBuilder,
    flow_month: FlowMonth,
    fingerprint: &str,
    now: OffsetDateTime,
) -> Vec<Box<dyn ToSql>> {
    vec![
        Box::new(builder.user_id),
        Box::new(builder.cash_flow_id),
        Box::new(builder.business_name.clone()),
        Box::new(builder.amount),
        Box::new(builder.currency.trim().to_uppercase()),
        Box::new(builder.payment_date),
        Box::new(builder.payment_date.month() as u8),
        Box::new(builder.payment_date.year()),
        Box::new(flow_month),
        Box::new(builder.category_name.clone()),
        Box::new(builder.notes.clone()),
        Box::new(builder.payment_method.clone()),
        Box::new(builder.payment_identifier.clone()),
        Box::new(builder.excluded_from_flow),
        Box::new(builder.is_transfer),
        Box::new(builder.source_type),
        Box::new(fingerprint.to_owned()),
        Box::new(now),
    ]
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::StoreUnavailable] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_one(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Find the oldest transaction with `fingerprint` in the user's cash flow.
pub(crate) fn find_by_fingerprint(
    user_id: UserId,
    cash_flow_id: CashFlowId,
    fingerprint: &str,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = ?1 AND cash_flow_id = ?2 AND fingerprint = ?3
             ORDER BY id ASC LIMIT 1"
        ))?
        .query_row((user_id, cash_flow_id, fingerprint), map_transaction_row)
        .optional()?;

    Ok(transaction)
}

/// Get the transactions of a cash flow budgeted in `flow_month`, or all of
/// them if `flow_month` is `None`.
///
/// Transactions are ordered by payment date, oldest first.
pub fn get_transactions_for_period(
    user_id: UserId,
    cash_flow_id: CashFlowId,
    flow_month: Option<FlowMonth>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut statement = connection.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
         WHERE user_id = ?1 AND cash_flow_id = ?2 AND (?3 IS NULL OR flow_month = ?3)
         ORDER BY payment_date ASC, id ASC"
    ))?;

    statement
        .query_map((user_id, cash_flow_id, flow_month), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Get the total number of transactions the user has in a cash flow.
///
/// # Errors
/// This function will return a [Error::StoreUnavailable] there is some SQL error.
pub fn count_transactions(
    user_id: UserId,
    cash_flow_id: CashFlowId,
    connection: &Connection,
) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1 AND cash_flow_id = ?2",
            (user_id, cash_flow_id),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                cash_flow_id INTEGER NOT NULL,
                business_name TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                payment_date TEXT NOT NULL,
                payment_month INTEGER NOT NULL,
                payment_year INTEGER NOT NULL,
                flow_month TEXT NOT NULL,
                category_name TEXT,
                notes TEXT NOT NULL DEFAULT '',
                payment_method TEXT,
                payment_identifier TEXT,
                excluded_from_flow INTEGER NOT NULL DEFAULT 0,
                is_transfer INTEGER NOT NULL DEFAULT 0,
                source_type TEXT NOT NULL DEFAULT 'manual',
                fingerprint TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, cash_flow_id, fingerprint)
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    // Used by the dashboard and the monthly averages.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_flow_month
         ON \"transaction\"(user_id, cash_flow_id, flow_month);",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_category_month
         ON \"transaction\"(user_id, category_name, payment_year, payment_month);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        cash_flow_id: row.get(2)?,
        business_name: row.get(3)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        payment_date: row.get(6)?,
        payment_month: row.get(7)?,
        payment_year: row.get(8)?,
        flow_month: row.get(9)?,
        category_name: row.get(10)?,
        notes: row.get(11)?,
        payment_method: row.get(12)?,
        payment_identifier: row.get(13)?,
        excluded_from_flow: row.get(14)?,
        is_transfer: row.get(15)?,
        source_type: row.get(16)?,
        fingerprint: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
