//! Cashflow is the bookkeeping engine behind a personal-finance tracker.
//!
//! This library covers the two parts of the tracker that carry real rules:
//! - deduplicating transactions on insert, singly or in bulk, using a content
//!   fingerprint,
//! - turning the transactions of a reporting period into a budget-aware
//!   dashboard view-model, and deriving monthly targets from history.
//!
//! Everything is stored in SQLite. The [Ledger] type wraps a shared
//! connection and exposes the operations the surrounding application calls.

#![warn(missing_docs)]

mod category;
mod config;
mod dashboard;
mod database_id;
mod db;
mod flow_month;
mod ledger;
mod target;
mod timezone;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use category::{
    Category, CategoryKind, CategoryName, CategoryType, NewCategory, UNCATEGORIZED_LABEL,
    category_color, classify_category, create_category, get_all_categories, get_category,
    get_monthly_budgets, is_fixed_income, save_category_order, set_monthly_budget,
    set_shared_category,
};
pub use config::EngineConfig;
pub use dashboard::{
    CategoryAggregate, CategoryMap, DashboardData, DashboardQuery, DashboardResponse,
    NotInCashflow, Period, Summary, get_dashboard_data,
};
pub use database_id::{CashFlowId, DatabaseId, TransactionId, UserId};
pub use db::initialize as initialize_db;
pub use flow_month::FlowMonth;
pub use ledger::Ledger;
pub use target::{
    CategoryTargetResult, RefreshReport, SharedCategoryTarget, SharedTargetAction,
    SharedTargetResult, calculate_and_update_shared_category_targets, calculate_monthly_average,
    calculate_weekly_target, get_category_monthly_spending, get_shared_category_monthly_spending,
    get_shared_category_target, get_shared_category_targets, refresh_monthly_targets,
    set_use_shared_target, should_refresh_targets, update_category_monthly_target,
    update_shared_category_target,
};
pub use transaction::{
    BatchImportResult, CreateOutcome, DEFAULT_CURRENCY, DUPLICATE_MARKER, Resolution, SourceType,
    Transaction, TransactionBuilder, check_existing, count_transactions, create_transaction,
    create_transactions_batch, fingerprint, fingerprint_fields, get_transaction,
    get_transactions_by_fingerprints, get_transactions_for_period, normalize_payment_date,
    parse_amount, parse_payment_date, resolve_duplicate,
};

/// The errors that may occur in the engine.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A transaction with the same fingerprint already exists for the user and
    /// cash flow.
    ///
    /// This is a soft error: callers should offer to import the transaction
    /// anyway with `force_import` set.
    #[error("a transaction with the same content already exists")]
    DuplicateTransaction,

    /// The amount of a transaction is not a finite number.
    ///
    /// Callers should pass in the offending input as a string.
    #[error("invalid amount \"{0}\": must be a finite number")]
    InvalidAmount(String),

    /// A target or shared-target update referred to a category that the user
    /// does not have.
    #[error("the category \"{0}\" could not be found for this user")]
    CategoryNotFound(String),

    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// A flow month was not in the `YYYY-MM` format or was out of range.
    #[error("invalid flow month \"{0}\", expected YYYY-MM between 1900 and 2100")]
    InvalidFlowMonth(String),

    /// The requested record was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The backing store failed in a way the engine does not handle.
    ///
    /// The inner error should only be logged. Callers should present this as a
    /// generic failure.
    #[error("the store is unavailable: {0}")]
    StoreUnavailable(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("transaction.fingerprint") =>
            {
                Error::DuplicateTransaction
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::StoreUnavailable(error)
            }
        }
    }
}
