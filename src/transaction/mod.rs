//! Transactions and how they are stored without duplicates.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Content fingerprints and the duplicate resolver used for single inserts
//! - The bulk import path with its batched existence check

mod batch;
mod core;
mod duplicate;
mod fingerprint;

pub use batch::{
    BatchImportResult, check_existing, create_transactions_batch, get_transactions_by_fingerprints,
};
pub use core::{
    DEFAULT_CURRENCY, SourceType, Transaction, TransactionBuilder, count_transactions,
    create_transaction_table, get_transaction, get_transactions_for_period, parse_amount,
};
pub use duplicate::{
    CreateOutcome, DUPLICATE_MARKER, Resolution, create_transaction, resolve_duplicate,
};
pub use fingerprint::{fingerprint, fingerprint_fields, normalize_payment_date, parse_payment_date};
