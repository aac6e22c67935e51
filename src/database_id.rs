//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// Database identifier for a transaction.
pub type TransactionId = DatabaseId;

/// Identifier of the user that owns transactions, categories and targets.
pub type UserId = DatabaseId;

/// Identifier of the cash-flow group a transaction is recorded in.
pub type CashFlowId = DatabaseId;
