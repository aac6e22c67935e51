//! Database initialisation.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error,
    category::{create_category_table, create_monthly_budget_table},
    target::{create_shared_category_target_table, create_target_refresh_table},
    transaction::create_transaction_table,
};

/// Create all of the tables used by the engine.
///
/// Safe to call on a database that has already been initialised.
///
/// # Errors
/// Returns an [Error::StoreUnavailable] if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_category_table(&transaction)?;
    create_monthly_budget_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_shared_category_target_table(&transaction)?;
    create_target_refresh_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
