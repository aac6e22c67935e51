#![allow(missing_docs)]

use rusqlite::Connection;
use time::Date;

use crate::{
    category::{Category, CategoryName, CategoryType, NewCategory, create_category},
    database_id::{CashFlowId, UserId},
    db::initialize,
    transaction::{CreateOutcome, Transaction, create_transaction},
};

pub(crate) const TEST_USER: UserId = 1;
pub(crate) const TEST_CASH_FLOW: CashFlowId = 1;

pub(crate) fn get_test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    initialize(&conn).unwrap();
    conn
}

pub(crate) fn seed_category(
    name: &str,
    category_type: Option<CategoryType>,
    budget: f64,
    conn: &Connection,
) -> Category {
    let mut new_category =
        NewCategory::new(TEST_USER, CategoryName::new_unchecked(name)).budget(budget);
    new_category.category_type = category_type;

    create_category(new_category, conn).expect("Could not create category")
}

/// Store a transaction in the test cash flow, forcing it in if it has the
/// same content as an earlier one.
pub(crate) fn seed_transaction(
    category_name: &str,
    amount: f64,
    payment_date: Date,
    conn: &Connection,
) -> Transaction {
    let builder = Transaction::build(TEST_USER, TEST_CASH_FLOW, category_name, amount, payment_date)
        .category_name(category_name);

    match create_transaction(builder, true, 10, conn) {
        Ok(CreateOutcome::Created { transaction }) => transaction,
        other => panic!("Could not create transaction: {other:?}"),
    }
}
