//! Groups the transactions of a period by category.

use std::collections::HashMap;

use crate::{
    category::{UNCATEGORIZED_LABEL, is_non_cashflow_name},
    dashboard::{CategoryAggregate, CategoryMap, NotInCashflow, Summary},
    transaction::Transaction,
};

/// The transactions of a period grouped by category.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partition {
    /// One aggregate per category name, in display order.
    pub categories: CategoryMap,
    /// Transactions kept out of the cash flow.
    pub not_in_cashflow: NotInCashflow,
    /// Actual income and spending of the cash-flow transactions.
    pub summary: Summary,
}

/// Group `transactions` by category name.
///
/// Transfers are dropped. Transactions without a category are grouped under
/// [UNCATEGORIZED_LABEL]. Transactions in a non-cashflow category, or flagged
/// as excluded from the flow, are also collected in
/// [Partition::not_in_cashflow]. A flagged transaction in a regular category
/// does not count towards the category's `spent`.
///
/// `display_order` maps category names to their position. Ordered names come
/// first by position, the rest follow in the order they first appear.
pub fn partition_by_category(
    mut transactions: Vec<Transaction>,
    display_order: &HashMap<String, i64>,
) -> Partition {
    transactions.sort_by_key(|transaction| transaction.payment_date);

    let mut partition = Partition::default();

    for transaction in transactions {
        if transaction.is_transfer {
            continue;
        }

        let name = transaction
            .category_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNCATEGORIZED_LABEL.to_owned());
        let is_non_cashflow = is_non_cashflow_name(&name);
        let excluded = is_non_cashflow || transaction.excluded_from_flow;

        if !partition.categories.contains_key(&name) {
            let mut aggregate = CategoryAggregate::new(&name, is_non_cashflow);
            aggregate.display_order = display_order.get(&name).copied();
            partition.categories.insert(name.clone(), aggregate);
        }

        if excluded {
            partition.not_in_cashflow.total += transaction.amount;
            partition.not_in_cashflow.transactions.push(transaction.clone());
        } else if transaction.amount > 0.0 {
            partition.summary.income += transaction.amount;
        } else {
            partition.summary.expenses += transaction.amount.abs();
        }

        if let Some(aggregate) = partition.categories.get_mut(&name) {
            if is_non_cashflow || !transaction.excluded_from_flow {
                aggregate.spent += transaction.amount;
            }
            aggregate.transactions.push(transaction);
        }
    }

    partition.categories.sort_by_key(|_, aggregate| {
        (
            aggregate.display_order.is_none(),
            aggregate.display_order.unwrap_or_default(),
        )
    });

    partition
}
