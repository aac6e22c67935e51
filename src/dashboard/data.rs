//! Builds the dashboard of a reporting period from stored rows.

use std::collections::HashMap;

use rusqlite::Connection;

use crate::{
    Error,
    category::{get_all_categories, get_monthly_budgets},
    dashboard::{
        DashboardData, DashboardQuery, DashboardResponse,
        partition::partition_by_category,
        shared::{CategorySettings, group_shared_categories},
        summary::calculate_summary,
    },
    database_id::UserId,
    target::get_shared_category_targets,
    transaction::get_transactions_for_period,
};

/// Get the dashboard of the period and cash flow selected by `query`.
///
/// Never fails. If the dashboard cannot be built the error is logged and the
/// response carries an empty dashboard with `success` unset.
pub fn get_dashboard_data(
    user_id: UserId,
    query: &DashboardQuery,
    connection: &Connection,
) -> DashboardResponse {
    let flow_month = query.period.flow_month();

    match build_dashboard(user_id, query, connection) {
        Ok((data, transaction_count)) => DashboardResponse {
            success: true,
            data,
            flow_month,
            cash_flow_id: query.cash_flow_id,
            transaction_count,
            error: None,
        },
        Err(error) => {
            tracing::error!(
                "Could not build the dashboard for user {user_id}, cash flow {}: {error}",
                query.cash_flow_id
            );

            DashboardResponse::failed(query, &error)
        }
    }
}

fn build_dashboard(
    user_id: UserId,
    query: &DashboardQuery,
    connection: &Connection,
) -> Result<(DashboardData, usize), Error> {
    let flow_month = query.period.flow_month();

    let transactions =
        get_transactions_for_period(user_id, query.cash_flow_id, flow_month, connection)?;
    let transaction_count = transactions.len();

    let categories = get_all_categories(user_id, connection)?;
    let display_order: HashMap<String, i64> = categories
        .iter()
        .filter_map(|category| {
            category
                .display_order
                .map(|position| (category.name.to_string(), position))
        })
        .collect();

    let monthly_budgets = match flow_month {
        Some(flow_month) => get_monthly_budgets(user_id, flow_month, connection)?,
        None => HashMap::new(),
    };
    let shared_targets = get_shared_category_targets(user_id, connection)?;

    let partition = partition_by_category(transactions, &display_order);
    let grouped = group_shared_categories(
        partition.categories,
        CategorySettings {
            categories: &categories,
            monthly_budgets: &monthly_budgets,
            shared_targets: &shared_targets,
        },
    );
    let summary = calculate_summary(&grouped, query.monthly_savings);

    tracing::debug!(
        "Built dashboard with {} entries from {transaction_count} transactions",
        grouped.len()
    );

    Ok((
        DashboardData {
            categories: grouped,
            not_in_cashflow: partition.not_in_cashflow,
            summary,
        },
        transaction_count,
    ))
}
