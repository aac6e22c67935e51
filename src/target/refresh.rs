//! The monthly refresh of category and shared category targets.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    category::{CategoryKind, CategoryType, classify_category, get_all_categories, is_fixed_income},
    database_id::UserId,
    flow_month::FlowMonth,
    target::{
        calculate_monthly_average,
        db::{
            claim_refresh, get_last_refresh, get_shared_category_target, store_shared_target_amount,
        },
        round_cents, update_category_monthly_target,
    },
};

/// The outcome of refreshing one category's target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryTargetResult {
    /// The target was recalculated and stored.
    Updated {
        /// The category name.
        category: String,
        /// The target before the refresh.
        old_target: Option<f64>,
        /// The stored target.
        new_target: f64,
    },
    /// The target could not be recalculated. Other categories are unaffected.
    Failed {
        /// The category name.
        category: String,
        /// Why the refresh failed.
        error: String,
    },
}

/// What happened to a shared category target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SharedTargetAction {
    /// The shared category had no target yet.
    Created {
        /// The stored target.
        new_target: f64,
    },
    /// The existing target was replaced.
    Updated {
        /// The target before the refresh.
        old_target: f64,
        /// The stored target.
        new_target: f64,
    },
    /// The target could not be recalculated.
    Failed {
        /// Why the recalculation failed.
        error: String,
    },
}

/// The outcome of recalculating one shared category target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedTargetResult {
    /// The shared category label.
    pub shared_category: String,
    /// The member categories whose averages make up the target.
    pub categories: Vec<String>,
    /// What happened to the target.
    #[serde(flatten)]
    pub action: SharedTargetAction,
}

/// The outcome of [refresh_monthly_targets].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    /// Whether the targets were recalculated. False if they had already been
    /// refreshed for the month.
    pub updated: bool,
    /// The number of categories whose target was stored.
    pub updated_count: usize,
    /// The number of categories the user has.
    pub total_categories: usize,
    /// One entry per category.
    pub results: Vec<CategoryTargetResult>,
    /// One entry per shared category.
    pub shared_category_results: Vec<SharedTargetResult>,
    /// The month the targets were refreshed for.
    pub flow_month: FlowMonth,
}

impl RefreshReport {
    fn skipped(flow_month: FlowMonth) -> Self {
        Self {
            updated: false,
            updated_count: 0,
            total_categories: 0,
            results: Vec::new(),
            shared_category_results: Vec::new(),
            flow_month,
        }
    }
}

/// Whether the user's targets have not been refreshed for the month of `today` yet.
pub fn should_refresh_targets(
    user_id: UserId,
    today: Date,
    connection: &Connection,
) -> Result<bool, Error> {
    let month_start = FlowMonth::from_date(today)?.first_day();

    Ok(match get_last_refresh(user_id, connection)? {
        Some(last_refresh) => last_refresh < month_start,
        None => true,
    })
}

/// Recalculate every category's monthly target as its average over the
/// `months` months before `today`, then the shared category targets.
///
/// Runs at most once per calendar month unless `force` is set. The
/// check-and-advance of the watermark is a single statement committed together
/// with the new targets, so two concurrent refreshes cannot both run for the
/// same month. A failure for one category is recorded in the report and does
/// not stop the others.
///
/// # Errors
/// Returns an [Error::StoreUnavailable] if the watermark or the category list
/// could not be read. No targets are changed in that case.
pub fn refresh_monthly_targets(
    user_id: UserId,
    force: bool,
    months: u32,
    today: Date,
    connection: &Connection,
) -> Result<RefreshReport, Error> {
    let flow_month = FlowMonth::from_date(today)?;
    let transaction = connection.unchecked_transaction()?;

    if !claim_refresh(user_id, flow_month.first_day(), force, &transaction)? {
        tracing::debug!("Targets for user {user_id} were already refreshed for {flow_month}");
        return Ok(RefreshReport::skipped(flow_month));
    }

    let categories = get_all_categories(user_id, &transaction)?;
    let mut results = Vec::with_capacity(categories.len());

    for category in &categories {
        let name = category.name.as_ref();
        let refreshed = calculate_monthly_average(user_id, name, months, today, &transaction)
            .and_then(|average| {
                update_category_monthly_target(user_id, name, average, &transaction)
                    .map(|_| average)
            });

        match refreshed {
            Ok(new_target) => results.push(CategoryTargetResult::Updated {
                category: name.to_owned(),
                old_target: category.monthly_target,
                new_target,
            }),
            Err(error) => {
                tracing::warn!("Could not refresh the target for {name}: {error}");
                results.push(CategoryTargetResult::Failed {
                    category: name.to_owned(),
                    error: error.to_string(),
                });
            }
        }
    }

    let shared_category_results =
        match calculate_and_update_shared_category_targets(user_id, months, today, &transaction) {
            Ok(shared_results) => shared_results,
            Err(error) => {
                tracing::warn!("Could not refresh shared category targets: {error}");
                Vec::new()
            }
        };

    transaction.commit()?;

    let updated_count = results
        .iter()
        .filter(|result| matches!(result, CategoryTargetResult::Updated { .. }))
        .count();
    tracing::info!(
        "Refreshed {updated_count} of {} targets for user {user_id} for {flow_month}",
        categories.len()
    );

    Ok(RefreshReport {
        updated: true,
        updated_count,
        total_categories: categories.len(),
        results,
        shared_category_results,
        flow_month,
    })
}

/// Recalculate the target of every shared category as the sum of its
/// members' averages.
///
/// Only members that use the shared target take part. In an income group,
/// members with a fixed-income name use the last month only.
pub fn calculate_and_update_shared_category_targets(
    user_id: UserId,
    months: u32,
    today: Date,
    connection: &Connection,
) -> Result<Vec<SharedTargetResult>, Error> {
    let mut groups: BTreeMap<String, Vec<(String, Option<CategoryType>)>> = BTreeMap::new();

    for category in get_all_categories(user_id, connection)? {
        if !category.use_shared_target {
            continue;
        }
        if let Some(label) = category.shared_category {
            groups
                .entry(label)
                .or_default()
                .push((category.name.to_string(), category.category_type));
        }
    }

    let mut results = Vec::with_capacity(groups.len());

    for (label, members) in groups {
        let is_income_group = classify_category(&label, None) == CategoryKind::Income
            || members.iter().all(|(name, category_type)| {
                classify_category(name, *category_type) == CategoryKind::Income
            });

        let action = recalculate_group(
            user_id,
            &label,
            &members,
            is_income_group,
            months,
            today,
            connection,
        )
        .unwrap_or_else(|error| {
            tracing::warn!("Could not refresh the target for shared category {label}: {error}");
            SharedTargetAction::Failed {
                error: error.to_string(),
            }
        });

        results.push(SharedTargetResult {
            shared_category: label,
            categories: members.into_iter().map(|(name, _)| name).collect(),
            action,
        });
    }

    Ok(results)
}

fn recalculate_group(
    user_id: UserId,
    label: &str,
    members: &[(String, Option<CategoryType>)],
    is_income_group: bool,
    months: u32,
    today: Date,
    connection: &Connection,
) -> Result<SharedTargetAction, Error> {
    let mut total = 0.0;

    for (name, _) in members {
        let is_fixed = is_fixed_income(name, Some(CategoryType::Income));
        let member_months = if is_income_group && is_fixed {
            1
        } else {
            months
        };
        total += calculate_monthly_average(user_id, name, member_months, today, connection)?;
    }

    let new_target = round_cents(total);
    let existing = get_shared_category_target(user_id, label, connection)?;
    store_shared_target_amount(user_id, label, new_target, connection)?;
    tracing::debug!("Shared category {label} target: {new_target}");

    Ok(match existing {
        Some(existing) => SharedTargetAction::Updated {
            old_target: existing.monthly_target,
            new_target,
        },
        None => SharedTargetAction::Created { new_target },
    })
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        category::{CategoryName, CategoryType, NewCategory, create_category, get_category},
        target::{
            CategoryTargetResult, SharedTargetAction, calculate_and_update_shared_category_targets,
            get_shared_category_target, refresh_monthly_targets, set_use_shared_target,
            should_refresh_targets, update_shared_category_target,
        },
        test_utils::{TEST_USER, get_test_connection, seed_category, seed_transaction},
    };

    fn shared(name: &str, label: &str, category_type: CategoryType, conn: &rusqlite::Connection) {
        create_category(
            NewCategory::new(TEST_USER, CategoryName::new_unchecked(name))
                .category_type(category_type)
                .shared_category(label),
            conn,
        )
        .unwrap();
    }

    #[test]
    fn refresh_runs_once_per_month() {
        let conn = get_test_connection();
        seed_category("Dining", Some(CategoryType::VariableExpense), 0.0, &conn);
        seed_transaction("Dining", -90.0, date!(2025 - 02 - 10), &conn);

        assert_eq!(should_refresh_targets(TEST_USER, date!(2025 - 03 - 02), &conn), Ok(true));
        let first =
            refresh_monthly_targets(TEST_USER, false, 3, date!(2025 - 03 - 02), &conn).unwrap();
        let second =
            refresh_monthly_targets(TEST_USER, false, 3, date!(2025 - 03 - 20), &conn).unwrap();

        assert!(first.updated);
        assert_eq!(first.updated_count, 1);
        assert_eq!(first.total_categories, 1);
        assert_eq!(
            first.results,
            vec![CategoryTargetResult::Updated {
                category: "Dining".to_owned(),
                old_target: None,
                new_target: 90.0,
            }]
        );
        assert!(!second.updated);
        assert!(second.results.is_empty());
        assert_eq!(should_refresh_targets(TEST_USER, date!(2025 - 03 - 31), &conn), Ok(false));
        assert_eq!(should_refresh_targets(TEST_USER, date!(2025 - 04 - 01), &conn), Ok(true));
        assert_eq!(
            get_category(TEST_USER, "Dining", &conn).unwrap().monthly_target,
            Some(90.0)
        );
    }

    #[test]
    fn forced_refresh_runs_again() {
        let conn = get_test_connection();
        seed_category("Dining", Some(CategoryType::VariableExpense), 0.0, &conn);
        refresh_monthly_targets(TEST_USER, false, 3, date!(2025 - 03 - 02), &conn).unwrap();
        seed_transaction("Dining", -30.0, date!(2025 - 02 - 10), &conn);

        let report =
            refresh_monthly_targets(TEST_USER, true, 3, date!(2025 - 03 - 05), &conn).unwrap();

        assert!(report.updated);
        assert_eq!(
            report.results,
            vec![CategoryTargetResult::Updated {
                category: "Dining".to_owned(),
                old_target: Some(0.0),
                new_target: 30.0,
            }]
        );
    }

    #[test]
    fn refresh_stores_zero_without_history() {
        let conn = get_test_connection();
        seed_category("Gifts", None, 0.0, &conn);

        refresh_monthly_targets(TEST_USER, false, 3, date!(2025 - 03 - 02), &conn).unwrap();

        assert_eq!(
            get_category(TEST_USER, "Gifts", &conn).unwrap().monthly_target,
            Some(0.0)
        );
    }

    #[test]
    fn refresh_also_updates_shared_targets() {
        let conn = get_test_connection();
        shared("Supermarket", "Food", CategoryType::VariableExpense, &conn);
        shared("Restaurants", "Food", CategoryType::VariableExpense, &conn);
        seed_transaction("Supermarket", -600.0, date!(2025 - 02 - 10), &conn);
        seed_transaction("Restaurants", -150.0, date!(2025 - 01 - 10), &conn);
        seed_transaction("Restaurants", -250.0, date!(2025 - 02 - 10), &conn);

        let report =
            refresh_monthly_targets(TEST_USER, false, 3, date!(2025 - 03 - 02), &conn).unwrap();

        assert_eq!(report.shared_category_results.len(), 1);
        let food = &report.shared_category_results[0];
        assert_eq!(food.shared_category, "Food");
        assert_eq!(food.action, SharedTargetAction::Created { new_target: 800.0 });
        assert_eq!(
            get_shared_category_target(TEST_USER, "Food", &conn)
                .unwrap()
                .map(|target| target.monthly_target),
            Some(800.0)
        );
    }

    #[test]
    fn shared_target_ignores_members_that_opt_out() {
        let conn = get_test_connection();
        shared("Supermarket", "Food", CategoryType::VariableExpense, &conn);
        shared("Restaurants", "Food", CategoryType::VariableExpense, &conn);
        set_use_shared_target(TEST_USER, "Restaurants", false, &conn).unwrap();
        update_shared_category_target(TEST_USER, "Food", 50.0, true, &conn).unwrap();
        seed_transaction("Supermarket", -600.0, date!(2025 - 02 - 10), &conn);
        seed_transaction("Restaurants", -250.0, date!(2025 - 02 - 10), &conn);

        let results =
            calculate_and_update_shared_category_targets(TEST_USER, 3, date!(2025 - 03 - 02), &conn)
                .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].categories, vec!["Supermarket".to_owned()]);
        assert_eq!(
            results[0].action,
            SharedTargetAction::Updated {
                old_target: 50.0,
                new_target: 600.0,
            }
        );
    }

    #[test]
    fn income_group_uses_last_month_for_fixed_income() {
        let conn = get_test_connection();
        shared("Salary", "הכנסות", CategoryType::Income, &conn);
        shared("Freelance", "הכנסות", CategoryType::Income, &conn);
        seed_transaction("Salary", 10000.0, date!(2025 - 02 - 28), &conn);
        seed_transaction("Salary", 8000.0, date!(2025 - 01 - 28), &conn);
        seed_transaction("Freelance", 1000.0, date!(2025 - 02 - 10), &conn);
        seed_transaction("Freelance", 3000.0, date!(2025 - 01 - 10), &conn);

        let results =
            calculate_and_update_shared_category_targets(TEST_USER, 3, date!(2025 - 03 - 02), &conn)
                .unwrap();

        assert_eq!(
            results[0].action,
            SharedTargetAction::Created {
                new_target: 12000.0
            }
        );
    }
}
