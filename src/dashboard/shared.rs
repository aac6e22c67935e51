//! Merges categories that share a label into one dashboard entry.

use std::collections::HashMap;

use crate::{
    category::Category,
    dashboard::{CategoryAggregate, CategoryMap},
    target::SharedCategoryTarget,
};

/// The stored settings the dashboard needs on top of the transactions.
#[derive(Debug, Clone, Copy)]
pub struct CategorySettings<'a> {
    /// The user's categories.
    pub categories: &'a [Category],
    /// Budget overrides for the period, keyed by category name.
    pub monthly_budgets: &'a HashMap<String, f64>,
    /// The user's shared category targets.
    pub shared_targets: &'a [SharedCategoryTarget],
}

/// Attach budgets and targets to `categories` and merge the categories that
/// share a label into one composite entry per label.
///
/// The members of a composite are kept in its `sub_categories`. Its `spent`
/// and `budget` are the sums of its members', it is non-cashflow if any member
/// is, and it takes the lowest display order of its members. The result is
/// sorted by display order, with unordered entries last.
pub fn group_shared_categories(categories: CategoryMap, settings: CategorySettings) -> CategoryMap {
    let by_name: HashMap<&str, &Category> = settings
        .categories
        .iter()
        .map(|category| (category.name.as_ref(), category))
        .collect();
    let targets: HashMap<&str, &SharedCategoryTarget> = settings
        .shared_targets
        .iter()
        .map(|target| (target.shared_category_name.as_str(), target))
        .collect();

    let mut composites = CategoryMap::default();
    let mut standalone = CategoryMap::default();

    for (name, mut aggregate) in categories {
        let category = by_name.get(name.as_str()).copied();

        if let Some(category) = category {
            aggregate.budget = category.budget;
            aggregate.category_type = category.category_type;
            aggregate.weekly_display = category.weekly_display;
            aggregate.monthly_target = category.monthly_target;
            aggregate.use_shared_target = category.use_shared_target;
            aggregate.display_order = category.display_order.or(aggregate.display_order);
            if let Some(color) = &category.color {
                aggregate.color = color.clone();
            }
        }
        if let Some(budget) = settings.monthly_budgets.get(&name) {
            aggregate.budget = *budget;
        }
        aggregate.recalculate();

        let Some(label) = category.and_then(|category| category.shared_category.clone()) else {
            standalone.insert(name, aggregate);
            continue;
        };

        aggregate.shared_category = Some(label.clone());
        if let Some(target) = targets.get(label.as_str()).filter(|_| aggregate.use_shared_target) {
            aggregate.monthly_target = Some(target.monthly_target);
        }

        if !composites.contains_key(&label) {
            composites.insert(label.clone(), CategoryAggregate::composite(&label));
        }
        if let Some(composite) = composites.get_mut(&label) {
            absorb(composite, name, aggregate);
        }
    }

    let mut merged = composites;
    for (name, aggregate) in standalone {
        match merged.get_mut(&name) {
            // A standalone category named like a shared label joins it.
            Some(composite) => absorb(composite, name, aggregate),
            None => merged.insert(name, aggregate),
        }
    }

    for entry in merged.values_mut().filter(|entry| entry.is_shared_category) {
        finish_composite(entry, targets.get(entry.name.as_str()).copied());
    }

    merged.sort_by_key(|_, aggregate| aggregate.sort_position());
    merged
}

fn absorb(composite: &mut CategoryAggregate, name: String, member: CategoryAggregate) {
    composite.spent += member.spent;
    composite.budget += member.budget;
    composite.is_non_cashflow |= member.is_non_cashflow;
    composite.weekly_display |= member.weekly_display;
    composite.transactions.extend(member.transactions.iter().cloned());
    composite.display_order = match (composite.display_order, member.display_order) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    if let Some(sub_categories) = composite.sub_categories.as_mut() {
        sub_categories.insert(name, member);
    }
}

fn finish_composite(composite: &mut CategoryAggregate, target: Option<&SharedCategoryTarget>) {
    composite
        .transactions
        .sort_by_key(|transaction| transaction.payment_date);
    composite.recalculate();

    let Some(members) = composite.sub_categories.as_ref() else {
        return;
    };

    let mut types = members.values().map(|member| member.category_type);
    let first_type = types.next().flatten();
    composite.category_type = if types.all(|category_type| category_type == first_type) {
        first_type
    } else {
        None
    };

    composite.use_shared_target = members.values().any(|member| member.use_shared_target);

    let member_targets: Vec<f64> = members
        .values()
        .filter_map(|member| member.monthly_target)
        .collect();

    composite.monthly_target = match target {
        Some(target) if composite.use_shared_target => {
            composite.weekly_display = target.weekly_display;
            Some(target.monthly_target)
        }
        _ if member_targets.is_empty() => None,
        _ => Some(member_targets.iter().sum()),
    };
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use time::OffsetDateTime;

    use crate::{
        category::{Category, CategoryName, CategoryType},
        dashboard::{
            CategoryAggregate, CategoryMap,
            shared::{CategorySettings, group_shared_categories},
        },
        target::SharedCategoryTarget,
    };

    fn category(name: &str, shared: Option<&str>, budget: f64, order: Option<i64>) -> Category {
        Category {
            id: 0,
            user_id: 1,
            name: CategoryName::new_unchecked(name),
            category_type: Some(CategoryType::VariableExpense),
            color: None,
            budget,
            monthly_target: None,
            shared_category: shared.map(str::to_owned),
            use_shared_target: true,
            weekly_display: false,
            display_order: order,
        }
    }

    fn spent(entries: &[(&str, f64)]) -> CategoryMap {
        entries
            .iter()
            .map(|(name, spent)| {
                let mut aggregate = CategoryAggregate::new(name, false);
                aggregate.spent = *spent;
                (name.to_string(), aggregate)
            })
            .collect()
    }

    fn group(categories: CategoryMap, settings: &[Category]) -> CategoryMap {
        group_shared_categories(
            categories,
            CategorySettings {
                categories: settings,
                monthly_budgets: &HashMap::new(),
                shared_targets: &[],
            },
        )
    }

    #[test]
    fn members_are_summed_into_composite() {
        let settings = [
            category("Supermarket", Some("Food"), 1500.0, Some(2)),
            category("Restaurants", Some("Food"), 500.0, Some(1)),
            category("Rent", None, 4000.0, Some(0)),
        ];

        let got = group(
            spent(&[("Supermarket", -1200.5), ("Restaurants", -310.0), ("Rent", -4000.0)]),
            &settings,
        );

        let food = got.get("Food").unwrap();
        assert!(food.is_shared_category);
        assert_eq!(food.spent, -1510.5);
        assert_eq!(food.budget, 2000.0);
        assert_eq!(food.remaining, 489.5);
        assert_eq!(food.display_order, Some(1));
        assert_eq!(food.category_type, Some(CategoryType::VariableExpense));
        let subs = food.sub_categories.as_ref().unwrap();
        assert_eq!(subs.len(), 2);
        let sub_total: f64 = subs.values().map(|sub| sub.spent).sum();
        assert_eq!(sub_total, food.spent);
        assert_eq!(got.names().collect::<Vec<_>>(), vec!["Rent", "Food"]);
    }

    #[test]
    fn composite_is_non_cashflow_if_any_member_is() {
        let settings = [
            category("Cash", Some("Wallet"), 0.0, None),
            category("Credit לא תזרימיות", Some("Wallet"), 0.0, None),
        ];
        let mut categories = spent(&[("Cash", -10.0)]);
        let mut non_cashflow = CategoryAggregate::new("Credit לא תזרימיות", true);
        non_cashflow.spent = -5.0;
        categories.insert("Credit לא תזרימיות".to_owned(), non_cashflow);

        let got = group(categories, &settings);

        assert!(got.get("Wallet").unwrap().is_non_cashflow);
    }

    #[test]
    fn unordered_entries_sort_last_in_original_order() {
        let settings = [category("Fuel", None, 0.0, Some(5))];

        let got = group(spent(&[("Gifts", -1.0), ("Fuel", -1.0), ("Books", -1.0)]), &settings);

        assert_eq!(got.names().collect::<Vec<_>>(), vec!["Fuel", "Gifts", "Books"]);
    }

    #[test]
    fn monthly_budget_override_replaces_default_budget() {
        let settings = [category("Groceries", None, 200.0, None)];
        let budgets = HashMap::from([("Groceries".to_owned(), 350.0)]);

        let got = group_shared_categories(
            spent(&[("Groceries", -100.0)]),
            CategorySettings {
                categories: &settings,
                monthly_budgets: &budgets,
                shared_targets: &[],
            },
        );

        let groceries = got.get("Groceries").unwrap();
        assert_eq!(groceries.budget, 350.0);
        assert_eq!(groceries.remaining, 250.0);
    }

    #[test]
    fn shared_target_replaces_member_targets() {
        let mut supermarket = category("Supermarket", Some("Food"), 0.0, None);
        supermarket.monthly_target = Some(900.0);
        let mut restaurants = category("Restaurants", Some("Food"), 0.0, None);
        restaurants.monthly_target = Some(300.0);
        restaurants.use_shared_target = false;
        let targets = [SharedCategoryTarget {
            user_id: 1,
            shared_category_name: "Food".to_owned(),
            monthly_target: 1100.0,
            weekly_display: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }];

        let got = group_shared_categories(
            spent(&[("Supermarket", -10.0), ("Restaurants", -10.0)]),
            CategorySettings {
                categories: &[supermarket, restaurants],
                monthly_budgets: &HashMap::new(),
                shared_targets: &targets,
            },
        );

        let food = got.get("Food").unwrap();
        let subs = food.sub_categories.as_ref().unwrap();
        assert_eq!(food.monthly_target, Some(1100.0));
        assert!(food.weekly_display);
        assert_eq!(subs.get("Supermarket").unwrap().monthly_target, Some(1100.0));
        assert_eq!(subs.get("Restaurants").unwrap().monthly_target, Some(300.0));
    }

    #[test]
    fn composite_without_shared_target_sums_member_targets() {
        let mut a = category("A", Some("Group"), 0.0, None);
        a.monthly_target = Some(100.0);
        let mut b = category("B", Some("Group"), 0.0, None);
        b.monthly_target = Some(50.0);

        let got = group(spent(&[("A", -1.0), ("B", -1.0)]), &[a, b]);

        assert_eq!(got.get("Group").unwrap().monthly_target, Some(150.0));
    }
}
