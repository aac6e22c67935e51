//! Reduces the dashboard categories to the totals of the period.

use crate::{
    category::{CategoryKind, classify_category},
    dashboard::{CategoryMap, Summary},
};

/// Calculate the totals of the period from the dashboard categories.
///
/// Non-cashflow categories are skipped. For the planning totals, an income
/// budget is a floor (actual income above it still counts in full) while an
/// expense budget replaces actual spending. Savings count as expenses, and
/// `monthly_savings` is added to `total_expenses` as a virtual expense.
pub fn calculate_summary(categories: &CategoryMap, monthly_savings: f64) -> Summary {
    let mut summary = Summary {
        monthly_savings,
        ..Summary::default()
    };

    for category in categories.values() {
        let kind = classify_category(&category.name, category.category_type);

        if category.is_non_cashflow || kind == CategoryKind::NonCashflow {
            continue;
        }

        let spent = category.spent;
        let budget = category.budget;

        if spent > 0.0 || kind == CategoryKind::Income {
            summary.income += spent;
            summary.total_income += if budget > 0.0 { spent.max(budget) } else { spent };
            continue;
        }

        let actual = spent.abs();
        summary.expenses += actual;
        summary.total_expenses += if budget > 0.0 { budget } else { actual };

        if kind == CategoryKind::Savings {
            summary.savings += actual;
        }
    }

    summary.total_expenses += monthly_savings;
    summary.balance = summary.total_income - summary.total_expenses;

    summary
}
