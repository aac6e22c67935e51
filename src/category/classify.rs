//! Classifies categories from their stored type tag and name.
//!
//! Users name their categories freely, so the type tag is not always set. When
//! it is missing the classifier falls back to looking for well-known words in
//! the name. Markers are matched case-insensitively, in Hebrew and English.

use serde::Serialize;

use crate::category::CategoryType;

/// Names containing one of these are tracked but never counted in cash flow.
const NON_CASHFLOW_MARKERS: [&str; 3] = ["לא תזרימיות", "non-cashflow", "non cashflow"];

const INCOME_MARKERS: [&str; 5] = ["הכנסות", "משכורת", "income", "salary", "wage"];

const FIXED_INCOME_MARKERS: [&str; 5] = ["משכורת", "קבועה", "קבוע", "salary", "wage"];

const SAVINGS_MARKERS: [&str; 6] = [
    "חיסכון",
    "חסכון",
    "חסכונות",
    "השקעות",
    "savings",
    "investment",
];

const FIXED_EXPENSE_MARKERS: [&str; 3] = ["קבועות", "תשלומים", "fixed"];

const INCOME_COLOR: &str = "#4CAF50";
const FIXED_EXPENSE_COLOR: &str = "#9C27B0";
const SAVINGS_COLOR: &str = "#FFEB3B";
const DEFAULT_COLOR: &str = "#2196F3";

/// How a category takes part in the monthly summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
    /// Money set aside, which still leaves the cash flow.
    Savings,
    /// Tracked for display only.
    NonCashflow,
}

fn contains_any(name: &str, markers: &[&str]) -> bool {
    let name = name.to_lowercase();
    markers.iter().any(|marker| name.contains(marker))
}

/// Whether `name` marks a category as outside of the cash flow.
pub fn is_non_cashflow_name(name: &str) -> bool {
    contains_any(name, &NON_CASHFLOW_MARKERS)
}

/// Classify a category.
///
/// The non-cashflow marker in the name always wins. Otherwise the stored type
/// tag decides, and only untagged categories are classified by name.
pub fn classify_category(name: &str, stored_type: Option<CategoryType>) -> CategoryKind {
    if is_non_cashflow_name(name) {
        return CategoryKind::NonCashflow;
    }

    match stored_type {
        Some(CategoryType::Income) => CategoryKind::Income,
        Some(CategoryType::Savings) => CategoryKind::Savings,
        Some(CategoryType::FixedExpense | CategoryType::VariableExpense) => CategoryKind::Expense,
        None if contains_any(name, &INCOME_MARKERS) => CategoryKind::Income,
        None if contains_any(name, &SAVINGS_MARKERS) => CategoryKind::Savings,
        None => CategoryKind::Expense,
    }
}

/// Whether a category is regular income, such as a salary, where last month
/// predicts next month better than an average.
pub fn is_fixed_income(name: &str, stored_type: Option<CategoryType>) -> bool {
    classify_category(name, stored_type) == CategoryKind::Income
        && contains_any(name, &FIXED_INCOME_MARKERS)
}

/// Pick a display color for a category from its name.
pub fn category_color(name: &str) -> &'static str {
    if contains_any(name, &INCOME_MARKERS) {
        INCOME_COLOR
    } else if contains_any(name, &FIXED_EXPENSE_MARKERS) {
        FIXED_EXPENSE_COLOR
    } else if contains_any(name, &SAVINGS_MARKERS) {
        SAVINGS_COLOR
    } else {
        DEFAULT_COLOR
    }
}

#[cfg(test)]
mod tests {
    use crate::category::{
        CategoryKind, CategoryType, category_color, classify_category, is_fixed_income,
    };

    #[test]
    fn stored_type_takes_precedence_over_name() {
        assert_eq!(
            classify_category("Salary savings", Some(CategoryType::Income)),
            CategoryKind::Income
        );
        assert_eq!(
            classify_category("Income tax", Some(CategoryType::FixedExpense)),
            CategoryKind::Expense
        );
    }

    #[test]
    fn non_cashflow_marker_wins_over_stored_type() {
        assert_eq!(
            classify_category("הוצאות לא תזרימיות", Some(CategoryType::VariableExpense)),
            CategoryKind::NonCashflow
        );
        assert_eq!(
            classify_category("Non-Cashflow transfers", None),
            CategoryKind::NonCashflow
        );
    }

    #[test]
    fn untagged_categories_are_classified_by_name() {
        assert_eq!(classify_category("הכנסות", None), CategoryKind::Income);
        assert_eq!(classify_category("Monthly Salary", None), CategoryKind::Income);
        assert_eq!(classify_category("השקעות", None), CategoryKind::Savings);
        assert_eq!(classify_category("Investments", None), CategoryKind::Savings);
        assert_eq!(classify_category("Groceries", None), CategoryKind::Expense);
    }

    #[test]
    fn fixed_income_requires_income() {
        assert!(is_fixed_income("Salary", Some(CategoryType::Income)));
        assert!(is_fixed_income("משכורת", None));
        assert!(!is_fixed_income("Freelance", Some(CategoryType::Income)));
        assert!(!is_fixed_income("הוצאות קבועות", None));
    }

    #[test]
    fn color_follows_name() {
        assert_eq!(category_color("משכורת"), "#4CAF50");
        assert_eq!(category_color("הוצאות קבועות"), "#9C27B0");
        assert_eq!(category_color("חיסכון"), "#FFEB3B");
        assert_eq!(category_color("Groceries"), "#2196F3");
    }
}
