//! Categories that transactions are assigned to, and how they are classified.

mod classify;
mod db;
mod domain;

pub use classify::{
    CategoryKind, category_color, classify_category, is_fixed_income, is_non_cashflow_name,
};
pub(crate) use db::CATEGORY_COLUMNS;
pub use db::{
    create_category, create_category_table, create_monthly_budget_table, get_all_categories,
    get_category, get_monthly_budgets, map_category_row, save_category_order, set_monthly_budget,
    set_shared_category,
};
pub use domain::{Category, CategoryName, CategoryType, NewCategory, UNCATEGORIZED_LABEL};
