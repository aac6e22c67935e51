//! Core category domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{DatabaseId, UserId},
};

/// The category name used for transactions without a category.
pub const UNCATEGORIZED_LABEL: &str = "uncategorized";

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type tag stored on a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    /// Money coming in, e.g. salary.
    Income,
    /// Recurring expenses with a known amount, e.g. rent.
    FixedExpense,
    /// Expenses that vary month to month, e.g. groceries.
    VariableExpense,
    /// Money set aside, e.g. deposits into a savings account.
    Savings,
}

impl CategoryType {
    /// The value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::FixedExpense => "fixed_expense",
            Self::VariableExpense => "variable_expense",
            Self::Savings => "savings",
        }
    }

    /// Parse a stored type tag, returning `None` for unknown tags.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "income" => Some(Self::Income),
            "fixed_expense" | "fixed-expense" | "fixed_expenses" => Some(Self::FixedExpense),
            "variable_expense" | "variable-expense" | "variable_expenses" => {
                Some(Self::VariableExpense)
            }
            "savings" => Some(Self::Savings),
            _ => None,
        }
    }
}

/// A category that transactions are assigned to (e.g., 'Groceries', 'Salary').
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: DatabaseId,
    /// The user that owns the category.
    pub user_id: UserId,
    /// The name of the category, unique per user.
    pub name: CategoryName,
    /// The stored type tag, if any.
    pub category_type: Option<CategoryType>,
    /// The display color, e.g. "#4CAF50".
    pub color: Option<String>,
    /// The default budget for one month.
    pub budget: f64,
    /// The suggested spend or income for one month.
    pub monthly_target: Option<f64>,
    /// The label of the shared category this category is grouped under.
    pub shared_category: Option<String>,
    /// Whether the shared category's target replaces this category's target.
    pub use_shared_target: bool,
    /// Whether the dashboard shows a weekly breakdown for this category.
    pub weekly_display: bool,
    /// The position of the category on the dashboard, lowest first.
    pub display_order: Option<i64>,
}

/// The fields needed to create a [Category].
///
/// Use [NewCategory::new] and the builder methods to set optional fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    /// The user that owns the category.
    pub user_id: UserId,
    /// The name of the category.
    pub name: CategoryName,
    /// The stored type tag.
    pub category_type: Option<CategoryType>,
    /// The display color.
    pub color: Option<String>,
    /// The default budget for one month.
    pub budget: f64,
    /// The label of the shared category this category is grouped under.
    pub shared_category: Option<String>,
    /// The position of the category on the dashboard.
    pub display_order: Option<i64>,
}

impl NewCategory {
    /// Start building a category called `name` for `user_id`.
    pub fn new(user_id: UserId, name: CategoryName) -> Self {
        Self {
            user_id,
            name,
            category_type: None,
            color: None,
            budget: 0.0,
            shared_category: None,
            display_order: None,
        }
    }

    /// Set the type tag.
    pub fn category_type(mut self, category_type: CategoryType) -> Self {
        self.category_type = Some(category_type);
        self
    }

    /// Set the display color.
    pub fn color(mut self, color: &str) -> Self {
        self.color = Some(color.to_owned());
        self
    }

    /// Set the default monthly budget.
    pub fn budget(mut self, budget: f64) -> Self {
        self.budget = budget;
        self
    }

    /// Group the category under the shared category `label`.
    pub fn shared_category(mut self, label: &str) -> Self {
        self.shared_category = Some(label.to_owned());
        self
    }

    /// Set the dashboard position.
    pub fn display_order(mut self, display_order: i64) -> Self {
        self.display_order = Some(display_order);
        self
    }
}
