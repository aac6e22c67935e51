//! Database operations for categories and their monthly budgets.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Error,
    category::{Category, CategoryName, CategoryType, NewCategory},
    database_id::UserId,
    flow_month::FlowMonth,
};

pub(crate) const CATEGORY_COLUMNS: &str = "id, user_id, name, category_type, color, budget, \
    monthly_target, shared_category, use_shared_target, weekly_display, display_order";

/// Create a category and return it with its generated ID.
///
/// # Errors
/// Returns an [Error::StoreUnavailable] if the name is already taken by the
/// user or there is some other SQL error.
pub fn create_category(
    new_category: NewCategory,
    connection: &Connection,
) -> Result<Category, Error> {
    let category = connection
        .prepare(&format!(
            "INSERT INTO category
             (user_id, name, category_type, color, budget, shared_category, display_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row(
            (
                new_category.user_id,
                new_category.name.as_ref(),
                new_category.category_type.map(|category_type| category_type.as_str()),
                new_category.color,
                new_category.budget,
                new_category.shared_category,
                new_category.display_order,
            ),
            map_category_row,
        )?;

    Ok(category)
}

/// Retrieve a user's category by name.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if the user has no category called `name`.
pub fn get_category(
    user_id: UserId,
    name: &str,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE user_id = ?1 AND name = ?2"
        ))?
        .query_row((user_id, name), map_category_row)
        .optional()?
        .ok_or_else(|| Error::CategoryNotFound(name.to_owned()))
}

/// Retrieve all of a user's categories, in display order and then by name.
///
/// Categories without a display order come last.
pub fn get_all_categories(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE user_id = ?1
             ORDER BY display_order IS NULL, display_order ASC, name ASC"
        ))?
        .query_map([user_id], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Save the order that categories are displayed in on the dashboard.
///
/// The category at index `i` in `names` gets display order `i`. Categories not
/// in `names` lose their display order.
pub fn save_category_order(
    user_id: UserId,
    names: &[&str],
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "UPDATE category SET display_order = NULL WHERE user_id = ?1",
        [user_id],
    )?;

    {
        let mut statement = transaction
            .prepare("UPDATE category SET display_order = ?1 WHERE user_id = ?2 AND name = ?3")?;

        for (index, name) in names.iter().enumerate() {
            statement.execute((index as i64, user_id, name))?;
        }
    }

    transaction.commit()?;
    Ok(())
}

/// Group a category under the shared category `label`, or ungroup it with `None`.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if the user has no category called `name`.
pub fn set_shared_category(
    user_id: UserId,
    name: &str,
    label: Option<&str>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE category SET shared_category = ?1 WHERE user_id = ?2 AND name = ?3",
        (label, user_id, name),
    )?;

    if rows_affected == 0 {
        return Err(Error::CategoryNotFound(name.to_owned()));
    }

    Ok(())
}

/// Set the budget of a category for a single flow month, overriding its default budget.
pub fn set_monthly_budget(
    user_id: UserId,
    category_name: &str,
    flow_month: FlowMonth,
    amount: f64,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO monthly_budget (user_id, category_name, flow_month, amount)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id, category_name, flow_month) DO UPDATE SET amount = excluded.amount",
        (user_id, category_name, flow_month, amount),
    )?;

    Ok(())
}

/// Get the budget overrides for a flow month, keyed by category name.
pub fn get_monthly_budgets(
    user_id: UserId,
    flow_month: FlowMonth,
    connection: &Connection,
) -> Result<HashMap<String, f64>, Error> {
    connection
        .prepare(
            "SELECT category_name, amount FROM monthly_budget
             WHERE user_id = ?1 AND flow_month = ?2",
        )?
        .query_map((user_id, flow_month), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .map(|maybe_budget| maybe_budget.map_err(|error| error.into()))
        .collect()
}

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            category_type TEXT,
            color TEXT,
            budget REAL NOT NULL DEFAULT 0,
            monthly_target REAL,
            shared_category TEXT,
            use_shared_target INTEGER NOT NULL DEFAULT 1,
            weekly_display INTEGER NOT NULL DEFAULT 0,
            display_order INTEGER,
            UNIQUE(user_id, name)
        );

        CREATE INDEX IF NOT EXISTS idx_category_shared ON category(user_id, shared_category);",
    )?;

    Ok(())
}

/// Initialize the table of per-month budget overrides.
pub fn create_monthly_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS monthly_budget (
            user_id INTEGER NOT NULL,
            category_name TEXT NOT NULL,
            flow_month TEXT NOT NULL,
            amount REAL NOT NULL,
            PRIMARY KEY(user_id, category_name, flow_month)
        )",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Category.
pub fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(2)?;
    let raw_type: Option<String> = row.get(3)?;

    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: CategoryName::new_unchecked(&raw_name),
        category_type: raw_type.as_deref().and_then(CategoryType::parse),
        color: row.get(4)?,
        budget: row.get(5)?,
        monthly_target: row.get(6)?,
        shared_category: row.get(7)?,
        use_shared_target: row.get(8)?,
        weekly_display: row.get(9)?,
        display_order: row.get(10)?,
    })
}

#[cfg(test)]
mod category_query_tests {
    use crate::{
        Error,
        category::{
            CategoryName, CategoryType, NewCategory, create_category, get_all_categories,
            get_category, get_monthly_budgets, save_category_order, set_monthly_budget,
            set_shared_category,
        },
        flow_month::FlowMonth,
        test_utils::get_test_connection,
    };

    const USER: i64 = 1;

    fn new_category(name: &str) -> NewCategory {
        NewCategory::new(USER, CategoryName::new_unchecked(name))
    }

    #[test]
    fn create_category_succeeds() {
        let connection = get_test_connection();

        let category = create_category(
            new_category("Groceries")
                .category_type(CategoryType::VariableExpense)
                .budget(200.0),
            &connection,
        )
        .expect("Could not create category");

        assert!(category.id > 0);
        assert_eq!(category.name.as_ref(), "Groceries");
        assert_eq!(category.category_type, Some(CategoryType::VariableExpense));
        assert_eq!(category.budget, 200.0);
        assert!(category.use_shared_target);
        assert_eq!(category.monthly_target, None);
    }

    #[test]
    fn category_names_are_unique_per_user() {
        let connection = get_test_connection();
        create_category(new_category("Rent"), &connection).unwrap();

        let duplicate = create_category(new_category("Rent"), &connection);
        let other_user = create_category(
            NewCategory::new(USER + 1, CategoryName::new_unchecked("Rent")),
            &connection,
        );

        assert!(matches!(duplicate, Err(Error::StoreUnavailable(_))));
        assert!(other_user.is_ok());
    }

    #[test]
    fn get_missing_category_returns_category_not_found() {
        let connection = get_test_connection();

        let result = get_category(USER, "Nope", &connection);

        assert_eq!(result, Err(Error::CategoryNotFound("Nope".to_owned())));
    }

    #[test]
    fn save_category_order_replaces_order() {
        let connection = get_test_connection();
        for name in ["A", "B", "C"] {
            create_category(new_category(name).display_order(5), &connection).unwrap();
        }

        save_category_order(USER, &["C", "A"], &connection).unwrap();

        let categories = get_all_categories(USER, &connection).unwrap();
        let names: Vec<_> = categories.iter().map(|c| c.name.as_ref()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert_eq!(categories[0].display_order, Some(0));
        assert_eq!(categories[2].display_order, None);
    }

    #[test]
    fn set_shared_category_on_missing_category_fails() {
        let connection = get_test_connection();

        let result = set_shared_category(USER, "Ghost", Some("Home"), &connection);

        assert_eq!(result, Err(Error::CategoryNotFound("Ghost".to_owned())));
    }

    #[test]
    fn monthly_budget_overrides_are_upserted() {
        let connection = get_test_connection();
        let month = FlowMonth::new(2025, 3).unwrap();

        set_monthly_budget(USER, "Groceries", month, 150.0, &connection).unwrap();
        set_monthly_budget(USER, "Groceries", month, 180.0, &connection).unwrap();
        set_monthly_budget(USER, "Groceries", month.next(), 999.0, &connection).unwrap();

        let budgets = get_monthly_budgets(USER, month, &connection).unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets["Groceries"], 180.0);
    }
}
