//! Database operations for category targets, shared category targets and the
//! refresh watermark.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    category::{CATEGORY_COLUMNS, Category, map_category_row},
    database_id::UserId,
};

/// The monthly target of a shared category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedCategoryTarget {
    /// The user that owns the shared category.
    pub user_id: UserId,
    /// The shared category label.
    pub shared_category_name: String,
    /// The suggested amount for one month.
    pub monthly_target: f64,
    /// Whether the dashboard shows a weekly breakdown of the shared category.
    pub weekly_display: bool,
    /// When the target was first stored.
    pub created_at: OffsetDateTime,
    /// When the target was last changed.
    pub updated_at: OffsetDateTime,
}

const SHARED_TARGET_COLUMNS: &str =
    "user_id, shared_category_name, monthly_target, weekly_display, created_at, updated_at";

/// Set the monthly target of a category.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if the user has no category called `category_name`.
pub fn update_category_monthly_target(
    user_id: UserId,
    category_name: &str,
    monthly_target: f64,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(&format!(
            "UPDATE category SET monthly_target = ?1 WHERE user_id = ?2 AND name = ?3
             RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row((monthly_target, user_id, category_name), map_category_row)
        .optional()?
        .ok_or_else(|| Error::CategoryNotFound(category_name.to_owned()))
}

/// Choose whether the target of a category's shared category replaces its own.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if the user has no category called `category_name`.
pub fn set_use_shared_target(
    user_id: UserId,
    category_name: &str,
    use_shared_target: bool,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(&format!(
            "UPDATE category SET use_shared_target = ?1 WHERE user_id = ?2 AND name = ?3
             RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row((use_shared_target, user_id, category_name), map_category_row)
        .optional()?
        .ok_or_else(|| Error::CategoryNotFound(category_name.to_owned()))
}

/// Get the target of a shared category, if one has been set.
pub fn get_shared_category_target(
    user_id: UserId,
    shared_category_name: &str,
    connection: &Connection,
) -> Result<Option<SharedCategoryTarget>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SHARED_TARGET_COLUMNS} FROM shared_category_target
             WHERE user_id = ?1 AND shared_category_name = ?2"
        ))?
        .query_row((user_id, shared_category_name), map_shared_target_row)
        .optional()
        .map_err(|error| error.into())
}

/// Get all of the user's shared category targets.
pub fn get_shared_category_targets(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<SharedCategoryTarget>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SHARED_TARGET_COLUMNS} FROM shared_category_target
             WHERE user_id = ?1 ORDER BY shared_category_name"
        ))?
        .query_map([user_id], map_shared_target_row)?
        .map(|maybe_target| maybe_target.map_err(|error| error.into()))
        .collect()
}

/// Create or replace the target of a shared category.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if none of the user's categories are
/// grouped under `shared_category_name`.
pub fn update_shared_category_target(
    user_id: UserId,
    shared_category_name: &str,
    monthly_target: f64,
    weekly_display: bool,
    connection: &Connection,
) -> Result<SharedCategoryTarget, Error> {
    let member_count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM category WHERE user_id = ?1 AND shared_category = ?2",
        (user_id, shared_category_name),
        |row| row.get(0),
    )?;

    if member_count == 0 {
        return Err(Error::CategoryNotFound(shared_category_name.to_owned()));
    }

    let target = connection
        .prepare(&format!(
            "INSERT INTO shared_category_target
                (user_id, shared_category_name, monthly_target, weekly_display,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(user_id, shared_category_name) DO UPDATE SET
                monthly_target = excluded.monthly_target,
                weekly_display = excluded.weekly_display,
                updated_at = excluded.updated_at
             RETURNING {SHARED_TARGET_COLUMNS}"
        ))?
        .query_row(
            (
                user_id,
                shared_category_name,
                monthly_target,
                weekly_display,
                OffsetDateTime::now_utc(),
            ),
            map_shared_target_row,
        )?;

    Ok(target)
}

/// Store a recalculated shared category target, keeping its weekly display
/// setting if it already exists.
pub(crate) fn store_shared_target_amount(
    user_id: UserId,
    shared_category_name: &str,
    monthly_target: f64,
    connection: &Connection,
) -> Result<SharedCategoryTarget, Error> {
    let target = connection
        .prepare(&format!(
            "INSERT INTO shared_category_target
                (user_id, shared_category_name, monthly_target, weekly_display,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)
             ON CONFLICT(user_id, shared_category_name) DO UPDATE SET
                monthly_target = excluded.monthly_target,
                updated_at = excluded.updated_at
             RETURNING {SHARED_TARGET_COLUMNS}"
        ))?
        .query_row(
            (
                user_id,
                shared_category_name,
                monthly_target,
                OffsetDateTime::now_utc(),
            ),
            map_shared_target_row,
        )?;

    Ok(target)
}

/// Get the first day of the month the user's targets were last refreshed for.
pub(crate) fn get_last_refresh(
    user_id: UserId,
    connection: &Connection,
) -> Result<Option<Date>, Error> {
    connection
        .query_row(
            "SELECT last_refreshed FROM target_refresh WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|error| error.into())
}

/// Move the user's refresh watermark to `month_start`.
///
/// Unless `force` is set, the watermark only moves forward. Returns whether
/// the watermark was moved, i.e. whether the caller won the refresh for the
/// month.
pub(crate) fn claim_refresh(
    user_id: UserId,
    month_start: Date,
    force: bool,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "INSERT INTO target_refresh (user_id, last_refreshed) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET last_refreshed = excluded.last_refreshed
         WHERE ?3 OR target_refresh.last_refreshed < excluded.last_refreshed",
        (user_id, month_start, force),
    )?;

    Ok(rows_affected > 0)
}

/// Initialize the shared category target table.
pub fn create_shared_category_target_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS shared_category_target (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            shared_category_name TEXT NOT NULL,
            monthly_target REAL NOT NULL DEFAULT 0,
            weekly_display INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, shared_category_name)
        )",
        (),
    )?;

    Ok(())
}

/// Initialize the table that records when each user's targets were last refreshed.
pub fn create_target_refresh_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS target_refresh (
            user_id INTEGER PRIMARY KEY,
            last_refreshed TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

fn map_shared_target_row(row: &Row) -> Result<SharedCategoryTarget, rusqlite::Error> {
    Ok(SharedCategoryTarget {
        user_id: row.get(0)?,
        shared_category_name: row.get(1)?,
        monthly_target: row.get(2)?,
        weekly_display: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod target_query_tests {
    use time::macros::date;

    use crate::{
        Error,
        category::{CategoryName, NewCategory, create_category},
        target::{
            db::{claim_refresh, get_last_refresh, store_shared_target_amount},
            get_shared_category_target, get_shared_category_targets, set_use_shared_target,
            update_category_monthly_target, update_shared_category_target,
        },
        test_utils::{TEST_USER, get_test_connection, seed_category},
    };

    #[test]
    fn update_monthly_target_sets_target() {
        let conn = get_test_connection();
        seed_category("Groceries", None, 0.0, &conn);

        let category =
            update_category_monthly_target(TEST_USER, "Groceries", 420.5, &conn).unwrap();

        assert_eq!(category.monthly_target, Some(420.5));
    }

    #[test]
    fn update_monthly_target_fails_for_missing_category() {
        let conn = get_test_connection();

        let result = update_category_monthly_target(TEST_USER, "Nope", 1.0, &conn);

        assert_eq!(result, Err(Error::CategoryNotFound("Nope".to_owned())));
    }

    #[test]
    fn update_monthly_target_is_scoped_to_user() {
        let conn = get_test_connection();
        seed_category("Groceries", None, 0.0, &conn);

        let result = update_category_monthly_target(TEST_USER + 1, "Groceries", 1.0, &conn);

        assert_eq!(result, Err(Error::CategoryNotFound("Groceries".to_owned())));
    }

    #[test]
    fn set_use_shared_target_toggles_flag() {
        let conn = get_test_connection();
        let category = seed_category("Fuel", None, 0.0, &conn);
        assert!(category.use_shared_target);

        let category = set_use_shared_target(TEST_USER, "Fuel", false, &conn).unwrap();

        assert!(!category.use_shared_target);
        assert_eq!(
            set_use_shared_target(TEST_USER, "Missing", true, &conn),
            Err(Error::CategoryNotFound("Missing".to_owned()))
        );
    }

    #[test]
    fn shared_target_upsert_replaces_existing_row() {
        let conn = get_test_connection();
        create_category(
            NewCategory::new(TEST_USER, CategoryName::new_unchecked("Supermarket"))
                .shared_category("Food"),
            &conn,
        )
        .unwrap();

        let first = update_shared_category_target(TEST_USER, "Food", 1000.0, false, &conn).unwrap();
        let second = update_shared_category_target(TEST_USER, "Food", 1200.0, true, &conn).unwrap();

        assert_eq!(first.monthly_target, 1000.0);
        assert_eq!(second.monthly_target, 1200.0);
        assert!(second.weekly_display);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(get_shared_category_targets(TEST_USER, &conn).unwrap().len(), 1);
        assert_eq!(
            get_shared_category_target(TEST_USER, "Food", &conn).unwrap(),
            Some(second)
        );
    }

    #[test]
    fn shared_target_needs_a_member_category() {
        let conn = get_test_connection();

        let result = update_shared_category_target(TEST_USER, "Food", 1000.0, false, &conn);

        assert_eq!(result, Err(Error::CategoryNotFound("Food".to_owned())));
        assert_eq!(get_shared_category_target(TEST_USER, "Food", &conn), Ok(None));
    }

    #[test]
    fn recalculated_amount_keeps_weekly_display() {
        let conn = get_test_connection();
        create_category(
            NewCategory::new(TEST_USER, CategoryName::new_unchecked("Supermarket"))
                .shared_category("Food"),
            &conn,
        )
        .unwrap();
        update_shared_category_target(TEST_USER, "Food", 1000.0, true, &conn).unwrap();

        let target = store_shared_target_amount(TEST_USER, "Food", 750.0, &conn).unwrap();

        assert_eq!(target.monthly_target, 750.0);
        assert!(target.weekly_display);
    }

    #[test]
    fn watermark_only_moves_forward_unless_forced() {
        let conn = get_test_connection();

        assert_eq!(get_last_refresh(TEST_USER, &conn), Ok(None));
        assert_eq!(claim_refresh(TEST_USER, date!(2025 - 03 - 01), false, &conn), Ok(true));
        assert_eq!(claim_refresh(TEST_USER, date!(2025 - 03 - 01), false, &conn), Ok(false));
        assert_eq!(claim_refresh(TEST_USER, date!(2025 - 02 - 01), false, &conn), Ok(false));
        assert_eq!(claim_refresh(TEST_USER, date!(2025 - 03 - 01), true, &conn), Ok(true));
        assert_eq!(claim_refresh(TEST_USER, date!(2025 - 04 - 01), false, &conn), Ok(true));
        assert_eq!(get_last_refresh(TEST_USER, &conn), Ok(Some(date!(2025 - 04 - 01))));
    }
}
