//! Monthly totals and averages of past spending and income.

use rusqlite::{Connection, OptionalExtension};
use time::Date;

use crate::{
    Error,
    category::{CategoryKind, CategoryType, classify_category, is_fixed_income},
    database_id::UserId,
    flow_month::FlowMonth,
    target::round_cents,
};

/// Which amounts count towards a monthly total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountSign {
    Positive,
    Negative,
    Any,
}

impl AmountSign {
    fn condition(self) -> &'static str {
        match self {
            AmountSign::Positive => "amount > 0",
            AmountSign::Negative => "amount < 0",
            AmountSign::Any => "1",
        }
    }
}

/// The sum of the absolute amounts of the transactions in `category_names`
/// paid in `month`.
fn monthly_total(
    user_id: UserId,
    category_names: &[String],
    month: FlowMonth,
    sign: AmountSign,
    connection: &Connection,
) -> Result<f64, Error> {
    if category_names.is_empty() {
        return Ok(0.0);
    }

    let placeholders = (0..category_names.len())
        .map(|i| format!("?{}", i + 4))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "SELECT COALESCE(SUM(ABS(amount)), 0) FROM \"transaction\"
         WHERE user_id = ?1 AND payment_year = ?2 AND payment_month = ?3
         AND {} AND category_name IN ({placeholders})",
        sign.condition()
    );

    let year = month.year();
    let month_number = month.month();
    let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(3 + category_names.len());
    params.push(&user_id);
    params.push(&year);
    params.push(&month_number);
    params.extend(category_names.iter().map(|name| name as &dyn rusqlite::ToSql));

    connection
        .query_row(&query, params.as_slice(), |row| row.get(0))
        .map_err(|error| error.into())
}

fn stored_category_type(
    user_id: UserId,
    category_name: &str,
    connection: &Connection,
) -> Result<Option<CategoryType>, Error> {
    let raw_type: Option<Option<String>> = connection
        .query_row(
            "SELECT category_type FROM category WHERE user_id = ?1 AND name = ?2",
            (user_id, category_name),
            |row| row.get(0),
        )
        .optional()?;

    Ok(raw_type.flatten().as_deref().and_then(CategoryType::parse))
}

/// Calculate the average monthly amount of a category over the `months`
/// calendar months before the month of `today`.
///
/// Income categories average their incoming amounts and other categories their
/// outgoing amounts, both as positive numbers. Months without any such
/// transactions are left out of the average rather than counted as zero.
/// Fixed income, such as a salary, always uses the last month only.
///
/// Returns zero if there is no history, rounded to cents otherwise.
pub fn calculate_monthly_average(
    user_id: UserId,
    category_name: &str,
    months: u32,
    today: Date,
    connection: &Connection,
) -> Result<f64, Error> {
    let stored_type = stored_category_type(user_id, category_name, connection)?;
    let is_income = classify_category(category_name, stored_type) == CategoryKind::Income;
    let months = if is_fixed_income(category_name, stored_type) {
        1
    } else {
        months
    };
    let sign = if is_income {
        AmountSign::Positive
    } else {
        AmountSign::Negative
    };
    let names = [category_name.to_owned()];

    let mut totals = Vec::new();
    for month in FlowMonth::from_date(today)?.trailing(months) {
        let total = monthly_total(user_id, &names, month, sign, connection)?;
        if total > 0.0 {
            totals.push(total);
        }
    }

    if totals.is_empty() {
        tracing::debug!("No history for {category_name}, average is zero");
        return Ok(0.0);
    }

    let average = totals.iter().sum::<f64>() / totals.len() as f64;
    tracing::debug!(
        "{months}-month average for {category_name}: {average} over {} months",
        totals.len()
    );

    Ok(round_cents(average))
}

/// The total outgoing amount of a category in one calendar month, as a positive number.
pub fn get_category_monthly_spending(
    user_id: UserId,
    category_name: &str,
    month: FlowMonth,
    connection: &Connection,
) -> Result<f64, Error> {
    let total = monthly_total(
        user_id,
        &[category_name.to_owned()],
        month,
        AmountSign::Negative,
        connection,
    )?;

    Ok(round_cents(total))
}

/// The total absolute amount of all categories grouped under a shared
/// category in one calendar month.
///
/// Returns zero if no category is grouped under `shared_category_name`.
pub fn get_shared_category_monthly_spending(
    user_id: UserId,
    shared_category_name: &str,
    month: FlowMonth,
    connection: &Connection,
) -> Result<f64, Error> {
    let members = connection
        .prepare("SELECT name FROM category WHERE user_id = ?1 AND shared_category = ?2")?
        .query_map((user_id, shared_category_name), |row| row.get(0))?
        .collect::<Result<Vec<String>, rusqlite::Error>>()?;

    let total = monthly_total(user_id, &members, month, AmountSign::Any, connection)?;

    Ok(round_cents(total))
}
