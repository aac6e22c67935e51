//! The `YYYY-MM` period a transaction is budgeted in.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::Error;

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// A budgeting month, e.g. `2025-03`.
///
/// The flow month of a transaction defaults to the month of its payment date,
/// but may be moved independently of it (e.g. a salary paid on the 28th that
/// funds the next month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FlowMonth {
    year: i32,
    month: Month,
}

impl FlowMonth {
    /// Create a flow month.
    ///
    /// # Errors
    /// Returns [Error::InvalidFlowMonth] if `year` is outside 1900-2100 or
    /// `month` is not between 1 and 12.
    pub fn new(year: i32, month: u8) -> Result<Self, Error> {
        let invalid = || Error::InvalidFlowMonth(format!("{year:04}-{month:02}"));

        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(invalid());
        }

        let month = Month::try_from(month).map_err(|_| invalid())?;

        Ok(Self { year, month })
    }

    /// The flow month that `date` falls in.
    ///
    /// # Errors
    /// Returns [Error::InvalidFlowMonth] if the year of `date` is outside
    /// 1900-2100, the same range that stored flow months are read back with.
    pub fn from_date(date: Date) -> Result<Self, Error> {
        Self::new(date.year(), date.month() as u8)
    }

    /// The calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The calendar month, 1-12.
    pub fn month(&self) -> u8 {
        self.month as u8
    }

    /// The first day of the month.
    pub fn first_day(&self) -> Date {
        // Day 1 exists in every month.
        Date::from_calendar_date(self.year, self.month, 1).unwrap_or(Date::MIN)
    }

    /// The last day of the month.
    pub fn last_day(&self) -> Date {
        self.next()
            .first_day()
            .previous_day()
            .unwrap_or_else(|| self.first_day())
    }

    /// The month before this one.
    pub fn previous(&self) -> Self {
        match self.month {
            Month::January => Self {
                year: self.year - 1,
                month: Month::December,
            },
            month => Self {
                year: self.year,
                month: month.previous(),
            },
        }
    }

    /// The month after this one.
    pub fn next(&self) -> Self {
        match self.month {
            Month::December => Self {
                year: self.year + 1,
                month: Month::January,
            },
            month => Self {
                year: self.year,
                month: month.next(),
            },
        }
    }

    /// The `count` months before this one, most recent first.
    ///
    /// The current month is never included.
    pub fn trailing(&self, count: u32) -> Vec<Self> {
        let mut months = Vec::with_capacity(count as usize);
        let mut month = *self;

        for _ in 0..count {
            month = month.previous();
            months.push(month);
        }

        months
    }

    /// Whether `date` falls inside this month.
    pub fn contains(&self, date: Date) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for FlowMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidFlowMonth(s.to_owned());

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;

        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;

        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for FlowMonth {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FlowMonth> for String {
    fn from(value: FlowMonth) -> Self {
        value.to_string()
    }
}

impl Display for FlowMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month as u8)
    }
}

impl ToSql for FlowMonth {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for FlowMonth {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

#[cfg(test)]
mod flow_month_tests {
    use time::macros::date;

    use crate::{Error, flow_month::FlowMonth};

    #[test]
    fn parses_year_and_month() {
        let month: FlowMonth = "2025-03".parse().unwrap();

        assert_eq!(month.year(), 2025);
        assert_eq!(month.month(), 3);
        assert_eq!(month.to_string(), "2025-03");
    }

    #[test]
    fn rejects_out_of_range_values() {
        for input in ["2025-13", "2025-00", "1899-05", "2101-01", "2025", "25-01", "abcd-ef"] {
            assert_eq!(
                input.parse::<FlowMonth>(),
                Err(Error::InvalidFlowMonth(input.to_owned())),
                "want {input} to be rejected"
            );
        }
    }

    #[test]
    fn from_date_uses_the_storable_range() {
        assert_eq!(
            FlowMonth::from_date(date!(2025 - 03 - 14)),
            Ok(FlowMonth::new(2025, 3).unwrap())
        );
        assert_eq!(
            FlowMonth::from_date(date!(2205 - 03 - 01)),
            Err(Error::InvalidFlowMonth("2205-03".to_owned()))
        );
    }

    #[test]
    fn previous_wraps_to_december() {
        let month = FlowMonth::new(2025, 1).unwrap();

        assert_eq!(month.previous(), FlowMonth::new(2024, 12).unwrap());
    }

    #[test]
    fn trailing_excludes_current_month() {
        let month = FlowMonth::new(2025, 2).unwrap();

        let got = month.trailing(3);

        assert_eq!(
            got,
            vec![
                FlowMonth::new(2025, 1).unwrap(),
                FlowMonth::new(2024, 12).unwrap(),
                FlowMonth::new(2024, 11).unwrap(),
            ]
        );
    }

    #[test]
    fn first_and_last_day() {
        let month = FlowMonth::new(2024, 2).unwrap();

        assert_eq!(month.first_day(), date!(2024 - 02 - 01));
        assert_eq!(month.last_day(), date!(2024 - 02 - 29));
        assert!(month.contains(date!(2024 - 02 - 15)));
        assert!(!month.contains(date!(2024 - 03 - 01)));
    }

    #[test]
    fn serializes_as_string() {
        let month = FlowMonth::new(2025, 7).unwrap();

        let json = serde_json::to_string(&month).unwrap();
        let round_trip: FlowMonth = serde_json::from_str(&json).unwrap();

        assert_eq!(json, "\"2025-07\"");
        assert_eq!(round_trip, month);
    }
}
