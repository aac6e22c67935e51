//! Weekly slices of a monthly target.

use time::{Date, Duration};

use crate::{flow_month::FlowMonth, target::round_cents};

/// The share of `monthly_target` that falls in the week starting on
/// `week_start`, counting only the days of the week inside `month`.
///
/// A week that starts in the previous month, or runs into the next one, gets
/// a smaller share. A week entirely outside of `month` gets nothing.
pub fn calculate_weekly_target(monthly_target: f64, week_start: Date, month: FlowMonth) -> f64 {
    let first_day = month.first_day();
    let last_day = month.last_day();
    let week_end = week_start.saturating_add(Duration::days(6));

    let start = week_start.max(first_day);
    let end = week_end.min(last_day);

    if end < start {
        return 0.0;
    }

    let days_in_week = (end - start).whole_days() + 1;
    let days_in_month = i64::from(last_day.day());

    round_cents(monthly_target * days_in_week as f64 / days_in_month as f64)
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{flow_month::FlowMonth, target::calculate_weekly_target};

    #[test]
    fn full_week_gets_seven_days_worth() {
        let april = FlowMonth::new(2025, 4).unwrap();

        assert_eq!(calculate_weekly_target(3000.0, date!(2025 - 04 - 06), april), 700.0);
    }

    #[test]
    fn week_starting_in_previous_month_is_prorated() {
        let march = FlowMonth::new(2025, 3).unwrap();

        // Only March 1st and 2nd fall in March.
        assert_eq!(calculate_weekly_target(3100.0, date!(2025 - 02 - 24), march), 200.0);
    }

    #[test]
    fn week_running_into_next_month_is_prorated() {
        let february = FlowMonth::new(2025, 2).unwrap();

        // February 24th to 28th.
        assert_eq!(calculate_weekly_target(2800.0, date!(2025 - 02 - 24), february), 500.0);
    }

    #[test]
    fn week_outside_month_gets_nothing() {
        let march = FlowMonth::new(2025, 3).unwrap();

        assert_eq!(calculate_weekly_target(3100.0, date!(2025 - 04 - 07), march), 0.0);
    }

    #[test]
    fn result_is_rounded_to_cents() {
        let january = FlowMonth::new(2025, 1).unwrap();

        assert_eq!(calculate_weekly_target(1000.0, date!(2025 - 01 - 06), january), 225.81);
    }
}
