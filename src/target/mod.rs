//! Monthly targets derived from spending history.
//!
//! A category's monthly target is the average of its recent monthly totals.
//! Shared categories get a target of their own, the sum of their members'
//! averages. Targets are refreshed once per month, guarded by a per-user
//! watermark.

mod average;
mod db;
mod refresh;
mod weekly;

pub use average::{
    calculate_monthly_average, get_category_monthly_spending, get_shared_category_monthly_spending,
};
pub use db::{
    SharedCategoryTarget, create_shared_category_target_table, create_target_refresh_table,
    get_shared_category_target, get_shared_category_targets, set_use_shared_target,
    update_category_monthly_target, update_shared_category_target,
};
pub use refresh::{
    CategoryTargetResult, RefreshReport, SharedTargetAction, SharedTargetResult,
    calculate_and_update_shared_category_targets, refresh_monthly_targets, should_refresh_targets,
};
pub use weekly::calculate_weekly_target;

/// Round `amount` to whole cents.
pub(crate) fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
