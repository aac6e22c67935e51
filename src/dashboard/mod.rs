//! Dashboard module
//!
//! Turns the transactions of a reporting period into the dashboard
//! view-model: one entry per category or shared category with its spending
//! against budget, the transactions kept out of the cash flow, and the monthly
//! totals.

mod data;
mod model;
mod partition;
mod shared;
mod summary;

pub use data::get_dashboard_data;
pub use model::{
    CategoryAggregate, CategoryMap, DashboardData, DashboardQuery, DashboardResponse,
    NotInCashflow, Period, Summary,
};
