//! The dashboard view-model.
//!
//! Everything here is derived from stored rows on every read and never
//! persisted.

use serde::{Serialize, Serializer};

use crate::{
    Error,
    category::{CategoryType, category_color},
    database_id::CashFlowId,
    flow_month::FlowMonth,
    transaction::Transaction,
};

/// Display order used for entries the user has not ordered.
pub(crate) const UNORDERED_POSITION: i64 = 999;

/// The totals of one category, or of a shared category and its members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAggregate {
    /// The category name, or the shared category label for composites.
    pub name: String,
    /// The sum of the signed amounts counted towards this category.
    pub spent: f64,
    /// The budget for the period.
    pub budget: f64,
    /// `budget - |spent|`.
    pub remaining: f64,
    /// `|spent|` as a percentage of `budget`, capped at 100. Zero without a budget.
    pub progress: f64,
    /// The display color.
    pub color: String,
    /// The transactions of the category, oldest first.
    pub transactions: Vec<Transaction>,
    /// Whether the category is tracked outside of the cash flow.
    pub is_non_cashflow: bool,
    /// Whether this entry is a shared category made up of `sub_categories`.
    pub is_shared_category: bool,
    /// Whether the dashboard shows a weekly breakdown.
    pub weekly_display: bool,
    /// The suggested amount for the month.
    pub monthly_target: Option<f64>,
    /// The shared category label this category is grouped under.
    pub shared_category: Option<String>,
    /// Whether the shared category's target replaces this category's target.
    pub use_shared_target: bool,
    /// The stored type tag. For a shared category, the type its members have
    /// in common.
    pub category_type: Option<CategoryType>,
    /// The position on the dashboard, lowest first.
    pub display_order: Option<i64>,
    /// The members of a shared category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_categories: Option<CategoryMap>,
}

impl CategoryAggregate {
    /// An empty aggregate for the category `name`.
    pub fn new(name: &str, is_non_cashflow: bool) -> Self {
        Self {
            name: name.to_owned(),
            spent: 0.0,
            budget: 0.0,
            remaining: 0.0,
            progress: 0.0,
            color: category_color(name).to_owned(),
            transactions: Vec::new(),
            is_non_cashflow,
            is_shared_category: false,
            weekly_display: false,
            monthly_target: None,
            shared_category: None,
            use_shared_target: true,
            category_type: None,
            display_order: None,
            sub_categories: None,
        }
    }

    /// An empty shared category called `label`.
    pub(crate) fn composite(label: &str) -> Self {
        Self {
            is_shared_category: true,
            shared_category: Some(label.to_owned()),
            sub_categories: Some(CategoryMap::default()),
            ..Self::new(label, false)
        }
    }

    /// Recompute `remaining` and `progress` from `spent` and `budget`.
    pub(crate) fn recalculate(&mut self) {
        let spent = self.spent.abs();

        self.remaining = self.budget - spent;
        self.progress = if self.budget > 0.0 {
            (spent / self.budget * 100.0).min(100.0)
        } else {
            0.0
        };
    }

    /// The position used when sorting the dashboard.
    pub(crate) fn sort_position(&self) -> i64 {
        self.display_order.unwrap_or(UNORDERED_POSITION)
    }
}

/// Category aggregates keyed by name, in display order.
///
/// Serialises as a JSON object whose keys keep the display order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryMap(Vec<(String, CategoryAggregate)>);

impl CategoryMap {
    /// The aggregate for `name`.
    pub fn get(&self, name: &str) -> Option<&CategoryAggregate> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, aggregate)| aggregate)
    }

    /// The aggregate for `name`, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut CategoryAggregate> {
        self.0
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, aggregate)| aggregate)
    }

    /// Whether there is an aggregate for `name`.
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add an aggregate at the end, or replace the aggregate with the same
    /// name in place.
    pub fn insert(&mut self, name: String, aggregate: CategoryAggregate) {
        match self.get_mut(&name) {
            Some(existing) => *existing = aggregate,
            None => self.0.push((name, aggregate)),
        }
    }

    /// The category names in display order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// The aggregates in display order.
    pub fn values(&self) -> impl Iterator<Item = &CategoryAggregate> {
        self.0.iter().map(|(_, aggregate)| aggregate)
    }

    /// The aggregates in display order, mutably.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut CategoryAggregate> {
        self.0.iter_mut().map(|(_, aggregate)| aggregate)
    }

    /// Name and aggregate pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryAggregate)> {
        self.0
            .iter()
            .map(|(name, aggregate)| (name.as_str(), aggregate))
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable sort of the entries.
    pub(crate) fn sort_by_key<K: Ord>(
        &mut self,
        mut key: impl FnMut(&str, &CategoryAggregate) -> K,
    ) {
        self.0.sort_by_key(|(name, aggregate)| key(name, aggregate));
    }
}

impl IntoIterator for CategoryMap {
    type Item = (String, CategoryAggregate);
    type IntoIter = std::vec::IntoIter<(String, CategoryAggregate)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, CategoryAggregate)> for CategoryMap {
    fn from_iter<T: IntoIterator<Item = (String, CategoryAggregate)>>(iter: T) -> Self {
        let mut map = Self::default();
        for (name, aggregate) in iter {
            map.insert(name, aggregate);
        }
        map
    }
}

impl Serialize for CategoryMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, aggregate)| (name, aggregate)))
    }
}

/// Transactions kept out of the cash flow.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NotInCashflow {
    /// The excluded transactions, oldest first.
    pub transactions: Vec<Transaction>,
    /// The sum of their signed amounts.
    pub total: f64,
}

/// The monthly totals shown above the categories.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Summary {
    /// Actual income.
    pub income: f64,
    /// Actual spending, including savings.
    pub expenses: f64,
    /// Actual money moved into savings and investments.
    pub savings: f64,
    /// `total_income - total_expenses`.
    pub balance: f64,
    /// Income for planning, where an income budget acts as a floor.
    pub total_income: f64,
    /// Expenses for planning, where an expense budget replaces actual
    /// spending, plus `monthly_savings`.
    pub total_expenses: f64,
    /// The monthly savings goal, counted as an expense.
    pub monthly_savings: f64,
}

/// The dashboard of one period.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DashboardData {
    /// Categories and shared categories, in display order.
    pub categories: CategoryMap,
    /// Transactions kept out of the cash flow.
    pub not_in_cashflow: NotInCashflow,
    /// The totals of the period.
    pub summary: Summary,
}

/// The reporting window of a dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Transactions budgeted in one flow month.
    FlowMonth(FlowMonth),
    /// Every transaction in the cash flow.
    AllTime,
}

impl Period {
    /// The flow month, or `None` for all time.
    pub fn flow_month(&self) -> Option<FlowMonth> {
        match self {
            Self::FlowMonth(flow_month) => Some(*flow_month),
            Self::AllTime => None,
        }
    }
}

/// What a dashboard is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardQuery {
    /// The reporting window.
    pub period: Period,
    /// The cash flow to report on.
    pub cash_flow_id: CashFlowId,
    /// The monthly savings goal, counted as a virtual expense.
    pub monthly_savings: f64,
}

impl DashboardQuery {
    /// A query for one flow month of a cash flow.
    pub fn for_month(cash_flow_id: CashFlowId, flow_month: FlowMonth) -> Self {
        Self {
            period: Period::FlowMonth(flow_month),
            cash_flow_id,
            monthly_savings: 0.0,
        }
    }

    /// A query over every transaction of a cash flow.
    pub fn all_time(cash_flow_id: CashFlowId) -> Self {
        Self {
            period: Period::AllTime,
            cash_flow_id,
            monthly_savings: 0.0,
        }
    }

    /// Count `monthly_savings` as a virtual expense.
    pub fn monthly_savings(mut self, monthly_savings: f64) -> Self {
        self.monthly_savings = monthly_savings;
        self
    }
}

/// The result of a dashboard read.
///
/// A failed read still carries an empty dashboard so callers can render
/// something, with `success` unset and the reason in `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardResponse {
    /// Whether the dashboard could be built.
    pub success: bool,
    /// The dashboard, empty if `success` is false.
    pub data: DashboardData,
    /// The flow month reported on, `None` for all time.
    pub flow_month: Option<FlowMonth>,
    /// The cash flow reported on.
    pub cash_flow_id: CashFlowId,
    /// The number of transactions read for the period.
    pub transaction_count: usize,
    /// Why the dashboard could not be built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DashboardResponse {
    /// An empty dashboard for `query` that reports `error`.
    pub(crate) fn failed(query: &DashboardQuery, error: &Error) -> Self {
        Self {
            success: false,
            data: DashboardData::default(),
            flow_month: query.period.flow_month(),
            cash_flow_id: query.cash_flow_id,
            transaction_count: 0,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dashboard::{CategoryAggregate, CategoryMap};

    #[test]
    fn progress_is_capped_and_zero_without_budget() {
        let mut over = CategoryAggregate::new("Fuel", false);
        over.spent = -300.0;
        over.budget = 200.0;
        over.recalculate();

        let mut unbudgeted = CategoryAggregate::new("Gifts", false);
        unbudgeted.spent = -50.0;
        unbudgeted.recalculate();

        assert_eq!(over.progress, 100.0);
        assert_eq!(over.remaining, -100.0);
        assert_eq!(unbudgeted.progress, 0.0);
        assert_eq!(unbudgeted.remaining, -50.0);
    }

    #[test]
    fn map_serializes_in_insertion_order() {
        let map: CategoryMap = ["Zebra", "Apple", "Mango"]
            .into_iter()
            .map(|name| (name.to_owned(), CategoryAggregate::new(name, false)))
            .collect();

        let json = serde_json::to_value(&map).unwrap();
        let text = serde_json::to_string(&map).unwrap();

        assert_eq!(json.as_object().unwrap().len(), 3);
        let zebra = text.find("\"Zebra\"").unwrap();
        let apple = text.find("\"Apple\"").unwrap();
        let mango = text.find("\"Mango\"").unwrap();
        assert!(zebra < apple && apple < mango);
    }
}
