//! The entry point the surrounding application uses to reach the engine.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    category::{Category, NewCategory, create_category, get_all_categories, set_monthly_budget},
    config::EngineConfig,
    dashboard::{DashboardQuery, DashboardResponse, get_dashboard_data},
    database_id::{CashFlowId, UserId},
    db::initialize,
    flow_month::FlowMonth,
    target::{
        RefreshReport, SharedCategoryTarget, SharedTargetResult,
        calculate_and_update_shared_category_targets, calculate_monthly_average,
        get_shared_category_monthly_spending, get_shared_category_target, refresh_monthly_targets,
        set_use_shared_target, should_refresh_targets, update_category_monthly_target,
        update_shared_category_target,
    },
    timezone::{get_local_offset, local_today},
    transaction::{
        BatchImportResult, CreateOutcome, TransactionBuilder, create_transaction,
        create_transactions_batch,
    },
};

/// A shared handle to the engine's database.
///
/// Cloning a ledger is cheap and clones share the same connection. Access to
/// the connection is serialised, so each operation sees a consistent store.
#[derive(Debug, Clone)]
pub struct Ledger {
    connection: Arc<Mutex<Connection>>,
    config: EngineConfig,
}

impl Ledger {
    /// Wrap `connection`, creating any missing tables.
    ///
    /// # Errors
    /// Returns an [Error::InvalidTimezoneError] if the configured timezone is
    /// not known, or an [Error::StoreUnavailable] if the tables could not be
    /// created.
    pub fn new(connection: Connection, config: EngineConfig) -> Result<Self, Error> {
        if get_local_offset(&config.local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(config.local_timezone));
        }

        initialize(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            config,
        })
    }

    /// Open the SQLite database at `path`, creating it if it does not exist.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self, Error> {
        let connection = Connection::open(path)?;
        Self::new(connection, config)
    }

    /// The settings the ledger was created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> Result<Date, Error> {
        local_today(&self.config.local_timezone)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)
    }

    /// Store a transaction unless it duplicates one already in its cash flow.
    ///
    /// With `force_import` the transaction is stored anyway, with a note that
    /// references the transaction it duplicates.
    pub fn create_transaction(
        &self,
        builder: TransactionBuilder,
        force_import: bool,
    ) -> Result<CreateOutcome, Error> {
        let connection = self.connection()?;
        create_transaction(
            builder,
            force_import,
            self.config.max_fingerprint_attempts,
            &connection,
        )
    }

    /// Store many transactions at once, skipping duplicates unless
    /// `force_import` is set.
    pub fn create_transactions_batch(
        &self,
        builders: Vec<TransactionBuilder>,
        force_import: bool,
    ) -> Result<BatchImportResult, Error> {
        let connection = self.connection()?;
        create_transactions_batch(builders, force_import, &connection)
    }

    /// Get the dashboard selected by `query`.
    ///
    /// Never fails, see [get_dashboard_data].
    pub fn get_dashboard_data(&self, user_id: UserId, query: &DashboardQuery) -> DashboardResponse {
        match self.connection() {
            Ok(connection) => get_dashboard_data(user_id, query, &connection),
            Err(error) => DashboardResponse::failed(query, &error),
        }
    }

    /// The flow month that today falls in.
    pub fn current_flow_month(&self) -> Result<FlowMonth, Error> {
        FlowMonth::from_date(self.today()?)
    }

    /// Get the dashboard of the current flow month of a cash flow.
    pub fn current_dashboard(
        &self,
        user_id: UserId,
        cash_flow_id: CashFlowId,
    ) -> DashboardResponse {
        let query = match self.current_flow_month() {
            Ok(flow_month) => DashboardQuery::for_month(cash_flow_id, flow_month),
            Err(error) => {
                return DashboardResponse::failed(&DashboardQuery::all_time(cash_flow_id), &error);
            }
        };

        self.get_dashboard_data(user_id, &query)
    }

    /// Create a category.
    pub fn create_category(&self, new_category: NewCategory) -> Result<Category, Error> {
        let connection = self.connection()?;
        create_category(new_category, &connection)
    }

    /// Get all of a user's categories in display order.
    pub fn get_all_categories(&self, user_id: UserId) -> Result<Vec<Category>, Error> {
        let connection = self.connection()?;
        get_all_categories(user_id, &connection)
    }

    /// Override the budget of a category for one flow month.
    pub fn set_monthly_budget(
        &self,
        user_id: UserId,
        category_name: &str,
        flow_month: FlowMonth,
        amount: f64,
    ) -> Result<(), Error> {
        let connection = self.connection()?;
        set_monthly_budget(user_id, category_name, flow_month, amount, &connection)
    }

    /// The average monthly amount of a category over the `months` months before this one.
    pub fn calculate_monthly_average(
        &self,
        user_id: UserId,
        category_name: &str,
        months: u32,
    ) -> Result<f64, Error> {
        let today = self.today()?;
        let connection = self.connection()?;
        calculate_monthly_average(user_id, category_name, months, today, &connection)
    }

    /// Set the monthly target of a category.
    pub fn update_category_monthly_target(
        &self,
        user_id: UserId,
        category_name: &str,
        monthly_target: f64,
    ) -> Result<Category, Error> {
        let connection = self.connection()?;
        update_category_monthly_target(user_id, category_name, monthly_target, &connection)
    }

    /// Whether the user's targets are due for this month's refresh.
    pub fn should_refresh_targets(&self, user_id: UserId) -> Result<bool, Error> {
        let today = self.today()?;
        let connection = self.connection()?;
        should_refresh_targets(user_id, today, &connection)
    }

    /// Recalculate the user's targets if they have not been refreshed this
    /// month, or regardless if `force` is set.
    pub fn refresh_monthly_targets_for_new_month(
        &self,
        user_id: UserId,
        force: bool,
    ) -> Result<RefreshReport, Error> {
        let today = self.today()?;
        let connection = self.connection()?;
        refresh_monthly_targets(
            user_id,
            force,
            self.config.target_average_months,
            today,
            &connection,
        )
    }

    /// Get the target of a shared category.
    pub fn get_shared_category_target(
        &self,
        user_id: UserId,
        shared_category_name: &str,
    ) -> Result<Option<SharedCategoryTarget>, Error> {
        let connection = self.connection()?;
        get_shared_category_target(user_id, shared_category_name, &connection)
    }

    /// Set the target of a shared category.
    pub fn update_shared_category_target(
        &self,
        user_id: UserId,
        shared_category_name: &str,
        monthly_target: f64,
        weekly_display: bool,
    ) -> Result<SharedCategoryTarget, Error> {
        let connection = self.connection()?;
        update_shared_category_target(
            user_id,
            shared_category_name,
            monthly_target,
            weekly_display,
            &connection,
        )
    }

    /// Choose whether a category follows its shared category's target.
    pub fn set_use_shared_target(
        &self,
        user_id: UserId,
        category_name: &str,
        use_shared_target: bool,
    ) -> Result<Category, Error> {
        let connection = self.connection()?;
        set_use_shared_target(user_id, category_name, use_shared_target, &connection)
    }

    /// The total amount of a shared category in one calendar month.
    pub fn get_shared_category_monthly_spending(
        &self,
        user_id: UserId,
        shared_category_name: &str,
        month: FlowMonth,
    ) -> Result<f64, Error> {
        let connection = self.connection()?;
        get_shared_category_monthly_spending(user_id, shared_category_name, month, &connection)
    }

    /// Recalculate every shared category target from its members' averages.
    pub fn calculate_and_update_shared_category_targets(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SharedTargetResult>, Error> {
        let today = self.today()?;
        let connection = self.connection()?;
        calculate_and_update_shared_category_targets(
            user_id,
            self.config.target_average_months,
            today,
            &connection,
        )
    }
}
