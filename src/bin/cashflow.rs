use std::{error::Error, fs, fs::OpenOptions, path::PathBuf, sync::Arc};

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use cashflow_rs::{
    BatchImportResult, CashFlowId, CategoryName, CategoryType, DashboardQuery, EngineConfig,
    FlowMonth, Ledger, NewCategory, SourceType, Transaction, TransactionBuilder, UserId,
    parse_amount, parse_payment_date,
};

/// Operator tool for a cashflow database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the SQLite database.
    #[arg(long)]
    db_path: PathBuf,

    /// The canonical name of the local timezone, e.g. "Asia/Jerusalem".
    #[arg(long)]
    timezone: Option<String>,

    /// The user to act as.
    #[arg(long, default_value_t = 1)]
    user: UserId,

    /// The cash flow to act on.
    #[arg(long, default_value_t = 1)]
    cash_flow: CashFlowId,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database tables.
    Init,
    /// Add a category.
    AddCategory(AddCategoryArgs),
    /// Add a single transaction.
    Add(AddArgs),
    /// Import a JSON array of transactions.
    Import {
        /// File path to the JSON file.
        file: PathBuf,
        /// Import rows even if they duplicate stored transactions.
        #[arg(long)]
        force: bool,
    },
    /// Print the dashboard as JSON.
    Dashboard {
        /// The flow month to report on, e.g. 2025-03. Defaults to this month.
        #[arg(long, conflicts_with = "all_time")]
        flow_month: Option<FlowMonth>,
        /// Report on every transaction in the cash flow.
        #[arg(long)]
        all_time: bool,
        /// A monthly savings goal to count as an expense.
        #[arg(long, default_value_t = 0.0)]
        monthly_savings: f64,
    },
    /// Print the monthly average of a category.
    Average {
        /// The category name.
        category: String,
        /// The number of past months to average.
        #[arg(long, default_value_t = 3)]
        months: u32,
    },
    /// Recalculate the monthly targets.
    RefreshTargets {
        /// Recalculate even if the targets were already refreshed this month.
        #[arg(long)]
        force: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct AddCategoryArgs {
    /// The category name.
    name: String,
    /// One of income, fixed_expense, variable_expense or savings.
    #[arg(long = "type")]
    category_type: Option<String>,
    /// The default monthly budget.
    #[arg(long, default_value_t = 0.0)]
    budget: f64,
    /// The shared category to group this category under.
    #[arg(long)]
    shared: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct AddArgs {
    /// The business or payee.
    name: String,
    /// The signed amount, negative for expenses.
    #[arg(allow_hyphen_values = true)]
    amount: String,
    /// The payment date, e.g. 2025-03-14 or 14/03/2025.
    date: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    flow_month: Option<FlowMonth>,
    /// Store the transaction even if it duplicates a stored one.
    #[arg(long)]
    force: bool,
}

/// A transaction amount as it appears in an import file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportAmount {
    Number(f64),
    Text(String),
}

/// One row of an import file.
#[derive(Debug, Deserialize)]
struct ImportRow {
    business_name: String,
    amount: ImportAmount,
    payment_date: String,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    category_name: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    payment_identifier: Option<String>,
    #[serde(default)]
    flow_month: Option<FlowMonth>,
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();

    let args = Args::parse();

    let mut config = EngineConfig::default();
    if let Some(timezone) = &args.timezone {
        config = config.local_timezone(timezone);
    }

    let ledger = Ledger::open(&args.db_path, config)?;

    match args.command {
        Command::Init => {
            tracing::info!("Initialised database at {:#?}", args.db_path);
        }
        Command::AddCategory(category) => {
            let mut new_category = NewCategory::new(args.user, CategoryName::new(&category.name)?)
                .budget(category.budget);
            if let Some(raw_type) = &category.category_type {
                let category_type = CategoryType::parse(raw_type)
                    .ok_or_else(|| format!("unknown category type \"{raw_type}\""))?;
                new_category = new_category.category_type(category_type);
            }
            if let Some(label) = &category.shared {
                new_category = new_category.shared_category(label);
            }

            print_json(&ledger.create_category(new_category)?)?;
        }
        Command::Add(add) => {
            let payment_date = parse_payment_date(&add.date)
                .ok_or_else(|| format!("could not parse the date \"{}\"", add.date))?;
            let mut builder = Transaction::build(
                args.user,
                args.cash_flow,
                &add.name,
                parse_amount(&add.amount)?,
                payment_date,
            );
            if let Some(category) = &add.category {
                builder = builder.category_name(category);
            }
            if let Some(notes) = &add.notes {
                builder = builder.notes(notes);
            }
            if let Some(currency) = &add.currency {
                builder = builder.currency(currency);
            }
            if let Some(flow_month) = add.flow_month {
                builder = builder.flow_month(flow_month);
            }

            print_json(&ledger.create_transaction(builder, add.force)?)?;
        }
        Command::Import { file, force } => {
            let rows: Vec<ImportRow> = serde_json::from_str(&fs::read_to_string(&file)?)?;
            let row_count = rows.len();

            let mut builders = Vec::with_capacity(row_count);
            for (index, row) in rows.into_iter().enumerate() {
                match to_builder(row, args.user, args.cash_flow) {
                    Ok(builder) => builders.push(builder),
                    Err(error) => tracing::warn!("Skipping row {index}: {error}"),
                }
            }
            let unreadable = row_count - builders.len();

            let mut result: BatchImportResult = ledger.create_transactions_batch(builders, force)?;
            result.errors += unreadable;

            print_json(&ImportSummary {
                success: result.errors == 0,
                imported: result.imported,
                duplicates: result.duplicates,
                errors: result.errors,
            })?;
        }
        Command::Dashboard {
            flow_month,
            all_time,
            monthly_savings,
        } => {
            let query = if all_time {
                DashboardQuery::all_time(args.cash_flow)
            } else {
                let flow_month = match flow_month {
                    Some(flow_month) => flow_month,
                    None => ledger.current_flow_month()?,
                };
                DashboardQuery::for_month(args.cash_flow, flow_month)
            };

            let query = query.monthly_savings(monthly_savings);
            print_json(&ledger.get_dashboard_data(args.user, &query))?;
        }
        Command::Average { category, months } => {
            let average = ledger.calculate_monthly_average(args.user, &category, months)?;
            println!("{average:.2}");
        }
        Command::RefreshTargets { force } => {
            print_json(&ledger.refresh_monthly_targets_for_new_month(args.user, force)?)?;
        }
    }

    Ok(())
}

/// The outcome of an import as reported to the operator.
#[derive(Debug, Serialize)]
struct ImportSummary {
    success: bool,
    imported: usize,
    duplicates: usize,
    errors: usize,
}

fn to_builder(
    row: ImportRow,
    user_id: UserId,
    cash_flow_id: CashFlowId,
) -> Result<TransactionBuilder, Box<dyn Error>> {
    let amount = match row.amount {
        ImportAmount::Number(amount) => amount,
        ImportAmount::Text(text) => parse_amount(&text)?,
    };
    let payment_date = parse_payment_date(&row.payment_date)
        .ok_or_else(|| format!("could not parse the date \"{}\"", row.payment_date))?;

    let mut builder = Transaction::build(
        user_id,
        cash_flow_id,
        &row.business_name,
        amount,
        payment_date,
    )
    .source_type(SourceType::Import);

    if let Some(currency) = &row.currency {
        builder = builder.currency(currency);
    }
    if let Some(category_name) = &row.category_name {
        builder = builder.category_name(category_name);
    }
    if let Some(notes) = &row.notes {
        builder = builder.notes(notes);
    }
    if let Some(payment_method) = &row.payment_method {
        builder = builder.payment_method(payment_method);
    }
    if let Some(payment_identifier) = &row.payment_identifier {
        builder = builder.payment_identifier(payment_identifier);
    }
    if let Some(flow_month) = row.flow_month {
        builder = builder.flow_month(flow_month);
    }

    Ok(builder)
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn setup_logging() {
    let console_log = tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            console_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}
