use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Date, Duration};

use cashflow_rs::{
    CashFlowId, CategoryName, CategoryType, EngineConfig, FlowMonth, Ledger, NewCategory,
    Transaction, TransactionBuilder, UserId,
};

const USER: UserId = 1;
const CASH_FLOW: CashFlowId = 1;

/// A utility for creating a demo database for the cashflow engine.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// The number of months of history to generate, ending with the current month.
    #[arg(long, default_value_t = 4)]
    months: u32,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let ledger = Ledger::new(Connection::open(output_path)?, EngineConfig::default())?;

    println!("Creating categories...");
    let categories = [
        ("משכורת", Some(CategoryType::Income), 12000.0, None),
        ("Rent", Some(CategoryType::FixedExpense), 4500.0, None),
        ("Supermarket", Some(CategoryType::VariableExpense), 1800.0, Some("Food")),
        ("Restaurants", Some(CategoryType::VariableExpense), 600.0, Some("Food")),
        ("Fuel", Some(CategoryType::VariableExpense), 500.0, None),
        ("חסכונות", Some(CategoryType::Savings), 1000.0, None),
        ("הוצאות לא תזרימיות", None, 0.0, None),
    ];
    for (position, (name, category_type, budget, shared)) in categories.into_iter().enumerate() {
        let mut new_category = NewCategory::new(USER, CategoryName::new(name)?)
            .budget(budget)
            .display_order(position as i64);
        new_category.category_type = category_type;
        if let Some(label) = shared {
            new_category = new_category.shared_category(label);
        }
        ledger.create_category(new_category)?;
    }

    println!("Creating transactions...");
    let mut flow_month = ledger.current_flow_month()?;
    for _ in 1..args.months {
        flow_month = flow_month.previous();
    }

    let mut builders = Vec::new();
    for _ in 0..args.months {
        builders.extend(month_of_transactions(flow_month));
        flow_month = flow_month.next();
    }

    let result = ledger.create_transactions_batch(builders, false)?;
    println!(
        "Imported {} transactions ({} duplicates, {} errors)",
        result.imported, result.duplicates, result.errors
    );

    println!("Refreshing monthly targets...");
    let report = ledger.refresh_monthly_targets_for_new_month(USER, true)?;
    println!("Updated {} of {} targets", report.updated_count, report.total_categories);

    println!("Success!");

    Ok(())
}

fn month_of_transactions(flow_month: FlowMonth) -> Vec<TransactionBuilder> {
    let day = |day: i64| -> Date {
        let date = flow_month.first_day() + Duration::days(day - 1);
        date.min(flow_month.last_day())
    };
    let transaction = |name: &str, category: &str, amount: f64, date: Date| {
        Transaction::build(USER, CASH_FLOW, name, amount, date).category_name(category)
    };
    let variation = f64::from(flow_month.month()) * 7.5;

    vec![
        transaction("Employer Ltd", "משכורת", 12000.0, day(1)),
        transaction("Landlord", "Rent", -4500.0, day(2)),
        transaction("Shufersal", "Supermarket", -412.3 - variation, day(4)),
        transaction("Rami Levy", "Supermarket", -389.9, day(12)),
        transaction("Shufersal", "Supermarket", -455.0 + variation, day(20)),
        transaction("Falafel", "Restaurants", -48.0, day(7)),
        transaction("Sushi Bar", "Restaurants", -210.0 - variation, day(15)),
        transaction("Paz", "Fuel", -320.0, day(9)),
        transaction("Savings deposit", "חסכונות", -1000.0, day(10)),
        transaction("Credit card settlement", "הוצאות לא תזרימיות", -2800.0, day(28)),
        transaction("Own account", "Savings", -500.0, day(25)).is_transfer(true),
    ]
}
