//! Content fingerprints for detecting duplicate transactions.
//!
//! A fingerprint is the MD5 digest of a canonical JSON object built from the
//! fields that identify a transaction: business name, payment date, amount,
//! currency and notes. The payment method and payment identifier are left
//! out so that the same purchase seen through two payment instruments (e.g.
//! a bank statement and a credit card statement) is still a duplicate.

use serde::Serialize;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::transaction::{DEFAULT_CURRENCY, TransactionBuilder};

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Formats accepted for payment dates, in the order they are tried.
const DATE_FORMATS: [&[BorrowedFormatItem<'static>]; 4] = [
    ISO_DATE,
    format_description!("[day]/[month]/[year]"),
    format_description!("[day].[month].[year]"),
    format_description!("[year]/[month]/[day]"),
];

/// The canonical object that gets hashed.
///
/// The fields are declared in lexicographic order, which is the order
/// `serde_json` writes them in.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    amount: f64,
    business_name: String,
    currency: String,
    notes: &'a str,
    payment_date: String,
}

/// Re-format a payment date as `YYYY-MM-DD`.
///
/// Accepts `YYYY-MM-DD`, ISO 8601 date-times, `DD/MM/YYYY`, `DD.MM.YYYY` and
/// `YYYY/MM/DD`. Returns an empty string if `input` is not a date.
pub fn normalize_payment_date(input: &str) -> String {
    parse_payment_date(input)
        .and_then(|date| date.format(ISO_DATE).ok())
        .unwrap_or_default()
}

/// Parse a payment date in any of the formats [normalize_payment_date] accepts.
pub fn parse_payment_date(input: &str) -> Option<Date> {
    let input = input.trim();

    // Date-times, e.g. "2025-03-01T00:00:00.000Z" or "2025-03-01 10:15:00".
    let date_part = match input.get(10..11) {
        Some("T") | Some(" ") => &input[..10],
        _ => input,
    };

    DATE_FORMATS
        .iter()
        .find_map(|format| Date::parse(date_part, *format).ok())
}

/// Compute the fingerprint of a transaction that is about to be stored.
pub fn fingerprint(builder: &TransactionBuilder) -> String {
    fingerprint_fields(
        &builder.business_name,
        &builder.payment_date.to_string(),
        builder.amount,
        &builder.currency,
        &builder.notes,
    )
}

/// Compute a fingerprint from the raw identifying fields of a transaction.
///
/// Returns 32 lowercase hex digits. Non-finite amounts hash as zero and
/// unparseable dates hash as an empty date, so the result is always
/// deterministic.
pub fn fingerprint_fields(
    business_name: &str,
    payment_date: &str,
    amount: f64,
    currency: &str,
    notes: &str,
) -> String {
    let currency = currency.trim();

    let input = FingerprintInput {
        amount: round_amount(amount),
        business_name: business_name.trim().to_lowercase(),
        currency: if currency.is_empty() {
            DEFAULT_CURRENCY.to_owned()
        } else {
            currency.to_uppercase()
        },
        notes: notes.trim(),
        payment_date: normalize_payment_date(payment_date),
    };

    // Cannot fail for this struct: non-finite floats serialise as `null`.
    let canonical = serde_json::to_string(&input).unwrap_or_else(|error| {
        tracing::warn!("Could not serialise fingerprint input for {business_name:?}: {error}");
        format!(
            "{}|{}|{}|{}|{}",
            input.amount, input.business_name, input.currency, input.notes, input.payment_date
        )
    });

    format!("{:x}", md5::compute(canonical))
}

fn round_amount(amount: f64) -> f64 {
    if !amount.is_finite() {
        return 0.0;
    }

    let rounded = (amount * 100.0).round() / 100.0;

    // Avoids -0.0 and 0.0 hashing differently.
    if rounded == 0.0 { 0.0 } else { rounded }
}
