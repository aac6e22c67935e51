//! Bulk import of transactions.

use std::collections::{HashMap, HashSet};

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{CashFlowId, UserId},
    flow_month::FlowMonth,
    transaction::{
        Transaction, TransactionBuilder,
        core::{
            TRANSACTION_COLUMNS, insert_columns, insert_params, map_transaction_row,
            resolve_flow_month,
        },
        fingerprint,
    },
};

/// The maximum number of fingerprints sent in one existence query.
const CHUNK_SIZE: usize = 500;

/// The counts reported after a bulk import.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BatchImportResult {
    /// The number of transactions stored.
    pub imported: usize,
    /// The number of transactions dropped because they already exist.
    pub duplicates: usize,
    /// The number of transactions that could not be stored.
    pub errors: usize,
    /// The stored transactions.
    pub transactions: Vec<Transaction>,
}

/// Get the fingerprints in `fingerprints` that are already stored for the
/// user in the cash flow.
///
/// Uses one query per chunk of fingerprints rather than one per fingerprint.
pub fn check_existing(
    user_id: UserId,
    fingerprints: &[String],
    cash_flow_id: CashFlowId,
    connection: &Connection,
) -> Result<HashSet<String>, Error> {
    let mut existing = HashSet::new();

    for chunk in fingerprints.chunks(CHUNK_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut statement = connection.prepare(&format!(
            "SELECT fingerprint FROM \"transaction\"
             WHERE user_id = ? AND cash_flow_id = ? AND fingerprint IN ({placeholders})"
        ))?;

        let mut params: Vec<&dyn rusqlite::ToSql> = vec![&user_id, &cash_flow_id];
        params.extend(chunk.iter().map(|fingerprint| fingerprint as &dyn rusqlite::ToSql));

        let rows = statement.query_map(params.as_slice(), |row| row.get::<_, String>(0))?;
        for fingerprint in rows {
            existing.insert(fingerprint?);
        }
    }

    Ok(existing)
}

/// Get the stored transactions with any of `fingerprints`, e.g. to show the
/// user which rows of an import were skipped as duplicates.
pub fn get_transactions_by_fingerprints(
    user_id: UserId,
    fingerprints: &[String],
    cash_flow_id: CashFlowId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut transactions = Vec::new();

    for chunk in fingerprints.chunks(CHUNK_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut statement = connection.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = ? AND cash_flow_id = ? AND fingerprint IN ({placeholders})
             ORDER BY payment_date ASC, id ASC"
        ))?;

        let mut params: Vec<&dyn rusqlite::ToSql> = vec![&user_id, &cash_flow_id];
        params.extend(chunk.iter().map(|fingerprint| fingerprint as &dyn rusqlite::ToSql));

        for transaction in statement.query_map(params.as_slice(), map_transaction_row)? {
            transactions.push(transaction?);
        }
    }

    Ok(transactions)
}

/// Import many transactions at once.
///
/// Unless `force_import` is set, transactions whose fingerprint is already
/// stored are dropped after a single existence check per cash flow.
/// Duplicates are never disambiguated here: conflicts at insert time, for
/// example two identical rows in `builders`, are dropped and counted as
/// duplicates even when forcing.
///
/// Rows with a non-finite amount, rows paid outside the storable flow month
/// range and rows that fail to insert are counted as errors and do not stop the rest of the batch.
///
/// # Errors
/// Returns an [Error::StoreUnavailable] if the batch could not be started or
/// committed, or the existence check failed.
pub fn create_transactions_batch(
    builders: Vec<TransactionBuilder>,
    force_import: bool,
    connection: &Connection,
) -> Result<BatchImportResult, Error> {
    let start_time = std::time::Instant::now();
    let mut result = BatchImportResult::default();

    if builders.is_empty() {
        return Ok(result);
    }

    let mut candidates = Vec::with_capacity(builders.len());
    for builder in builders {
        if !builder.amount.is_finite() {
            tracing::warn!(
                "Skipping transaction \"{}\" with invalid amount {}",
                builder.business_name,
                builder.amount
            );
            result.errors += 1;
            continue;
        }

        let flow_month = match resolve_flow_month(&builder) {
            Ok(flow_month) => flow_month,
            Err(error) => {
                tracing::warn!(
                    "Skipping transaction \"{}\" paid on {}: {error}",
                    builder.business_name,
                    builder.payment_date
                );
                result.errors += 1;
                continue;
            }
        };

        let content_fingerprint = match &builder.fingerprint {
            Some(precomputed) => precomputed.clone(),
            None => fingerprint(&builder),
        };
        candidates.push((builder, flow_month, content_fingerprint));
    }

    let existing = if force_import {
        HashMap::new()
    } else {
        existing_by_cash_flow(&candidates, connection)?
    };

    let transaction = connection.unchecked_transaction()?;

    {
        // Prepare the insert statement once for reuse
        let mut statement = transaction.prepare(&format!(
            "INSERT INTO \"transaction\" ({})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                     ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)
             ON CONFLICT(user_id, cash_flow_id, fingerprint) DO NOTHING
             RETURNING id, {}",
            insert_columns(),
            insert_columns(),
        ))?;
        let now = OffsetDateTime::now_utc();

        for (builder, flow_month, fingerprint) in candidates {
            let is_known = existing
                .get(&(builder.user_id, builder.cash_flow_id))
                .is_some_and(|fingerprints| fingerprints.contains(&fingerprint));

            if is_known {
                result.duplicates += 1;
                continue;
            }

            let inserted = statement
                .query_row(
                    rusqlite::params_from_iter(insert_params(
                        &builder,
                        flow_month,
                        &fingerprint,
                        now,
                    )),
                    map_transaction_row,
                )
                .optional();

            match inserted {
                Ok(Some(stored)) => {
                    result.imported += 1;
                    result.transactions.push(stored);
                }
                Ok(None) => result.duplicates += 1,
                Err(error) => {
                    tracing::warn!(
                        "Could not import transaction \"{}\": {error}",
                        builder.business_name
                    );
                    result.errors += 1;
                }
            }
        }
    }

    transaction.commit()?;

    tracing::info!(
        "Imported {} transactions ({} duplicates, {} errors) in {:.1}ms",
        result.imported,
        result.duplicates,
        result.errors,
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    Ok(result)
}

fn existing_by_cash_flow(
    candidates: &[(TransactionBuilder, FlowMonth, String)],
    connection: &Connection,
) -> Result<HashMap<(UserId, CashFlowId), HashSet<String>>, Error> {
    let mut grouped: HashMap<(UserId, CashFlowId), Vec<String>> = HashMap::new();
    for (builder, _, fingerprint) in candidates {
        grouped
            .entry((builder.user_id, builder.cash_flow_id))
            .or_default()
            .push(fingerprint.clone());
    }

    grouped
        .into_iter()
        .map(|((user_id, cash_flow_id), fingerprints)| {
            check_existing(user_id, &fingerprints, cash_flow_id, connection)
                .map(|existing| ((user_id, cash_flow_id), existing))
        })
        .collect()
}

#[cfg(test)]
mod batch_tests {
    use time::macros::date;

    use crate::{
        test_utils::get_test_connection,
        transaction::{
            Transaction, TransactionBuilder, check_existing, create_transactions_batch,
            core::count_transactions, fingerprint, get_transactions_by_fingerprints,
            get_transactions_for_period,
        },
    };

    fn statement_rows() -> Vec<TransactionBuilder> {
        vec![
            Transaction::build(1, 1, "Shufersal", -230.4, date!(2025 - 04 - 02)),
            Transaction::build(1, 1, "Paz", -180.0, date!(2025 - 04 - 05)),
            Transaction::build(1, 1, "Employer Ltd", 12500.0, date!(2025 - 04 - 10)),
        ]
    }

    #[test]
    fn empty_batch_imports_nothing() {
        let conn = get_test_connection();

        let result = create_transactions_batch(Vec::new(), false, &conn).unwrap();

        assert_eq!(result.imported, 0);
        assert_eq!(result.duplicates, 0);
        assert_eq!(result.errors, 0);
    }

    #[test]
    fn reimporting_a_statement_only_reports_duplicates() {
        let conn = get_test_connection();

        let first = create_transactions_batch(statement_rows(), false, &conn).unwrap();
        let second = create_transactions_batch(statement_rows(), false, &conn).unwrap();

        assert_eq!((first.imported, first.duplicates, first.errors), (3, 0, 0));
        assert_eq!((second.imported, second.duplicates, second.errors), (0, 3, 0));
        assert!(second.transactions.is_empty());
        assert_eq!(count_transactions(1, 1, &conn), Ok(3));
    }

    #[test]
    fn identical_rows_in_one_batch_are_dropped() {
        let conn = get_test_connection();
        let mut rows = statement_rows();
        rows.push(rows[0].clone().payment_method("Other card"));

        let result = create_transactions_batch(rows, true, &conn).unwrap();

        assert_eq!((result.imported, result.duplicates), (3, 1));
    }

    #[test]
    fn invalid_rows_do_not_abort_the_batch() {
        let conn = get_test_connection();
        let mut rows = statement_rows();
        rows[1].amount = f64::NAN;

        let result = create_transactions_batch(rows, false, &conn).unwrap();

        assert_eq!((result.imported, result.duplicates, result.errors), (2, 0, 1));
        let names: Vec<_> = result
            .transactions
            .iter()
            .map(|t| t.business_name.as_str())
            .collect();
        assert_eq!(names, vec!["Shufersal", "Employer Ltd"]);
    }

    #[test]
    fn rows_paid_outside_storable_years_are_errors_and_not_stored() {
        let conn = get_test_connection();
        let mut rows = statement_rows();
        rows.push(Transaction::build(1, 1, "Typo", -5.0, date!(2205 - 03 - 01)));

        let result = create_transactions_batch(rows, false, &conn).unwrap();

        assert_eq!((result.imported, result.duplicates, result.errors), (3, 0, 1));
        assert_eq!(count_transactions(1, 1, &conn), Ok(3));
        let all_time = get_transactions_for_period(1, 1, None, &conn).unwrap();
        assert_eq!(all_time.len(), 3);
    }

    #[test]
    fn check_existing_returns_stored_subset() {
        let conn = get_test_connection();
        let rows = statement_rows();
        create_transactions_batch(rows[..2].to_vec(), false, &conn).unwrap();
        let fingerprints: Vec<String> = rows.iter().map(fingerprint).collect();

        let existing = check_existing(1, &fingerprints, 1, &conn).unwrap();
        let other_cash_flow = check_existing(1, &fingerprints, 2, &conn).unwrap();

        assert_eq!(existing.len(), 2);
        assert!(existing.contains(&fingerprints[0]));
        assert!(!existing.contains(&fingerprints[2]));
        assert!(other_cash_flow.is_empty());
    }

    #[test]
    fn check_existing_handles_more_fingerprints_than_one_chunk() {
        let conn = get_test_connection();
        let rows: Vec<_> = (0..1200)
            .map(|i| Transaction::build(1, 1, &format!("Shop {i}"), -1.0, date!(2025 - 01 - 01)))
            .collect();
        let fingerprints: Vec<String> = rows.iter().map(fingerprint).collect();
        create_transactions_batch(rows, false, &conn).unwrap();

        let existing = check_existing(1, &fingerprints, 1, &conn).unwrap();

        assert_eq!(existing.len(), 1200);
    }

    #[test]
    fn existing_rows_can_be_fetched_for_review() {
        let conn = get_test_connection();
        let rows = statement_rows();
        create_transactions_batch(rows.clone(), false, &conn).unwrap();
        let fingerprints = vec![fingerprint(&rows[2]), "missing".to_owned()];

        let got = get_transactions_by_fingerprints(1, &fingerprints, 1, &conn).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].business_name, "Employer Ltd");
    }
}
