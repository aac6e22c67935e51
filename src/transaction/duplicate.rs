//! Deciding what happens to a transaction whose fingerprint already exists.

use rusqlite::Connection;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    transaction::{
        Transaction, TransactionBuilder,
        core::{find_by_fingerprint, insert_transaction, resolve_flow_month},
        fingerprint,
    },
};

/// Added to the notes of a transaction that was imported on purpose even
/// though it duplicates an existing one.
pub const DUPLICATE_MARKER: &str = "Duplicate of transaction";

/// The outcome of checking a candidate transaction for duplicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The candidate may be stored. Its fingerprint is set and unique.
    Accepted,
    /// The candidate duplicates `existing` and must not be stored.
    Rejected {
        /// The stored transaction with the same fingerprint.
        existing: Box<Transaction>,
    },
}

/// The outcome of [create_transaction].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreateOutcome {
    /// The transaction was stored.
    Created {
        /// The stored transaction.
        transaction: Transaction,
    },
    /// The transaction duplicates one that is already stored and was not
    /// stored. Retry with `force_import` to store it anyway.
    Duplicate {
        /// The stored transaction with the same fingerprint.
        existing: Transaction,
    },
}

/// Check `candidate` for duplicates, giving it a unique fingerprint when
/// `force_import` is set.
///
/// `lookup` returns the stored transaction with a given fingerprint in the
/// candidate's cash flow, if there is one. The fingerprint is computed from
/// the candidate's content unless it was already set.
///
/// When a forced candidate collides, a note referencing the original
/// transaction is appended and the fingerprint recomputed. Further collisions
/// add a numbered suffix to the note, up to `max_attempts` times, after which
/// a nanosecond timestamp is used instead. The only side effect is the change
/// to `candidate`'s notes and fingerprint.
///
/// # Errors
/// Returns any error from `lookup`.
pub fn resolve_duplicate<F>(
    candidate: &mut TransactionBuilder,
    force_import: bool,
    max_attempts: u32,
    mut lookup: F,
) -> Result<Resolution, Error>
where
    F: FnMut(&str) -> Result<Option<Transaction>, Error>,
{
    let initial_fingerprint = match &candidate.fingerprint {
        Some(precomputed) => precomputed.clone(),
        None => fingerprint(candidate),
    };
    candidate.fingerprint = Some(initial_fingerprint.clone());

    let existing = match lookup(&initial_fingerprint)? {
        None => return Ok(Resolution::Accepted),
        Some(existing) if !force_import => {
            return Ok(Resolution::Rejected {
                existing: Box::new(existing),
            });
        }
        Some(existing) => existing,
    };

    tracing::debug!(
        "Forcing import of a duplicate of transaction {} ({})",
        existing.id,
        existing.business_name
    );

    if !candidate.notes.contains(DUPLICATE_MARKER) {
        let marker = format!("{DUPLICATE_MARKER} {}", existing.id);
        candidate.notes = if candidate.notes.is_empty() {
            marker
        } else {
            format!("{}\n{marker}", candidate.notes)
        };
    }

    let base_notes = strip_attempt_suffix(&candidate.notes).to_owned();
    let mut attempt = 0;

    loop {
        let new_fingerprint = fingerprint(candidate);

        if lookup(&new_fingerprint)?.is_none() {
            candidate.fingerprint = Some(new_fingerprint);
            return Ok(Resolution::Accepted);
        }

        attempt += 1;
        if attempt > max_attempts {
            break;
        }

        candidate.notes = format!("{base_notes} ({attempt})");
    }

    let timestamp = OffsetDateTime::now_utc().unix_timestamp_nanos();
    tracing::warn!(
        "Fingerprint still collides after {max_attempts} attempts, \
         falling back to timestamp {timestamp}"
    );

    candidate.notes = format!("{base_notes} ({timestamp})");
    candidate.fingerprint = Some(fingerprint(candidate));

    Ok(Resolution::Accepted)
}

/// Remove a trailing attempt counter such as `" (3)"` from `notes`.
fn strip_attempt_suffix(notes: &str) -> &str {
    let Some(without_paren) = notes.strip_suffix(')') else {
        return notes;
    };

    match without_paren.rsplit_once(" (") {
        Some((base, digits))
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => notes,
    }
}

/// Store a single transaction unless it duplicates an existing one.
///
/// With `force_import` a duplicate is stored anyway under a unique
/// fingerprint, see [resolve_duplicate].
///
/// Another writer may store the same fingerprint between the duplicate check
/// and the insert. The UNIQUE constraint on the table catches this and it is
/// reported as a duplicate too.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not a finite number,
/// - [Error::InvalidFlowMonth] if the payment date year is outside 1900-2100
///   and no flow month was set,
/// - [Error::DuplicateTransaction] if the insert hit the UNIQUE constraint but
///   the conflicting row could not be read back,
/// - or [Error::StoreUnavailable] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    force_import: bool,
    max_attempts: u32,
    connection: &Connection,
) -> Result<CreateOutcome, Error> {
    if !builder.amount.is_finite() {
        return Err(Error::InvalidAmount(builder.amount.to_string()));
    }
    resolve_flow_month(&builder)?;

    let mut builder = builder;
    let (user_id, cash_flow_id) = (builder.user_id, builder.cash_flow_id);

    let resolution = resolve_duplicate(&mut builder, force_import, max_attempts, |candidate| {
        find_by_fingerprint(user_id, cash_flow_id, candidate, connection)
    })?;

    if let Resolution::Rejected { existing } = resolution {
        tracing::debug!(
            "Rejected duplicate of transaction {} for user {user_id}",
            existing.id
        );
        return Ok(CreateOutcome::Duplicate {
            existing: *existing,
        });
    }

    let new_fingerprint = match &builder.fingerprint {
        Some(resolved) => resolved.clone(),
        None => fingerprint(&builder),
    };

    match insert_transaction(&builder, &new_fingerprint, connection) {
        Ok(transaction) => Ok(CreateOutcome::Created { transaction }),
        Err(Error::DuplicateTransaction) => {
            tracing::warn!(
                "Fingerprint {new_fingerprint} was stored by another writer before this insert"
            );
            find_by_fingerprint(user_id, cash_flow_id, &new_fingerprint, connection)?
                .map(|existing| CreateOutcome::Duplicate { existing })
                .ok_or(Error::DuplicateTransaction)
        }
        Err(error) => Err(error),
    }
}
