//! Payment ledger: proof-of-payment submissions and their admin-facing cards.
//!
//! Rows are never deleted. A user has at most one `pending` submission; the
//! partial unique index `idx_payment_one_pending` backs the check in [`submit`].

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSubmission {
    pub id: i64,
    pub telegram_id: i64,
    pub proof_file_id: String,
    pub amount: f64,
    pub status: PaymentStatus,
    pub created_at: String,
    pub decided_at: Option<String>,
    pub decided_by: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(PaymentSubmission),
    /// Nothing was written; the existing pending submission is returned.
    AlreadyPending(PaymentSubmission),
}

/// Message showing a submission to one admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardRef {
    pub chat_id: i64,
    pub message_id: i32,
}

const SUBMISSION_COLUMNS: &str =
    "id, telegram_id, proof_file_id, amount, status, created_at, decided_at, decided_by";

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentSubmission> {
    let status: String = row.get(4)?;
    Ok(PaymentSubmission {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        proof_file_id: row.get(2)?,
        amount: row.get(3)?,
        status: status.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown payment status {status:?}").into(),
            )
        })?,
        created_at: row.get(5)?,
        decided_at: row.get(6)?,
        decided_by: row.get(7)?,
    })
}

pub fn pending_for(conn: &Connection, telegram_id: i64) -> rusqlite::Result<Option<PaymentSubmission>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM payment_submissions WHERE telegram_id = ?1 AND status = 'pending'",
            SUBMISSION_COLUMNS
        ),
        params![telegram_id],
        parse_row,
    )
    .optional()
}

/// Records a proof of payment unless the user already has one pending.
pub fn submit(conn: &Connection, telegram_id: i64, proof_file_id: &str, amount: f64) -> rusqlite::Result<SubmitOutcome> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    if let Some(existing) = pending_for(&tx, telegram_id)? {
        return Ok(SubmitOutcome::AlreadyPending(existing));
    }

    let submission = tx.query_row(
        &format!(
            "INSERT INTO payment_submissions (telegram_id, proof_file_id, amount) VALUES (?1, ?2, ?3)
             RETURNING {}",
            SUBMISSION_COLUMNS
        ),
        params![telegram_id, proof_file_id, amount],
        parse_row,
    )?;
    tx.commit()?;

    log::info!(
        "Payment submission {} from user {} ({:.2})",
        submission.id,
        telegram_id,
        amount
    );
    Ok(SubmitOutcome::Created(submission))
}

/// Moves the user's pending submission to `status`.
///
/// Check and update are one statement guarded by `status = 'pending'`, so of
/// two concurrent callers exactly one gets the row back and the other `None`.
pub fn resolve_pending(
    conn: &Connection,
    telegram_id: i64,
    status: PaymentStatus,
    decided_by: i64,
) -> rusqlite::Result<Option<PaymentSubmission>> {
    conn.query_row(
        &format!(
            "UPDATE payment_submissions
             SET status = ?2, decided_at = datetime('now'), decided_by = ?3
             WHERE telegram_id = ?1 AND status = 'pending'
             RETURNING {}",
            SUBMISSION_COLUMNS
        ),
        params![telegram_id, status.as_ref(), decided_by],
        parse_row,
    )
    .optional()
}

/// Pending submissions, oldest first.
pub fn list_pending(conn: &Connection) -> rusqlite::Result<Vec<PaymentSubmission>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payment_submissions WHERE status = 'pending' ORDER BY created_at, id",
        SUBMISSION_COLUMNS
    ))?;
    let rows = stmt.query_map([], parse_row)?;
    rows.collect()
}

pub fn count_pending(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM payment_submissions WHERE status = 'pending'",
        [],
        |row| row.get(0),
    )
}

/// Every submission of a user, newest first.
pub fn history_for(conn: &Connection, telegram_id: i64) -> rusqlite::Result<Vec<PaymentSubmission>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payment_submissions WHERE telegram_id = ?1 ORDER BY id DESC",
        SUBMISSION_COLUMNS
    ))?;
    let rows = stmt.query_map(params![telegram_id], parse_row)?;
    rows.collect()
}

pub fn record_card(conn: &Connection, submission_id: i64, card: CardRef) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO payment_cards (submission_id, chat_id, message_id) VALUES (?1, ?2, ?3)",
        params![submission_id, card.chat_id, card.message_id],
    )?;
    Ok(())
}

pub fn cards_for(conn: &Connection, submission_id: i64) -> rusqlite::Result<Vec<CardRef>> {
    let mut stmt = conn.prepare(
        "SELECT chat_id, message_id FROM payment_cards WHERE submission_id = ?1 ORDER BY chat_id, message_id",
    )?;
    let rows = stmt.query_map(params![submission_id], |row| {
        Ok(CardRef {
            chat_id: row.get(0)?,
            message_id: row.get(1)?,
        })
    })?;
    rows.collect()
}
