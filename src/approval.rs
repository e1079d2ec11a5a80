//! Payment approval: announcing submissions to admins and applying decisions.
//!
//! A decision is committed before anyone is told about it. The status change
//! and the access grant share one `IMMEDIATE` transaction guarded by the
//! pending-status predicate, so of two admins deciding the same submission
//! exactly one succeeds and a crash cannot leave an approved payment without
//! access. Notifying the user and updating the admin cards happens afterwards
//! and only logs on failure.

use std::sync::Arc;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use teloxide::utils::html;

use crate::conversation::event::Decision;
use crate::conversation::reply::{self, Markup};
use crate::core::auth::{Authz, Role};
use crate::core::error::{AppError, AppResult};
use crate::i18n::{args, t, t_args, Language};
use crate::storage::db::{self, DbPool};
use crate::storage::payments::{self, CardRef, PaymentStatus, PaymentSubmission};
use crate::storage::users;
use crate::telegram::transport::Transport;

#[derive(Debug, Clone, PartialEq)]
pub enum DecideOutcome {
    Decided(PaymentSubmission),
    /// The user had no pending submission, or another admin got there first.
    NothingPending,
}

/// Messages to send once a decision is committed.
struct FollowUp {
    user_lang: Language,
    cards: Vec<(CardRef, String)>,
}

#[derive(Clone)]
pub struct ApprovalCoordinator {
    db_pool: Arc<DbPool>,
    authz: Authz,
    transport: Arc<dyn Transport>,
}

impl ApprovalCoordinator {
    pub fn new(db_pool: Arc<DbPool>, authz: Authz, transport: Arc<dyn Transport>) -> Self {
        Self {
            db_pool,
            authz,
            transport,
        }
    }

    /// Approves or rejects `target`'s pending submission on behalf of `admin_id`.
    pub async fn decide(&self, admin_id: i64, target: i64, decision: Decision) -> AppResult<DecideOutcome> {
        let (submission, follow_up) = {
            let conn = db::get_connection(&self.db_pool)?;
            self.authz.require(&conn, admin_id, Role::Admin)?;

            let Some(submission) = commit_decision(&conn, admin_id, target, decision)? else {
                log::info!("Admin {} found no pending payment for user {}", admin_id, target);
                return Ok(DecideOutcome::NothingPending);
            };
            log::info!(
                "Payment #{} of user {} {} by admin {}",
                submission.id,
                target,
                submission.status,
                admin_id
            );

            let follow_up = match prepare_follow_up(&conn, &submission, decision) {
                Ok(follow_up) => Some(follow_up),
                Err(e) => {
                    log::error!("Decision on payment #{} saved but notices not sent: {}", submission.id, e);
                    None
                }
            };
            (submission, follow_up)
        };

        if let Some(follow_up) = follow_up {
            self.deliver_follow_up(&submission, decision, follow_up).await;
        }
        Ok(DecideOutcome::Decided(submission))
    }

    /// Runs [`decide`](Self::decide) and tells the admin how it went.
    pub async fn decide_and_report(&self, admin_id: i64, target: i64, decision: Decision) -> AppResult<()> {
        let key = match self.decide(admin_id, target, decision).await {
            Ok(DecideOutcome::Decided(_)) => match decision {
                Decision::Allow => "decision-approved",
                Decision::Disallow => "decision-rejected",
            },
            Ok(DecideOutcome::NothingPending) | Err(AppError::NotFound(_)) => "decision-not-found",
            Err(AppError::Unauthorized(_)) => "no-permission",
            Err(e) => {
                log::error!("Decision by admin {} on user {} failed: {}", admin_id, target, e);
                "error-occurred"
            }
        };
        let lang = self.language_of(admin_id);
        self.transport.send_text(admin_id, &t(lang, key), &Markup::None).await?;
        Ok(())
    }

    /// Sends a decision card for a fresh submission to every admin.
    ///
    /// Returns how many admins received it.
    pub async fn announce(&self, submission: &PaymentSubmission) -> AppResult<usize> {
        let (username, recipients) = {
            let conn = db::get_connection(&self.db_pool)?;
            let username = username_of(&conn, submission.telegram_id)?;
            let recipients = self
                .authz
                .admin_ids(&conn)?
                .into_iter()
                .map(|id| Ok((id, users::get_language(&conn, id)?)))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            (username, recipients)
        };

        let mut delivered = 0;
        for (admin_id, lang) in recipients {
            if self.send_card(admin_id, lang, submission, &username).await {
                delivered += 1;
            }
        }
        log::info!(
            "Payment #{} of user {} announced to {} admins",
            submission.id,
            submission.telegram_id,
            delivered
        );
        Ok(delivered)
    }

    /// Re-sends every pending submission to one admin.
    pub async fn show_pending(&self, admin_id: i64) -> AppResult<usize> {
        let (lang, pending) = {
            let conn = db::get_connection(&self.db_pool)?;
            self.authz.require(&conn, admin_id, Role::Admin)?;
            let lang = users::get_language(&conn, admin_id)?;
            let pending = payments::list_pending(&conn)?
                .into_iter()
                .map(|s| Ok((username_of(&conn, s.telegram_id)?, s)))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            (lang, pending)
        };

        if pending.is_empty() {
            self.transport
                .send_text(admin_id, &t(lang, "payment-list-empty"), &Markup::None)
                .await?;
            return Ok(0);
        }

        let header = t_args(lang, "payment-list-header", &args([("count", pending.len().to_string())]));
        self.transport.send_text(admin_id, &header, &Markup::None).await?;
        for (username, submission) in &pending {
            self.send_card(admin_id, lang, submission, username).await;
        }
        Ok(pending.len())
    }

    async fn send_card(&self, admin_id: i64, lang: Language, submission: &PaymentSubmission, username: &str) -> bool {
        let caption = card_caption(lang, submission, username);
        let markup = reply::payment_decision(lang, submission.telegram_id);
        match self
            .transport
            .send_photo(admin_id, &submission.proof_file_id, Some(&caption), &markup)
            .await
        {
            Ok(card) => {
                if let Err(e) = self.remember_card(submission.id, card) {
                    log::warn!("Card for payment #{} not recorded: {}", submission.id, e);
                }
                true
            }
            Err(e) => {
                log::warn!("Failed to send payment #{} to admin {}: {}", submission.id, admin_id, e);
                false
            }
        }
    }

    async fn deliver_follow_up(&self, submission: &PaymentSubmission, decision: Decision, follow_up: FollowUp) {
        let target = submission.telegram_id;
        let lang = follow_up.user_lang;
        let (text, markup) = match decision {
            Decision::Allow => (t(lang, "access-granted"), Markup::MainMenu(lang)),
            Decision::Disallow => (t(lang, "payment-rejected"), Markup::None),
        };
        if let Err(e) = self.transport.send_text(target, &text, &markup).await {
            log::warn!("Failed to notify user {} about payment #{}: {}", target, submission.id, e);
        }

        for (card, caption) in follow_up.cards {
            if let Err(e) = self.transport.edit_message_caption(card, &caption).await {
                log::warn!(
                    "Failed to update card {}/{} for payment #{}: {}",
                    card.chat_id,
                    card.message_id,
                    submission.id,
                    e
                );
            }
        }
    }

    fn remember_card(&self, submission_id: i64, card: CardRef) -> AppResult<()> {
        let conn = db::get_connection(&self.db_pool)?;
        payments::record_card(&conn, submission_id, card)?;
        Ok(())
    }

    fn language_of(&self, user_id: i64) -> Language {
        db::get_connection(&self.db_pool)
            .map_err(AppError::from)
            .and_then(|conn| Ok(users::get_language(&conn, user_id)?))
            .unwrap_or_default()
    }
}

/// The compare-and-swap on the pending row plus the access grant, atomically.
fn commit_decision(
    conn: &Connection,
    admin_id: i64,
    target: i64,
    decision: Decision,
) -> rusqlite::Result<Option<PaymentSubmission>> {
    let status = match decision {
        Decision::Allow => PaymentStatus::Approved,
        Decision::Disallow => PaymentStatus::Rejected,
    };
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let resolved = payments::resolve_pending(&tx, target, status, admin_id)?;
    if resolved.is_some() && decision == Decision::Allow {
        users::set_allowed(&tx, target, true)?;
    }
    tx.commit()?;
    Ok(resolved)
}

fn prepare_follow_up(conn: &Connection, submission: &PaymentSubmission, decision: Decision) -> rusqlite::Result<FollowUp> {
    let username = username_of(conn, submission.telegram_id)?;
    let mark = match decision {
        Decision::Allow => "card-approved",
        Decision::Disallow => "card-rejected",
    };
    let cards = payments::cards_for(conn, submission.id)?
        .into_iter()
        .map(|card| {
            let lang = users::get_language(conn, card.chat_id)?;
            let caption = format!("{}\n\n<b>{}</b>", card_caption(lang, submission, &username), t(lang, mark));
            Ok((card, caption))
        })
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(FollowUp {
        user_lang: users::get_language(conn, submission.telegram_id)?,
        cards,
    })
}

fn username_of(conn: &Connection, telegram_id: i64) -> rusqlite::Result<String> {
    Ok(users::get_user(conn, telegram_id)?
        .map(|u| u.display_name())
        .unwrap_or_else(|| telegram_id.to_string()))
}

pub fn card_caption(lang: Language, submission: &PaymentSubmission, username: &str) -> String {
    t_args(
        lang,
        "payment-card",
        &args([
            ("user_id", submission.telegram_id.to_string()),
            ("username", html::escape(username)),
            ("amount", format!("{:.2}", submission.amount)),
            ("time", submission.created_at.clone()),
        ]),
    )
}
