//! The conversation state machine.
//!
//! [`StateMachine::handle`] is total: every (state, event) pair yields a
//! [`Transition`]. Pairs without a defined meaning restate the current prompt.
//! Store failures never leave a half-finished flow behind; the user gets a
//! generic error and the state goes back to `Idle`.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use teloxide::utils::html;

use crate::conversation::event::{AdminCommand, CallbackAction, Decision, Event};
use crate::conversation::reply::{self, Effect, Markup, Reply, Transition};
use crate::conversation::state::ConversationState;
use crate::core::auth::{Authz, Role};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::payment_settings::PaymentSettings;
use crate::i18n::{args, match_any_language, t, t_args, Language};
use crate::storage::catalog::{self, CatalogContent, CatalogItem, Section};
use crate::storage::db::{self, DbPool};
use crate::storage::payments::{self, SubmitOutcome};
use crate::storage::users;

/// Per-event context: the connection, the acting user and their language.
struct Turn<'a> {
    conn: &'a Connection,
    user_id: i64,
    lang: Language,
}

impl Turn<'_> {
    fn t(&self, key: &str) -> String {
        t(self.lang, key)
    }
}

#[derive(Clone)]
pub struct StateMachine {
    db_pool: Arc<DbPool>,
    authz: Authz,
    payment_settings: Arc<PaymentSettings>,
}

impl StateMachine {
    pub fn new(db_pool: Arc<DbPool>, authz: Authz, payment_settings: Arc<PaymentSettings>) -> Self {
        Self {
            db_pool,
            authz,
            payment_settings,
        }
    }

    pub fn authz(&self) -> &Authz {
        &self.authz
    }

    /// Applies `event` to `state` for `user_id`.
    ///
    /// Callers must hold the user's session lock for the duration of the call.
    pub fn handle(&self, user_id: i64, state: ConversationState, event: Event) -> Transition {
        let from = state.tag();
        let kind = event.kind();
        let fallback = state.clone();

        let transition = match self.step(user_id, state, event) {
            Ok(transition) => transition,
            Err(err) => self.recover(user_id, fallback, err),
        };

        log::debug!("user={} {} --{}--> {}", user_id, from, kind, transition.next.tag());
        transition
    }

    fn step(&self, user_id: i64, state: ConversationState, event: Event) -> AppResult<Transition> {
        let conn = db::get_connection(&self.db_pool)?;
        let lang = users::get_language(&conn, user_id)?;
        let turn = Turn {
            conn: &conn,
            user_id,
            lang,
        };

        // Events with the same meaning in every state.
        let event = match event {
            Event::Cancel => return self.finish(&turn, Reply::text(turn.t("action-cancelled"))),
            Event::Start => return self.start(&turn),
            Event::AdminMenu => {
                self.authz.require(turn.conn, user_id, Role::Admin)?;
                return self.prompt(&turn, ConversationState::AdminSelectSection);
            }
            Event::SetPaymentAmount(arg) => return self.set_amount_command(&turn, state, arg),
            Event::Command(command) => return self.command(&turn, state, command),
            Event::Forwarded => {
                return Ok(Transition::to(state)
                    .reply(Reply::DeleteTrigger)
                    .reply(Reply::text(turn.t("forward-prohibited"))));
            }
            Event::Callback(CallbackAction::Payment { user_id: target, decision }) => {
                return Ok(Transition::to(state).effect(Effect::Decide { target, decision }));
            }
            other => other,
        };

        // Admin status can change mid-flow; check it on every event.
        if state.requires_super_admin() {
            self.authz.require(turn.conn, user_id, Role::SuperAdmin)?;
        } else if state.requires_admin() {
            self.authz.require(turn.conn, user_id, Role::Admin)?;
        }

        match state {
            ConversationState::Idle => self.on_idle(&turn, event),
            ConversationState::SelectingLanguage => self.on_selecting_language(&turn, event),
            ConversationState::WaitingForPayment => self.on_waiting_for_payment(&turn, event),
            ConversationState::AdminSelectSection => self.on_admin_menu(&turn, event),
            ConversationState::AdminSelectLanguage { section } => self.on_admin_language(&turn, section, event),
            state @ (ConversationState::AddQuestionText { .. }
            | ConversationState::AddQuestionAnswer { .. }
            | ConversationState::AddQuestionAudio { .. }
            | ConversationState::AddRoadSignImage { .. }
            | ConversationState::AddRoadSignDescription { .. }
            | ConversationState::AddTruckPartImage { .. }
            | ConversationState::AddTruckPartDescription { .. }) => self.on_add_step(&turn, state, event),
            ConversationState::DeleteSelectLanguage => self.on_delete_language(&turn, event),
            ConversationState::DeleteSelectSection { language } => self.on_delete_section(&turn, language, event),
            ConversationState::DeleteSelectItem {
                language,
                section,
                listed,
            } => self.on_delete_item(&turn, language, section, listed, event),
            ConversationState::DeleteConfirm {
                language,
                section,
                item_id,
            } => self.on_delete_confirm(&turn, language, section, item_id, event),
            ConversationState::SetPaymentAmount => self.on_set_amount(&turn, event),
        }
    }

    fn recover(&self, user_id: i64, state: ConversationState, err: AppError) -> Transition {
        let lang = db::get_connection(&self.db_pool)
            .ok()
            .and_then(|conn| users::get_language(&conn, user_id).ok())
            .unwrap_or_default();

        match err {
            AppError::Validation(msg) => {
                log::debug!("user={} rejected input in {}: {}", user_id, state.tag(), msg);
                Transition::to(state).reply(Reply::text(t(lang, "invalid-input")))
            }
            AppError::NotFound(what) => {
                log::info!("user={} stale reference in {}: {}", user_id, state.tag(), what);
                Transition::idle().reply(Reply::text(t(lang, "item-not-found")))
            }
            AppError::Unauthorized(msg) => {
                log::warn!("user={} denied in {}: {}", user_id, state.tag(), msg);
                let next = if state.requires_admin() {
                    ConversationState::Idle
                } else {
                    state
                };
                Transition::to(next).reply(Reply::text(t(lang, "no-permission")))
            }
            err => {
                log::error!("user={} failed in {}: {}", user_id, state.tag(), err);
                Transition::idle().reply(Reply::text(t(lang, "error-occurred")))
            }
        }
    }

    // ── prompts ─────────────────────────────────────────────────────────────

    fn has_access(&self, turn: &Turn<'_>) -> AppResult<bool> {
        let allowed = users::get_user(turn.conn, turn.user_id)?.is_some_and(|u| u.has_access());
        Ok(allowed || self.authz.is_admin(turn.conn, turn.user_id)?)
    }

    /// Idle with the main menu, or the no-access notice.
    fn home(&self, turn: &Turn<'_>) -> AppResult<Transition> {
        self.prompt(turn, ConversationState::Idle)
    }

    fn payment_instructions(&self, turn: &Turn<'_>) -> AppResult<String> {
        let amount = self.payment_settings.get(turn.conn)?;
        let destination = self.payment_settings.destination();
        Ok(t_args(
            turn.lang,
            "payment-required",
            &args([
                ("amount", format!("{:.2}", amount)),
                ("cards", html::escape(&destination.cards)),
                ("owner", html::escape(&destination.owner)),
            ]),
        ))
    }

    fn item_preview(&self, turn: &Turn<'_>, item: &CatalogItem) -> String {
        html::escape(&reply::item_label(turn.lang, item))
    }

    /// Moves to `state` and shows its prompt.
    fn prompt(&self, turn: &Turn<'_>, state: ConversationState) -> AppResult<Transition> {
        let lang = turn.lang;
        let transition = match state {
            ConversationState::Idle => {
                if self.has_access(turn)? {
                    Transition::idle().reply(Reply::with_markup(turn.t("select-section"), Markup::MainMenu(lang)))
                } else {
                    Transition::idle().reply(Reply::text(turn.t("no-access")))
                }
            }
            ConversationState::SelectingLanguage => Transition::to(state).reply(Reply::with_markup(
                turn.t("select-new-language"),
                reply::language_picker(CallbackAction::Language),
            )),
            ConversationState::WaitingForPayment => {
                let text = self.payment_instructions(turn)?;
                Transition::to(state).reply(Reply::with_markup(text, Markup::RemoveKeyboard))
            }
            ConversationState::AdminSelectSection => {
                Transition::to(state).reply(Reply::with_markup(turn.t("admin-welcome"), reply::admin_menu(lang)))
            }
            ConversationState::AdminSelectLanguage { section } => {
                let text = t_args(
                    lang,
                    "admin-choose-language",
                    &args([("section", turn.t(section.label_key()))]),
                );
                Transition::to(state).reply(Reply::with_markup(text, reply::admin_language_picker(lang)))
            }
            ConversationState::AddQuestionText { .. } => {
                Transition::to(state).reply(Reply::text(turn.t("admin-enter-question")))
            }
            ConversationState::AddQuestionAnswer { .. } => {
                Transition::to(state).reply(Reply::text(turn.t("admin-enter-answer")))
            }
            ConversationState::AddQuestionAudio { .. } => {
                Transition::to(state).reply(Reply::text(turn.t("admin-send-audio")))
            }
            ConversationState::AddRoadSignImage { .. } | ConversationState::AddTruckPartImage { .. } => {
                Transition::to(state).reply(Reply::text(turn.t("admin-send-image")))
            }
            ConversationState::AddRoadSignDescription { .. } | ConversationState::AddTruckPartDescription { .. } => {
                Transition::to(state).reply(Reply::text(turn.t("admin-enter-description")))
            }
            ConversationState::DeleteSelectLanguage => Transition::to(state).reply(Reply::with_markup(
                turn.t("delete-choose-language"),
                reply::admin_language_picker(lang),
            )),
            ConversationState::DeleteSelectSection { .. } => Transition::to(state).reply(Reply::with_markup(
                turn.t("delete-choose-section"),
                reply::section_picker(lang),
            )),
            ConversationState::DeleteSelectItem { language, section, .. } => {
                // Re-list so the accepted ids match what is on screen.
                let items = catalog::list_items(turn.conn, section, language)?;
                if items.is_empty() {
                    return Ok(Transition::idle().reply(Reply::text(turn.t("no-data"))));
                }
                let markup = reply::delete_listing(lang, section, &items);
                Transition::to(ConversationState::DeleteSelectItem {
                    language,
                    section,
                    listed: items.iter().map(|i| i.id).collect(),
                })
                .reply(Reply::with_markup(turn.t("delete-choose-item"), markup))
            }
            ConversationState::DeleteConfirm { section, item_id, .. } => {
                let Some(item) = catalog::get_item(turn.conn, section, item_id)? else {
                    return Err(AppError::NotFound(format!("{} id={}", section, item_id)));
                };
                let text = t_args(
                    lang,
                    "delete-confirm",
                    &args([("preview", self.item_preview(turn, &item))]),
                );
                Transition::to(state).reply(Reply::with_markup(text, reply::confirm_delete(lang)))
            }
            ConversationState::SetPaymentAmount => {
                Transition::to(state).reply(Reply::text(turn.t("set-amount-prompt")))
            }
        };
        Ok(transition)
    }

    /// Same as [`prompt`](Self::prompt) but replaces the message whose button was pressed.
    fn prompt_in_place(&self, turn: &Turn<'_>, state: ConversationState) -> AppResult<Transition> {
        let mut transition = self.prompt(turn, state)?;
        if let Some(Reply::Text { text, markup }) = transition.replies.first_mut() {
            let edited = Reply::EditTrigger {
                text: std::mem::take(text),
                markup: std::mem::take(markup),
            };
            transition.replies[0] = edited;
        }
        Ok(transition)
    }

    /// A message, then Idle with the main menu.
    fn finish(&self, turn: &Turn<'_>, first: Reply) -> AppResult<Transition> {
        let home = self.home(turn)?;
        Ok(home.replies.into_iter().fold(Transition::idle().reply(first), Transition::reply))
    }

    fn item_not_found(&self, turn: &Turn<'_>) -> AppResult<Transition> {
        self.finish(turn, Reply::text(turn.t("item-not-found")))
    }

    // ── global commands ─────────────────────────────────────────────────────

    fn start(&self, turn: &Turn<'_>) -> AppResult<Transition> {
        if self.has_access(turn)? {
            return self.home(turn);
        }
        Ok(Transition::to(ConversationState::SelectingLanguage).reply(Reply::with_markup(
            turn.t("welcome"),
            reply::language_picker(CallbackAction::Language),
        )))
    }

    fn set_amount_command(
        &self,
        turn: &Turn<'_>,
        state: ConversationState,
        arg: Option<String>,
    ) -> AppResult<Transition> {
        self.authz.require(turn.conn, turn.user_id, Role::SuperAdmin)?;
        match arg.filter(|a| !a.trim().is_empty()) {
            None => self.prompt(turn, ConversationState::SetPaymentAmount),
            Some(raw) => match self.payment_settings.set_from_text(turn.conn, &raw) {
                Ok(amount) => Ok(Transition::to(state).reply(Reply::text(self.amount_updated(turn, amount)))),
                Err(AppError::Validation(_)) => Ok(Transition::to(state).reply(Reply::text(turn.t("amount-invalid")))),
                Err(err) => Err(err),
            },
        }
    }

    fn amount_updated(&self, turn: &Turn<'_>, amount: f64) -> String {
        t_args(turn.lang, "amount-updated", &args([("amount", format!("{:.2}", amount))]))
    }

    fn usage(&self, turn: &Turn<'_>, usage: &'static str) -> Reply {
        Reply::text(t_args(turn.lang, "command-usage", &args([("usage", usage)])))
    }

    /// Admin commands leave the conversation state untouched.
    fn command(&self, turn: &Turn<'_>, state: ConversationState, command: AdminCommand) -> AppResult<Transition> {
        let stay = Transition::to(state);
        match command {
            AdminCommand::SetAdmin(target) => {
                self.authz.require(turn.conn, turn.user_id, Role::SuperAdmin)?;
                let Some(target) = target else {
                    return Ok(stay.reply(self.usage(turn, "/setadmin <user_id>")));
                };
                users::set_admin(turn.conn, target)?;
                log::info!("User {} promoted to admin by {}", target, turn.user_id);
                Ok(stay.reply(Reply::text(t_args(
                    turn.lang,
                    "set-admin-done",
                    &args([("user_id", target.to_string())]),
                ))))
            }
            AdminCommand::Revoke(target) => {
                self.authz.require(turn.conn, turn.user_id, Role::SuperAdmin)?;
                let Some(target) = target else {
                    return Ok(stay.reply(self.usage(turn, "/revoke <user_id>")));
                };
                let key = if users::set_allowed(turn.conn, target, false)? {
                    log::info!("Access of user {} revoked by {}", target, turn.user_id);
                    "revoke-done"
                } else {
                    "user-not-found"
                };
                Ok(stay.reply(Reply::text(t_args(
                    turn.lang,
                    key,
                    &args([("user_id", target.to_string())]),
                ))))
            }
            AdminCommand::Decide(target, decision) => {
                let Some(target) = target else {
                    let usage = match decision {
                        Decision::Allow => "/allow <user_id>",
                        Decision::Disallow => "/disallow <user_id>",
                    };
                    return Ok(stay.reply(self.usage(turn, usage)));
                };
                Ok(stay.effect(Effect::Decide { target, decision }))
            }
            AdminCommand::Stats => {
                self.authz.require(turn.conn, turn.user_id, Role::Admin)?;
                Ok(stay.reply(Reply::text(self.stats_text(turn)?)))
            }
            AdminCommand::ReloadConfig => {
                self.authz.require(turn.conn, turn.user_id, Role::Admin)?;
                self.payment_settings.reload();
                let amount = self.payment_settings.get(turn.conn)?;
                let destination = self.payment_settings.destination();
                Ok(stay.reply(Reply::text(t_args(
                    turn.lang,
                    "config-reloaded",
                    &args([
                        ("amount", format!("{:.2}", amount)),
                        ("cards", html::escape(&destination.cards)),
                        ("owner", html::escape(&destination.owner)),
                    ]),
                ))))
            }
        }
    }

    fn stats_text(&self, turn: &Turn<'_>) -> AppResult<String> {
        let stats = users::user_stats(turn.conn, Utc::now())?;
        let pending = payments::count_pending(turn.conn)?;
        Ok(t_args(
            turn.lang,
            "stats",
            &args([
                ("total", stats.total.to_string()),
                ("allowed", stats.allowed.to_string()),
                ("new_day", stats.new_day.to_string()),
                ("new_week", stats.new_week.to_string()),
                ("new_month", stats.new_month.to_string()),
                ("active_day", stats.active_day.to_string()),
                ("active_week", stats.active_week.to_string()),
                ("active_month", stats.active_month.to_string()),
                ("pending", pending.to_string()),
            ]),
        ))
    }

    // ── user states ─────────────────────────────────────────────────────────

    fn on_idle(&self, turn: &Turn<'_>, event: Event) -> AppResult<Transition> {
        match event {
            Event::Text(text) => {
                if match_any_language("menu-language", &text) {
                    return self.prompt(turn, ConversationState::SelectingLanguage);
                }
                match Section::all().find(|s| match_any_language(s.menu_key(), &text)) {
                    Some(section) => self.browse(turn, section, 1, false),
                    None => self.home(turn),
                }
            }
            Event::Callback(CallbackAction::Page { section, page }) => self.browse(turn, section, page, true),
            Event::Callback(CallbackAction::Item { section, id }) => self.show_item(turn, section, id),
            Event::Callback(CallbackAction::Menu) => {
                let home = self.home(turn)?;
                Ok(home.replies.into_iter().fold(
                    Transition::idle().reply(Reply::DeleteTrigger),
                    Transition::reply,
                ))
            }
            Event::Callback(CallbackAction::Language(language)) => self.select_language(turn, language),
            _ => self.home(turn),
        }
    }

    fn browse(&self, turn: &Turn<'_>, section: Section, page: usize, in_place: bool) -> AppResult<Transition> {
        if !self.has_access(turn)? {
            return Ok(Transition::idle().reply(Reply::text(turn.t("no-access"))));
        }
        let page = catalog::list_page(turn.conn, section, turn.lang, page, config::catalog::PAGE_SIZE)?;
        if page.total == 0 {
            return Ok(Transition::idle().reply(Reply::text(turn.t("no-data"))));
        }

        let text = turn.t(section.list_key());
        let markup = reply::catalog_page(turn.lang, section, &page);
        let listing = if in_place {
            Reply::EditTrigger { text, markup }
        } else {
            Reply::with_markup(text, markup)
        };
        Ok(Transition::idle().reply(listing))
    }

    fn show_item(&self, turn: &Turn<'_>, section: Section, id: i64) -> AppResult<Transition> {
        if !self.has_access(turn)? {
            return Ok(Transition::idle().reply(Reply::text(turn.t("no-access"))));
        }
        let Some(item) = catalog::get_item(turn.conn, section, id)? else {
            return Ok(Transition::idle().reply(Reply::Alert(turn.t("item-not-found"))));
        };

        let transition = match item.content {
            CatalogContent::Question { text, answer, audio } => {
                let body = format!(
                    "{} #{}\n{}\n\n{}\n{}",
                    turn.t("question-label"),
                    item.display_id,
                    html::escape(&text),
                    turn.t("answer-label"),
                    html::escape(&answer)
                );
                let mut transition = Transition::idle().reply(Reply::text(body));
                if let Some(file_id) = audio {
                    transition = transition.reply(Reply::Audio {
                        file_id,
                        caption: Some(turn.t("audio-caption")),
                    });
                }
                transition
            }
            CatalogContent::RoadSign { image, description } | CatalogContent::TruckPart { image, description } => {
                let label_key = match section {
                    Section::RoadSign => "road-sign-label",
                    _ => "truck-part-label",
                };
                let description = description
                    .filter(|d| !d.trim().is_empty())
                    .map(|d| html::escape(&d))
                    .unwrap_or_else(|| turn.t("no-description"));
                Transition::idle().reply(Reply::Photo {
                    file_id: image,
                    caption: Some(format!(
                        "<b>{} #{}</b>\n{}",
                        turn.t(label_key),
                        item.display_id,
                        description
                    )),
                    markup: Markup::None,
                })
            }
        };
        Ok(transition)
    }

    fn select_language(&self, turn: &Turn<'_>, language: Language) -> AppResult<Transition> {
        users::set_language(turn.conn, turn.user_id, language)?;
        let turn = Turn {
            conn: turn.conn,
            user_id: turn.user_id,
            lang: language,
        };

        let next = if self.has_access(&turn)? {
            ConversationState::Idle
        } else {
            ConversationState::WaitingForPayment
        };
        let then = self.prompt(&turn, next)?;
        let head = Transition::to(then.next.clone())
            .reply(Reply::DeleteTrigger)
            .reply(Reply::text(turn.t("language-saved")));
        Ok(then.replies.into_iter().fold(head, Transition::reply))
    }

    fn on_selecting_language(&self, turn: &Turn<'_>, event: Event) -> AppResult<Transition> {
        match event {
            Event::Callback(CallbackAction::Language(language)) => self.select_language(turn, language),
            _ => self.prompt(turn, ConversationState::SelectingLanguage),
        }
    }

    fn on_waiting_for_payment(&self, turn: &Turn<'_>, event: Event) -> AppResult<Transition> {
        if self.has_access(turn)? {
            return self.home(turn);
        }
        match event {
            Event::Photo { file_id } => {
                let amount = self.payment_settings.get(turn.conn)?;
                match payments::submit(turn.conn, turn.user_id, &file_id, amount)? {
                    SubmitOutcome::Created(submission) => Ok(Transition::idle()
                        .reply(Reply::text(turn.t("payment-received")))
                        .effect(Effect::AnnounceSubmission(submission))),
                    SubmitOutcome::AlreadyPending(existing) => {
                        log::info!(
                            "User {} sent another proof while submission {} is pending",
                            turn.user_id,
                            existing.id
                        );
                        Ok(Transition::idle().reply(Reply::text(turn.t("payment-already-pending"))))
                    }
                }
            }
            Event::Text(text) if match_any_language("menu-language", &text) => {
                self.prompt(turn, ConversationState::SelectingLanguage)
            }
            Event::Callback(CallbackAction::Language(language)) => self.select_language(turn, language),
            _ => self.prompt(turn, ConversationState::WaitingForPayment),
        }
    }

    // ── admin: menu and add flow ────────────────────────────────────────────

    fn on_admin_menu(&self, turn: &Turn<'_>, event: Event) -> AppResult<Transition> {
        match event {
            Event::Callback(CallbackAction::AdminAdd(section)) => {
                self.prompt_in_place(turn, ConversationState::AdminSelectLanguage { section })
            }
            Event::Callback(CallbackAction::AdminDelete) => {
                self.prompt_in_place(turn, ConversationState::DeleteSelectLanguage)
            }
            Event::Callback(CallbackAction::AdminPayments) => {
                Ok(Transition::idle().reply(Reply::DeleteTrigger).effect(Effect::ShowPendingPayments))
            }
            Event::Callback(CallbackAction::AdminAmount) => {
                self.authz.require(turn.conn, turn.user_id, Role::SuperAdmin)?;
                self.prompt_in_place(turn, ConversationState::SetPaymentAmount)
            }
            Event::Callback(CallbackAction::AdminStats) => {
                let stats = self.stats_text(turn)?;
                Ok(Transition::idle().reply(Reply::EditTrigger {
                    text: stats,
                    markup: Markup::None,
                }))
            }
            _ => self.prompt(turn, ConversationState::AdminSelectSection),
        }
    }

    fn on_admin_language(&self, turn: &Turn<'_>, section: Section, event: Event) -> AppResult<Transition> {
        match event {
            Event::Callback(CallbackAction::AdminLanguage(language)) => {
                self.prompt_in_place(turn, ConversationState::add_entry(section, language))
            }
            Event::Callback(CallbackAction::AdminBack) => {
                self.prompt_in_place(turn, ConversationState::AdminSelectSection)
            }
            _ => self.prompt(turn, ConversationState::AdminSelectLanguage { section }),
        }
    }

    fn save_item(&self, turn: &Turn<'_>, language: Language, content: CatalogContent) -> AppResult<Transition> {
        let item = catalog::add_item(turn.conn, language, content)?;
        let saved = t_args(
            turn.lang,
            "admin-item-saved",
            &args([
                ("section", turn.t(item.section().label_key())),
                ("number", item.display_id.to_string()),
            ]),
        );
        self.finish(turn, Reply::text(saved))
    }

    fn on_add_step(&self, turn: &Turn<'_>, state: ConversationState, event: Event) -> AppResult<Transition> {
        use ConversationState as S;

        let text = match &event {
            Event::Text(raw) => Some(raw.trim().to_string()).filter(|t| !t.is_empty()),
            _ => None,
        };

        match (state, text, event) {
            (S::AddQuestionText { language }, Some(text), _) => self.prompt(turn, S::AddQuestionAnswer { language, text }),
            (S::AddQuestionAnswer { language, text }, Some(answer), _) => {
                self.prompt(turn, S::AddQuestionAudio { language, text, answer })
            }
            (S::AddQuestionAudio { language, text, answer }, _, Event::Audio { file_id }) => self.save_item(
                turn,
                language,
                CatalogContent::Question {
                    text,
                    answer,
                    audio: Some(file_id),
                },
            ),
            (S::AddQuestionAudio { language, text, answer }, _, Event::Skip) => self.save_item(
                turn,
                language,
                CatalogContent::Question {
                    text,
                    answer,
                    audio: None,
                },
            ),
            (S::AddRoadSignImage { language }, _, Event::Photo { file_id }) => {
                self.prompt(turn, S::AddRoadSignDescription { language, image: file_id })
            }
            (S::AddRoadSignDescription { language, image }, description, Event::Text(_) | Event::Skip) => {
                self.save_item(turn, language, CatalogContent::RoadSign { image, description })
            }
            (S::AddTruckPartImage { language }, _, Event::Photo { file_id }) => {
                self.prompt(turn, S::AddTruckPartDescription { language, image: file_id })
            }
            (S::AddTruckPartDescription { language, image }, description, Event::Text(_) | Event::Skip) => {
                self.save_item(turn, language, CatalogContent::TruckPart { image, description })
            }
            (state, _, _) => self.prompt(turn, state),
        }
    }

    // ── admin: delete flow ──────────────────────────────────────────────────

    fn on_delete_language(&self, turn: &Turn<'_>, event: Event) -> AppResult<Transition> {
        match event {
            Event::Callback(CallbackAction::AdminLanguage(language)) => {
                self.prompt_in_place(turn, ConversationState::DeleteSelectSection { language })
            }
            Event::Callback(CallbackAction::AdminBack) => {
                self.prompt_in_place(turn, ConversationState::AdminSelectSection)
            }
            _ => self.prompt(turn, ConversationState::DeleteSelectLanguage),
        }
    }

    fn on_delete_section(&self, turn: &Turn<'_>, language: Language, event: Event) -> AppResult<Transition> {
        match event {
            Event::Callback(CallbackAction::AdminSection(section)) => self.prompt_in_place(
                turn,
                ConversationState::DeleteSelectItem {
                    language,
                    section,
                    listed: Vec::new(),
                },
            ),
            _ => self.prompt(turn, ConversationState::DeleteSelectSection { language }),
        }
    }

    fn on_delete_item(
        &self,
        turn: &Turn<'_>,
        language: Language,
        section: Section,
        listed: Vec<i64>,
        event: Event,
    ) -> AppResult<Transition> {
        match event {
            Event::Callback(CallbackAction::DeleteItem { section: picked, id }) => {
                if picked != section || !listed.contains(&id) {
                    log::info!("Admin {} picked {} id={} outside the current listing", turn.user_id, picked, id);
                    return self.item_not_found(turn);
                }
                match catalog::get_item(turn.conn, section, id)? {
                    Some(item) if item.language == language => self.prompt_in_place(
                        turn,
                        ConversationState::DeleteConfirm {
                            language,
                            section,
                            item_id: id,
                        },
                    ),
                    _ => self.item_not_found(turn),
                }
            }
            _ => self.prompt(
                turn,
                ConversationState::DeleteSelectItem {
                    language,
                    section,
                    listed,
                },
            ),
        }
    }

    fn on_delete_confirm(
        &self,
        turn: &Turn<'_>,
        language: Language,
        section: Section,
        item_id: i64,
        event: Event,
    ) -> AppResult<Transition> {
        match event {
            Event::Callback(CallbackAction::DeleteConfirm) => match catalog::delete_item(turn.conn, section, item_id)? {
                Some(item) => {
                    let done = t_args(
                        turn.lang,
                        "delete-done",
                        &args([
                            ("section", turn.t(section.label_key())),
                            ("number", item.display_id.to_string()),
                        ]),
                    );
                    self.finish(
                        turn,
                        Reply::EditTrigger {
                            text: done,
                            markup: Markup::None,
                        },
                    )
                }
                None => self.item_not_found(turn),
            },
            Event::Callback(CallbackAction::DeleteCancel) => self.finish(
                turn,
                Reply::EditTrigger {
                    text: turn.t("delete-cancelled"),
                    markup: Markup::None,
                },
            ),
            _ => self.prompt(
                turn,
                ConversationState::DeleteConfirm {
                    language,
                    section,
                    item_id,
                },
            ),
        }
    }

    // ── super-admin: payment amount ─────────────────────────────────────────

    fn on_set_amount(&self, turn: &Turn<'_>, event: Event) -> AppResult<Transition> {
        match event {
            Event::Text(raw) => match self.payment_settings.set_from_text(turn.conn, &raw) {
                Ok(amount) => self.finish(turn, Reply::text(self.amount_updated(turn, amount))),
                Err(AppError::Validation(_)) => Ok(Transition::to(ConversationState::SetPaymentAmount)
                    .reply(Reply::text(turn.t("amount-invalid")))),
                Err(err) => Err(err),
            },
            _ => self.prompt(turn, ConversationState::SetPaymentAmount),
        }
    }
}
