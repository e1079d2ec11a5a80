//! Machine output: what to say, what to show and what to do next.
//!
//! Nothing here knows about Telegram; `telegram::keyboards` renders [`Markup`]
//! and the dispatch front executes [`Reply`] and [`Effect`].

use crate::conversation::event::{CallbackAction, Decision};
use crate::conversation::state::ConversationState;
use crate::core::config;
use crate::i18n::{t, Language};
use crate::storage::catalog::{CatalogItem, Page, Section};
use crate::storage::payments::PaymentSubmission;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: CallbackAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Markup {
    #[default]
    None,
    /// Persistent reply keyboard with the catalog sections and language settings.
    MainMenu(Language),
    RemoveKeyboard,
    Inline(Vec<Vec<Button>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        text: String,
        markup: Markup,
    },
    Photo {
        file_id: String,
        caption: Option<String>,
        markup: Markup,
    },
    Audio {
        file_id: String,
        caption: Option<String>,
    },
    /// Replace the message that carried the pressed button.
    EditTrigger {
        text: String,
        markup: Markup,
    },
    /// Remove the message that carried the pressed button (or the forwarded message).
    DeleteTrigger,
    /// Popup answer to the pressed button.
    Alert(String),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            markup: Markup::None,
        }
    }

    pub fn with_markup(text: impl Into<String>, markup: Markup) -> Self {
        Reply::Text {
            text: text.into(),
            markup,
        }
    }
}

/// Work that needs the transport beyond replying to the acting user.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send the new submission to every admin as a decision card.
    AnnounceSubmission(PaymentSubmission),
    /// Re-send every pending submission to the acting admin.
    ShowPendingPayments,
    Decide { target: i64, decision: Decision },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: ConversationState,
    pub replies: Vec<Reply>,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn to(next: ConversationState) -> Self {
        Self {
            next,
            replies: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn idle() -> Self {
        Self::to(ConversationState::Idle)
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.replies.push(reply);
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

// ── keyboards ───────────────────────────────────────────────────────────────

pub fn language_picker(action: fn(Language) -> CallbackAction) -> Markup {
    Markup::Inline(
        Language::all()
            .map(|lang| vec![Button::new(lang.native_name(), action(lang))])
            .collect(),
    )
}

pub fn admin_menu(lang: Language) -> Markup {
    let row = |key: &str, action| vec![Button::new(t(lang, key), action)];
    Markup::Inline(vec![
        row("admin-btn-add-question", CallbackAction::AdminAdd(Section::Question)),
        row("admin-btn-add-road-sign", CallbackAction::AdminAdd(Section::RoadSign)),
        row("admin-btn-add-truck-part", CallbackAction::AdminAdd(Section::TruckPart)),
        row("admin-btn-delete", CallbackAction::AdminDelete),
        row("admin-btn-payments", CallbackAction::AdminPayments),
        row("admin-btn-amount", CallbackAction::AdminAmount),
        row("admin-btn-stats", CallbackAction::AdminStats),
    ])
}

/// Admin language picker with a way back to the admin menu.
pub fn admin_language_picker(lang: Language) -> Markup {
    let mut rows: Vec<Vec<Button>> = Language::all()
        .map(|l| vec![Button::new(l.native_name(), CallbackAction::AdminLanguage(l))])
        .collect();
    rows.push(vec![Button::new(t(lang, "nav-back"), CallbackAction::AdminBack)]);
    Markup::Inline(rows)
}

pub fn section_picker(lang: Language) -> Markup {
    Markup::Inline(
        Section::all()
            .map(|s| vec![Button::new(t(lang, s.menu_key()), CallbackAction::AdminSection(s))])
            .collect(),
    )
}

pub fn confirm_delete(lang: Language) -> Markup {
    Markup::Inline(vec![vec![
        Button::new(t(lang, "btn-confirm"), CallbackAction::DeleteConfirm),
        Button::new(t(lang, "btn-cancel"), CallbackAction::DeleteCancel),
    ]])
}

pub fn payment_decision(lang: Language, user_id: i64) -> Markup {
    Markup::Inline(vec![vec![
        Button::new(
            t(lang, "btn-allow"),
            CallbackAction::Payment {
                user_id,
                decision: Decision::Allow,
            },
        ),
        Button::new(
            t(lang, "btn-disallow"),
            CallbackAction::Payment {
                user_id,
                decision: Decision::Disallow,
            },
        ),
    ]])
}

/// Shortens `text` to `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// `#<display>: <preview>` as shown on listing buttons.
pub fn item_label(lang: Language, item: &CatalogItem) -> String {
    let preview = item
        .content
        .summary()
        .map(|s| truncate_chars(s, config::catalog::PREVIEW_CHARS))
        .unwrap_or_else(|| t(lang, "no-description"));
    format!("#{}: {}", item.display_id, preview)
}

/// One button per item plus previous/next and back-to-menu.
pub fn catalog_page(lang: Language, section: Section, page: &Page) -> Markup {
    let mut rows: Vec<Vec<Button>> = page
        .items
        .iter()
        .map(|item| {
            vec![Button::new(
                item_label(lang, item),
                CallbackAction::Item { section, id: item.id },
            )]
        })
        .collect();

    let mut nav = Vec::new();
    if page.has_previous() {
        nav.push(Button::new(
            t(lang, "nav-previous"),
            CallbackAction::Page {
                section,
                page: page.page - 1,
            },
        ));
    }
    if page.has_next() {
        nav.push(Button::new(
            t(lang, "nav-next"),
            CallbackAction::Page {
                section,
                page: page.page + 1,
            },
        ));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows.push(vec![Button::new(t(lang, "nav-back"), CallbackAction::Menu)]);
    Markup::Inline(rows)
}

/// Every item of a partition as delete buttons.
pub fn delete_listing(lang: Language, section: Section, items: &[CatalogItem]) -> Markup {
    Markup::Inline(
        items
            .iter()
            .map(|item| {
                vec![Button::new(
                    item_label(lang, item),
                    CallbackAction::DeleteItem { section, id: item.id },
                )]
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::catalog::CatalogContent;
    use pretty_assertions::assert_eq;

    fn question(display_id: i64, text: &str) -> CatalogItem {
        CatalogItem {
            id: display_id + 100,
            display_id,
            language: Language::Uz,
            content: CatalogContent::Question {
                text: text.into(),
                answer: "a".into(),
                audio: None,
            },
        }
    }

    fn buttons(markup: &Markup) -> Vec<Vec<CallbackAction>> {
        match markup {
            Markup::Inline(rows) => rows.iter().map(|r| r.iter().map(|b| b.action).collect()).collect(),
            other => panic!("expected inline markup, got {other:?}"),
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 50), "short");
        let long = "ў".repeat(60);
        let cut = truncate_chars(&long, 50);
        assert_eq!(cut.chars().count(), 50);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn item_label_uses_display_number() {
        assert_eq!(item_label(Language::Uz, &question(3, "What?")), "#3: What?");
    }

    #[test]
    fn middle_page_has_both_arrows() {
        let page = Page {
            items: vec![question(11, "x")],
            page: 2,
            total_pages: 3,
            total: 25,
        };
        let rows = buttons(&catalog_page(Language::Ru, Section::Question, &page));
        assert_eq!(
            rows[1],
            vec![
                CallbackAction::Page {
                    section: Section::Question,
                    page: 1
                },
                CallbackAction::Page {
                    section: Section::Question,
                    page: 3
                },
            ]
        );
        assert_eq!(rows.last(), Some(&vec![CallbackAction::Menu]));
    }

    #[test]
    fn single_page_has_no_arrows() {
        let page = Page {
            items: vec![question(1, "x"), question(2, "y")],
            page: 1,
            total_pages: 1,
            total: 2,
        };
        let rows = buttons(&catalog_page(Language::Es, Section::Question, &page));
        assert_eq!(rows.len(), 3);
    }
}
