//! Inbound events and the callback payload codec.
//!
//! Callback data protocol:
//!   `lang:{code}`                 user language picker
//!   `adm:add:{section}`           admin menu, start an add flow
//!   `adm:delete` `adm:payments` `adm:amount` `adm:stats` `adm:back`
//!   `adm:lang:{code}`             admin language picker (add and delete flows)
//!   `adm:sec:{section}`           admin section picker (delete flow)
//!   `del:{section}:{id}`          pick an item to delete
//!   `del:confirm` `del:cancel`
//!   `page:{section}:{page}`       catalog listing page
//!   `item:{section}:{id}`         open a catalog item
//!   `menu`                        back to the main menu
//!   `pay:allow:{user}` `pay:disallow:{user}`
//!
//! Payloads stay well under Telegram's 64-byte callback limit.

use std::fmt;
use std::str::FromStr;

use crate::i18n::Language;
use crate::storage::catalog::Section;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackAction {
    Language(Language),
    AdminAdd(Section),
    AdminDelete,
    AdminPayments,
    AdminAmount,
    AdminStats,
    AdminBack,
    AdminLanguage(Language),
    AdminSection(Section),
    DeleteItem { section: Section, id: i64 },
    DeleteConfirm,
    DeleteCancel,
    Page { section: Section, page: usize },
    Item { section: Section, id: i64 },
    Menu,
    Payment { user_id: i64, decision: Decision },
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Language(lang) => write!(f, "lang:{}", lang),
            CallbackAction::AdminAdd(section) => write!(f, "adm:add:{}", section),
            CallbackAction::AdminDelete => f.write_str("adm:delete"),
            CallbackAction::AdminPayments => f.write_str("adm:payments"),
            CallbackAction::AdminAmount => f.write_str("adm:amount"),
            CallbackAction::AdminStats => f.write_str("adm:stats"),
            CallbackAction::AdminBack => f.write_str("adm:back"),
            CallbackAction::AdminLanguage(lang) => write!(f, "adm:lang:{}", lang),
            CallbackAction::AdminSection(section) => write!(f, "adm:sec:{}", section),
            CallbackAction::DeleteItem { section, id } => write!(f, "del:{}:{}", section, id),
            CallbackAction::DeleteConfirm => f.write_str("del:confirm"),
            CallbackAction::DeleteCancel => f.write_str("del:cancel"),
            CallbackAction::Page { section, page } => write!(f, "page:{}:{}", section, page),
            CallbackAction::Item { section, id } => write!(f, "item:{}:{}", section, id),
            CallbackAction::Menu => f.write_str("menu"),
            CallbackAction::Payment { user_id, decision } => match decision {
                Decision::Allow => write!(f, "pay:allow:{}", user_id),
                Decision::Disallow => write!(f, "pay:disallow:{}", user_id),
            },
        }
    }
}

/// Payload that does not decode to any [`CallbackAction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCallback(pub String);

impl fmt::Display for UnknownCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown callback payload {:?}", self.0)
    }
}

impl std::error::Error for UnknownCallback {}

fn section_and_number<T: FromStr>(rest: &str) -> Option<(Section, T)> {
    let (section, number) = rest.split_once(':')?;
    Some((section.parse().ok()?, number.parse().ok()?))
}

impl FromStr for CallbackAction {
    type Err = UnknownCallback;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownCallback(data.to_string());

        let action = match data {
            "adm:delete" => Some(CallbackAction::AdminDelete),
            "adm:payments" => Some(CallbackAction::AdminPayments),
            "adm:amount" => Some(CallbackAction::AdminAmount),
            "adm:stats" => Some(CallbackAction::AdminStats),
            "adm:back" => Some(CallbackAction::AdminBack),
            "del:confirm" => Some(CallbackAction::DeleteConfirm),
            "del:cancel" => Some(CallbackAction::DeleteCancel),
            "menu" => Some(CallbackAction::Menu),
            _ => None,
        };
        if let Some(action) = action {
            return Ok(action);
        }

        let parsed = if let Some(code) = data.strip_prefix("lang:") {
            Language::from_code(code).map(CallbackAction::Language)
        } else if let Some(section) = data.strip_prefix("adm:add:") {
            section.parse().ok().map(CallbackAction::AdminAdd)
        } else if let Some(code) = data.strip_prefix("adm:lang:") {
            Language::from_code(code).map(CallbackAction::AdminLanguage)
        } else if let Some(section) = data.strip_prefix("adm:sec:") {
            section.parse().ok().map(CallbackAction::AdminSection)
        } else if let Some(rest) = data.strip_prefix("del:") {
            section_and_number(rest).map(|(section, id)| CallbackAction::DeleteItem { section, id })
        } else if let Some(rest) = data.strip_prefix("page:") {
            section_and_number(rest).map(|(section, page)| CallbackAction::Page { section, page })
        } else if let Some(rest) = data.strip_prefix("item:") {
            section_and_number(rest).map(|(section, id)| CallbackAction::Item { section, id })
        } else if let Some(user) = data.strip_prefix("pay:allow:") {
            user.parse().ok().map(|user_id| CallbackAction::Payment {
                user_id,
                decision: Decision::Allow,
            })
        } else if let Some(user) = data.strip_prefix("pay:disallow:") {
            user.parse().ok().map(|user_id| CallbackAction::Payment {
                user_id,
                decision: Decision::Disallow,
            })
        } else {
            None
        };

        parsed.ok_or_else(unknown)
    }
}

/// Admin commands that do not depend on the conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `/setadmin <id>`
    SetAdmin(Option<i64>),
    /// `/revoke <id>`
    Revoke(Option<i64>),
    /// `/allow <id>` and `/disallow <id>`
    Decide(Option<i64>, Decision),
    Stats,
    ReloadConfig,
}

/// What the dispatch front hands to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    Cancel,
    Skip,
    /// `/admin`
    AdminMenu,
    /// `/setpaymentamount [amount]`
    SetPaymentAmount(Option<String>),
    Command(AdminCommand),
    Text(String),
    Photo { file_id: String },
    Audio { file_id: String },
    Callback(CallbackAction),
    /// Forwarded message from a non-admin.
    Forwarded,
    /// Anything else: stickers, unknown callbacks, unsupported media.
    Other,
}

impl Event {
    /// Short name for logs; never includes user content.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Cancel => "cancel",
            Event::Skip => "skip",
            Event::AdminMenu => "admin",
            Event::SetPaymentAmount(_) => "setpaymentamount",
            Event::Command(_) => "command",
            Event::Text(_) => "text",
            Event::Photo { .. } => "photo",
            Event::Audio { .. } => "audio",
            Event::Callback(_) => "callback",
            Event::Forwarded => "forwarded",
            Event::Other => "other",
        }
    }
}

/// Parses the numeric argument of `/setadmin 123` style commands.
pub fn parse_user_id(arg: &str) -> Option<i64> {
    arg.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(data: &str) -> Option<CallbackAction> {
        data.parse().ok()
    }

    #[test]
    fn decodes_every_family() {
        assert_eq!(parse("lang:ru"), Some(CallbackAction::Language(Language::Ru)));
        assert_eq!(parse("adm:add:road_sign"), Some(CallbackAction::AdminAdd(Section::RoadSign)));
        assert_eq!(parse("adm:lang:es"), Some(CallbackAction::AdminLanguage(Language::Es)));
        assert_eq!(parse("adm:sec:truck_part"), Some(CallbackAction::AdminSection(Section::TruckPart)));
        assert_eq!(
            parse("del:question:12"),
            Some(CallbackAction::DeleteItem {
                section: Section::Question,
                id: 12
            })
        );
        assert_eq!(parse("del:confirm"), Some(CallbackAction::DeleteConfirm));
        assert_eq!(
            parse("page:road_sign:3"),
            Some(CallbackAction::Page {
                section: Section::RoadSign,
                page: 3
            })
        );
        assert_eq!(
            parse("pay:disallow:777"),
            Some(CallbackAction::Payment {
                user_id: 777,
                decision: Decision::Disallow
            })
        );
        assert_eq!(parse("menu"), Some(CallbackAction::Menu));
    }

    #[test]
    fn display_is_accepted_by_parser() {
        let action = CallbackAction::Item {
            section: Section::TruckPart,
            id: 41,
        };
        assert_eq!(action.to_string(), "item:truck_part:41");
        assert_eq!(parse(&action.to_string()), Some(action));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "lang:en", "adm:add:car", "del:question:x", "page:question", "pay:allow:", "nope"] {
            assert_eq!(parse(bad), None, "{bad:?} should not decode");
        }
        let err = "zzz".parse::<CallbackAction>().unwrap_err();
        assert_eq!(err, UnknownCallback("zzz".into()));
    }

    #[test]
    fn user_id_argument() {
        assert_eq!(parse_user_id(" 123 "), Some(123));
        assert_eq!(parse_user_id("abc"), None);
        assert_eq!(parse_user_id(""), None);
    }
}
