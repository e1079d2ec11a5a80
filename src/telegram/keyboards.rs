//! Renders [`Markup`] into Telegram keyboards.

use itertools::Itertools;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup,
};

use crate::conversation::reply::{Button, Markup};
use crate::i18n::{t, Language};
use crate::storage::catalog::Section;

pub fn inline_keyboard(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.action.to_string()))
            .collect::<Vec<_>>()
    }))
}

/// Section buttons two per row, language settings last.
pub fn main_menu(lang: Language) -> KeyboardMarkup {
    let labels = Section::all()
        .map(|s| t(lang, s.menu_key()))
        .chain(std::iter::once(t(lang, "menu-language")));
    let rows: Vec<Vec<KeyboardButton>> = labels
        .chunks(2)
        .into_iter()
        .map(|chunk| chunk.map(KeyboardButton::new).collect())
        .collect();
    KeyboardMarkup::new(rows).resize_keyboard().persistent()
}

/// Markup for a newly sent message.
pub fn reply_markup(markup: &Markup) -> Option<ReplyMarkup> {
    match markup {
        Markup::None => None,
        Markup::MainMenu(lang) => Some(ReplyMarkup::Keyboard(main_menu(*lang))),
        Markup::RemoveKeyboard => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        Markup::Inline(rows) => Some(ReplyMarkup::InlineKeyboard(inline_keyboard(rows))),
    }
}

/// Markup for an edited message. Only inline keyboards can be attached to edits.
pub fn edit_markup(markup: &Markup) -> Option<InlineKeyboardMarkup> {
    match markup {
        Markup::Inline(rows) => Some(inline_keyboard(rows)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::event::CallbackAction;
    use crate::conversation::reply;
    use pretty_assertions::assert_eq;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn main_menu_has_two_rows_of_two() {
        let menu = main_menu(Language::Ru);
        assert_eq!(menu.keyboard.len(), 2);
        assert!(menu.keyboard.iter().all(|row| row.len() == 2));
        assert_eq!(menu.keyboard[1][1].text, t(Language::Ru, "menu-language"));
    }

    #[test]
    fn inline_buttons_carry_encoded_actions() {
        let markup = reply::language_picker(CallbackAction::Language);
        let Some(ReplyMarkup::InlineKeyboard(kb)) = reply_markup(&markup) else {
            panic!("expected inline keyboard");
        };
        assert_eq!(kb.inline_keyboard.len(), 3);
        match &kb.inline_keyboard[1][0].kind {
            InlineKeyboardButtonKind::CallbackData(data) => assert_eq!(data, "lang:ru"),
            other => panic!("unexpected button kind {other:?}"),
        }
    }

    #[test]
    fn edits_only_keep_inline_keyboards() {
        assert!(edit_markup(&Markup::MainMenu(Language::Uz)).is_none());
        assert!(edit_markup(&Markup::None).is_none());
    }
}
