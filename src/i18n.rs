use std::borrow::Cow;
use std::collections::HashMap;

use fluent_templates::{fluent_bundle::FluentValue, static_loader, Loader};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use unic_langid::LanguageIdentifier;

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "uz",
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

/// Languages the catalog and the interface are available in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, AsRefStr, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    #[default]
    Uz,
    Ru,
    Es,
}

impl Language {
    /// Short code stored in the database and used in callback payloads.
    pub fn code(self) -> &'static str {
        match self {
            Language::Uz => "uz",
            Language::Ru => "ru",
            Language::Es => "es",
        }
    }

    /// Label shown on language picker buttons.
    pub fn native_name(self) -> &'static str {
        match self {
            Language::Uz => "🇺🇿 O‘zbek tili",
            Language::Ru => "🇷🇺 Русский язык",
            Language::Es => "🇪🇸 Español",
        }
    }

    /// Parses a language code, accepting regional variants ("ru-RU") and any case.
    pub fn from_code(code: &str) -> Option<Self> {
        let base = code.split(['-', '_']).next().unwrap_or(code).to_lowercase();
        base.parse().ok()
    }

    pub fn all() -> impl Iterator<Item = Language> {
        Language::iter()
    }

    fn langid(self) -> LanguageIdentifier {
        self.code().parse().unwrap_or_default()
    }
}

/// Named arguments for [`t_args`].
pub type Args = HashMap<Cow<'static, str>, FluentValue<'static>>;

/// Builds an argument map from `(name, value)` pairs.
pub fn args<I, V>(pairs: I) -> Args
where
    I: IntoIterator<Item = (&'static str, V)>,
    V: Into<FluentValue<'static>>,
{
    pairs.into_iter().map(|(k, v)| (Cow::Borrowed(k), v.into())).collect()
}

/// Returns a localized string for the given key.
/// Converts literal `\n` sequences to actual newlines for proper Telegram formatting.
pub fn t(lang: Language, key: &str) -> String {
    LOCALES.lookup(&lang.langid(), key).replace("\\n", "\n")
}

/// Returns a localized string with arguments for interpolation.
pub fn t_args(lang: Language, key: &str, args: &Args) -> String {
    LOCALES.lookup_with_args(&lang.langid(), key, args).replace("\\n", "\n")
}

/// Finds the language whose translation of `key` equals `text`.
///
/// Reply-keyboard buttons come back as plain text, so a button pressed before a
/// language switch still has to be recognized.
pub fn match_any_language(key: &str, text: &str) -> bool {
    Language::all().any(|lang| t(lang, key) == text)
}
