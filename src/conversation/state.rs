//! Per-user conversation states.
//!
//! Each variant carries exactly the data its step needs, so a flow can never
//! reach its terminal step with a field missing.

use strum::{AsRefStr, Display, EnumDiscriminants};

use crate::i18n::Language;
use crate::storage::catalog::Section;

#[derive(Debug, Clone, PartialEq, Eq, Default, EnumDiscriminants)]
#[strum_discriminants(name(StateTag), derive(Display, AsRefStr, Hash))]
pub enum ConversationState {
    /// Main menu, or nothing at all for users without access.
    #[default]
    Idle,
    SelectingLanguage,
    WaitingForPayment,

    // ── admin: add flow ─────────────────────────────────────────────────────
    AdminSelectSection,
    AdminSelectLanguage {
        section: Section,
    },
    AddQuestionText {
        language: Language,
    },
    AddQuestionAnswer {
        language: Language,
        text: String,
    },
    AddQuestionAudio {
        language: Language,
        text: String,
        answer: String,
    },
    AddRoadSignImage {
        language: Language,
    },
    AddRoadSignDescription {
        language: Language,
        image: String,
    },
    AddTruckPartImage {
        language: Language,
    },
    AddTruckPartDescription {
        language: Language,
        image: String,
    },

    // ── admin: delete flow ──────────────────────────────────────────────────
    DeleteSelectLanguage,
    DeleteSelectSection {
        language: Language,
    },
    /// `listed` holds the internal ids shown to the admin; anything else is stale.
    DeleteSelectItem {
        language: Language,
        section: Section,
        listed: Vec<i64>,
    },
    DeleteConfirm {
        language: Language,
        section: Section,
        item_id: i64,
    },

    // ── super-admin ─────────────────────────────────────────────────────────
    SetPaymentAmount,
}

impl ConversationState {
    pub fn tag(&self) -> StateTag {
        StateTag::from(self)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }

    /// States only admins may be in.
    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            ConversationState::Idle | ConversationState::SelectingLanguage | ConversationState::WaitingForPayment
        )
    }

    /// States only super-admins may be in.
    pub fn requires_super_admin(&self) -> bool {
        matches!(self, ConversationState::SetPaymentAmount)
    }

    /// First step of the add flow for `section`.
    pub fn add_entry(section: Section, language: Language) -> Self {
        match section {
            Section::Question => ConversationState::AddQuestionText { language },
            Section::RoadSign => ConversationState::AddRoadSignImage { language },
            Section::TruckPart => ConversationState::AddTruckPartImage { language },
        }
    }
}
