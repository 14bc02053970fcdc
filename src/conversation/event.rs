//! Conversation events and the choice-token namespace.
//!
//! Choice tokens are what a rendered button carries back to us, so they must
//! round-trip through the channel unchanged and stay within Telegram's 64-byte
//! callback limit.

use crate::channels::MessagePayload;

const SHOW_STAGE_PREFIX: &str = "show_stage_";
const CHOOSE_STAGE_PREFIX: &str = "choose_stage_";
const GENDER_PREFIX: &str = "gender_";

/// Token that returns to the main menu from anywhere.
pub const RESTART_TOKEN: &str = "start";

/// Gender options offered by the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenderChoice {
    Male,
    Female,
    Other,
}

impl GenderChoice {
    pub const ALL: [GenderChoice; 3] = [Self::Male, Self::Female, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == s)
    }
}

/// A button the user can press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    ViewStages,
    AddInfo,
    EditInfo,
    Admin,
    ShowStage(String),
    ChooseStage(String),
    Gender(GenderChoice),
    BackToStage,
    BackToName,
    BackToGender,
}

impl Choice {
    /// The token carried by a button for this choice.
    pub fn token(&self) -> String {
        match self {
            Self::ViewStages => "view_stages".to_string(),
            Self::AddInfo => "add_info".to_string(),
            Self::EditInfo => "edit_info".to_string(),
            Self::Admin => "admin".to_string(),
            Self::ShowStage(stage) => format!("{SHOW_STAGE_PREFIX}{stage}"),
            Self::ChooseStage(stage) => format!("{CHOOSE_STAGE_PREFIX}{stage}"),
            Self::Gender(g) => format!("{GENDER_PREFIX}{}", g.as_str()),
            Self::BackToStage => "back_to_stage".to_string(),
            Self::BackToName => "back_to_name".to_string(),
            Self::BackToGender => "back_to_gender".to_string(),
        }
    }

    /// Parse a button token. Returns `None` for anything unrecognised.
    pub fn parse(token: &str) -> Option<Self> {
        let choice = match token {
            "view_stages" => Self::ViewStages,
            "add_info" => Self::AddInfo,
            "edit_info" => Self::EditInfo,
            "admin" => Self::Admin,
            "back_to_stage" => Self::BackToStage,
            "back_to_name" => Self::BackToName,
            "back_to_gender" => Self::BackToGender,
            _ => {
                if let Some(stage) = token.strip_prefix(SHOW_STAGE_PREFIX) {
                    Self::ShowStage(stage.to_string())
                } else if let Some(stage) = token.strip_prefix(CHOOSE_STAGE_PREFIX) {
                    Self::ChooseStage(stage.to_string())
                } else {
                    Self::Gender(GenderChoice::parse(token.strip_prefix(GENDER_PREFIX)?)?)
                }
            }
        };
        Some(choice)
    }
}

/// An event delivered to the conversation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Unconditional return to the main menu (`/start` or the menu button).
    Restart,
    Text(String),
    Choice(Choice),
    /// A command or token we do not understand.
    Unknown(String),
}

impl From<&MessagePayload> for ChatEvent {
    fn from(payload: &MessagePayload) -> Self {
        match payload {
            MessagePayload::Command(cmd) if cmd == RESTART_TOKEN => Self::Restart,
            MessagePayload::Command(cmd) => Self::Unknown(format!("/{cmd}")),
            MessagePayload::Text(text) => Self::Text(text.trim().to_string()),
            MessagePayload::Choice(token) if token == RESTART_TOKEN => Self::Restart,
            MessagePayload::Choice(token) => match Choice::parse(token) {
                Some(choice) => Self::Choice(choice),
                None => Self::Unknown(token.clone()),
            },
        }
    }
}
