//! Conversation state machine — which step of a dialogue the user is in.

use serde::{Deserialize, Serialize};

/// The steps of a conversation.
///
/// New submission: Idle → AwaitingCode → AwaitingStage → AwaitingName →
/// AwaitingGender → (AwaitingGenderOther) → AwaitingDetails → Idle.
/// Edits enter at AwaitingEditCode and join the submission path at
/// AwaitingName. The admin gate is AwaitingAdminCode → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingCode,
    AwaitingStage,
    AwaitingName,
    AwaitingGender,
    AwaitingGenderOther,
    AwaitingDetails,
    AwaitingEditCode,
    AwaitingAdminCode,
}

impl ConversationState {
    /// Position along the profile path (stage → details), if this state is on it.
    fn profile_step(&self) -> Option<u8> {
        use ConversationState::*;
        match self {
            AwaitingStage => Some(0),
            AwaitingName => Some(1),
            AwaitingGender => Some(2),
            AwaitingGenderOther => Some(3),
            AwaitingDetails => Some(4),
            _ => None,
        }
    }

    /// Whether a "back" event may move from `self` to `target`.
    ///
    /// Back only moves to a strictly earlier step of the profile path.
    /// Leaving a gate state is done with a restart instead.
    pub fn can_go_back_to(&self, target: ConversationState) -> bool {
        match (self.profile_step(), target.profile_step()) {
            (Some(from), Some(to)) => to < from,
            _ => false,
        }
    }

    /// Whether this state expects free text from the user.
    pub fn expects_text(&self) -> bool {
        use ConversationState::*;
        matches!(
            self,
            AwaitingCode
                | AwaitingName
                | AwaitingGenderOther
                | AwaitingDetails
                | AwaitingEditCode
                | AwaitingAdminCode
        )
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingCode => "awaiting_code",
            Self::AwaitingStage => "awaiting_stage",
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingGender => "awaiting_gender",
            Self::AwaitingGenderOther => "awaiting_gender_other",
            Self::AwaitingDetails => "awaiting_details",
            Self::AwaitingEditCode => "awaiting_edit_code",
            Self::AwaitingAdminCode => "awaiting_admin_code",
        };
        write!(f, "{s}")
    }
}
