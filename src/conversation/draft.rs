//! Profile draft — the fields a user has entered so far in one conversation.

use super::state::ConversationState;
use crate::error::RegistrationError;
use crate::registry::{Profile, UserId};

/// Scratch record filled in step by step. Discarded when the conversation
/// returns to Idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub code: Option<String>,
    pub stage: Option<String>,
    pub name: Option<String>,
    pub gender: Option<String>,
}

/// A draft that has every field needed to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDraft {
    pub code: String,
    pub stage: String,
    pub profile: Profile,
}

impl ProfileDraft {
    /// Start a draft for a verified code.
    pub fn for_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Default::default()
        }
    }

    /// Drop the fields collected at or after `target`, so that step can be
    /// answered again.
    pub fn rewind_to(&mut self, target: ConversationState) {
        use ConversationState::*;
        match target {
            AwaitingStage => {
                self.stage = None;
                self.name = None;
                self.gender = None;
            }
            AwaitingName => {
                self.name = None;
                self.gender = None;
            }
            AwaitingGender | AwaitingGenderOther => {
                self.gender = None;
            }
            _ => {}
        }
    }

    /// Combine the draft with the final details into a committable profile.
    pub fn complete(
        &self,
        owner: &UserId,
        details: &str,
    ) -> Result<CompletedDraft, RegistrationError> {
        fn require(value: &Option<String>, field: &'static str) -> Result<String, RegistrationError> {
            value
                .clone()
                .ok_or(RegistrationError::IncompleteDraft { field })
        }

        Ok(CompletedDraft {
            code: require(&self.code, "code")?,
            stage: require(&self.stage, "stage")?,
            profile: Profile {
                name: require(&self.name, "name")?,
                gender: require(&self.gender, "gender")?,
                details: details.to_string(),
                owner: owner.clone(),
            },
        })
    }
}
