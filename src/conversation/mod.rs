//! Conversation layer — the registration dialogue.
//!
//! A user moves through a small state machine: redeem an access code, pick a
//! stage, then enter name, gender and details. Edits and the admin dump are
//! separate gates off the main menu. Each user's progress is kept in a
//! `ProfileDraft` until the final step commits it to the shared roster.

pub mod draft;
pub mod engine;
pub mod event;
pub mod prompts;
pub mod state;

pub use draft::{CompletedDraft, ProfileDraft};
pub use engine::ConversationEngine;
pub use event::{ChatEvent, Choice, GenderChoice};
pub use state::ConversationState;
