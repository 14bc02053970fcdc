//! Shared registration state — access codes, their bindings, and the
//! per-stage rosters.
//!
//! Both services are process-wide and in-memory. They are created once at
//! startup and handed to the conversation engine behind an `Arc`.

pub mod codes;
pub mod loader;
pub mod roster;

pub use codes::CodeRegistry;
pub use loader::{load_codes, parse_codes};
pub use roster::{Profile, StageRoster, Submission};

use serde::{Deserialize, Serialize};

/// Opaque identity of a chat user, as supplied by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
