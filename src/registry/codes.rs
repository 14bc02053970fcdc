//! Code registry — the valid access codes and who redeemed each one.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::UserId;
use crate::error::RegistrationError;

/// Holds the preloaded access codes and the code → user bindings.
///
/// The valid set never changes after construction. A binding is created the
/// first time a code is redeemed and is never moved to another user.
pub struct CodeRegistry {
    valid: HashSet<String>,
    bindings: RwLock<HashMap<String, UserId>>,
}

impl CodeRegistry {
    pub fn new(codes: impl IntoIterator<Item = String>) -> Self {
        let valid: HashSet<String> = codes.into_iter().collect();
        info!(count = valid.len(), "Code registry loaded");
        Self {
            valid,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `code` is one of the preloaded codes.
    pub fn is_valid(&self, code: &str) -> bool {
        self.valid.contains(code)
    }

    /// Number of preloaded codes.
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Bind `code` to `user`, or confirm an existing binding to the same user.
    ///
    /// The check and the insert happen under one write lock, so two users
    /// racing for the same code cannot both succeed.
    pub async fn try_bind(&self, code: &str, user: &UserId) -> Result<(), RegistrationError> {
        if !self.is_valid(code) {
            debug!(user_id = %user, "Rejected unknown access code");
            return Err(RegistrationError::InvalidCode);
        }

        let mut bindings = self.bindings.write().await;
        match bindings.get(code) {
            Some(owner) if owner == user => {
                debug!(user_id = %user, "Access code re-entered by its owner");
                Ok(())
            }
            Some(owner) => {
                warn!(user_id = %user, owner = %owner, "Access code already bound to another user");
                Err(RegistrationError::UnauthorizedCode)
            }
            None => {
                bindings.insert(code.to_string(), user.clone());
                info!(user_id = %user, "Access code bound");
                Ok(())
            }
        }
    }

    /// The user a code is bound to, if any.
    pub async fn owner_of(&self, code: &str) -> Option<UserId> {
        self.bindings.read().await.get(code).cloned()
    }

    /// Number of codes that have been redeemed.
    #[cfg(test)]
    pub async fn bound_count(&self) -> usize {
        self.bindings.read().await.len()
    }
}
