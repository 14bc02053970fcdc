//! Stage roster — submitted profiles grouped by stage, plus the ledger of
//! committed submissions keyed by access code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use super::UserId;
use crate::error::RegistrationError;

/// A submitted member profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub gender: String,
    pub details: String,
    pub owner: UserId,
}

/// One entry of the committed-submission ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub code: String,
    pub stage: String,
    pub profile: Profile,
    pub submitted_at: DateTime<Utc>,
}

struct RosterInner {
    /// Stage name → members, in the fixed stage order.
    stages: Vec<(String, Vec<Profile>)>,
    /// Latest submission per code, in first-submission order.
    submissions: Vec<Submission>,
}

impl RosterInner {
    fn members_mut(&mut self, stage: &str) -> Result<&mut Vec<Profile>, RegistrationError> {
        self.stages
            .iter_mut()
            .find(|(name, _)| name.as_str() == stage)
            .map(|(_, members)| members)
            .ok_or_else(|| RegistrationError::InvalidStage {
                stage: stage.to_string(),
            })
    }

    fn upsert(&mut self, stage: &str, profile: Profile) -> Result<(), RegistrationError> {
        let members = self.members_mut(stage)?;
        members.retain(|p| p.owner != profile.owner);
        members.push(profile);
        Ok(())
    }
}

/// Per-stage member lists over a fixed set of stage names.
///
/// A stage never holds two profiles with the same owner: a resubmission
/// replaces the earlier profile and moves it to the end of the list.
pub struct StageRoster {
    names: Vec<String>,
    inner: RwLock<RosterInner>,
}

impl StageRoster {
    pub fn new(names: Vec<String>) -> Self {
        let stages = names.iter().map(|n| (n.clone(), Vec::new())).collect();
        Self {
            names,
            inner: RwLock::new(RosterInner {
                stages,
                submissions: Vec::new(),
            }),
        }
    }

    /// The predefined stage names, in display order.
    pub fn stage_names(&self) -> &[String] {
        &self.names
    }

    pub fn is_stage(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Members of a stage in submission order. Unknown stages are empty.
    pub async fn members_of(&self, stage: &str) -> Vec<Profile> {
        let inner = self.inner.read().await;
        inner
            .stages
            .iter()
            .find(|(name, _)| name.as_str() == stage)
            .map(|(_, members)| members.clone())
            .unwrap_or_default()
    }

    /// Replace any profile of `profile.owner` in `stage`, then append `profile`.
    pub async fn upsert(&self, stage: &str, profile: Profile) -> Result<(), RegistrationError> {
        self.inner.write().await.upsert(stage, profile)
    }

    /// Commit a completed submission: upsert into the stage and record it in
    /// the ledger under `code`, both under a single write lock.
    ///
    /// Nothing is written when the stage is unknown.
    pub async fn commit(
        &self,
        code: &str,
        stage: &str,
        profile: Profile,
    ) -> Result<(), RegistrationError> {
        let mut inner = self.inner.write().await;
        inner.upsert(stage, profile.clone())?;

        let submission = Submission {
            code: code.to_string(),
            stage: stage.to_string(),
            profile,
            submitted_at: Utc::now(),
        };
        match inner.submissions.iter_mut().find(|s| s.code == code) {
            Some(existing) => *existing = submission,
            None => inner.submissions.push(submission),
        }

        info!(stage = %stage, "Submission committed");
        Ok(())
    }

    /// All committed submissions, one per code.
    pub async fn submissions(&self) -> Vec<Submission> {
        self.inner.read().await.submissions.clone()
    }

    /// The latest committed submission made under `code`.
    pub async fn submission_for(&self, code: &str) -> Option<Submission> {
        self.inner
            .read()
            .await
            .submissions
            .iter()
            .find(|s| s.code == code)
            .cloned()
    }
}
