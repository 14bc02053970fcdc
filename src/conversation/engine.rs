//! ConversationEngine — drives each user's dialogue and applies its effects
//! to the shared code registry and stage roster.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::draft::ProfileDraft;
use super::event::{ChatEvent, Choice, GenderChoice};
use super::prompts;
use super::state::ConversationState;
use crate::channels::OutgoingResponse;
use crate::error::RegistrationError;
use crate::registry::{CodeRegistry, StageRoster, UserId};

/// One user's in-flight conversation.
#[derive(Debug, Clone)]
struct Session {
    state: ConversationState,
    draft: ProfileDraft,
    last_activity: DateTime<Utc>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: ConversationState::Idle,
            draft: ProfileDraft::default(),
            last_activity: now,
        }
    }

    fn reset(&mut self) {
        self.state = ConversationState::Idle;
        self.draft = ProfileDraft::default();
    }

    fn is_expired(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        (now - self.last_activity)
            .to_std()
            .map(|idle| idle > idle_timeout)
            .unwrap_or(false)
    }
}

/// The dialogue state machine.
///
/// Sessions for different users are independent; only the code registry
/// and the stage roster are shared, and each of their mutations is atomic.
pub struct ConversationEngine {
    codes: Arc<CodeRegistry>,
    roster: Arc<StageRoster>,
    admin_secret: SecretString,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl ConversationEngine {
    pub fn new(
        codes: Arc<CodeRegistry>,
        roster: Arc<StageRoster>,
        admin_secret: SecretString,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            codes,
            roster,
            admin_secret,
            idle_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn codes(&self) -> &Arc<CodeRegistry> {
        &self.codes
    }

    pub fn roster(&self) -> &Arc<StageRoster> {
        &self.roster
    }

    /// Current state of a user's conversation.
    pub async fn state_of(&self, user: &UserId) -> ConversationState {
        self.sessions
            .lock()
            .await
            .get(user)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Number of conversations that are not idle.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Process one event from `user` and return what to show them.
    pub async fn handle(&self, user: &UserId, event: ChatEvent) -> OutgoingResponse {
        let now = Utc::now();
        let mut session = {
            let mut sessions = self.sessions.lock().await;
            match sessions.remove(user) {
                Some(s) if s.is_expired(now, self.idle_timeout) => {
                    info!(user_id = %user, state = %s.state, "Discarding expired conversation");
                    Session::new(now)
                }
                Some(s) => s,
                None => Session::new(now),
            }
        };

        let from = session.state;
        let response = self.step(user, &mut session, event).await;
        session.last_activity = now;

        if from != session.state {
            debug!(user_id = %user, from = %from, to = %session.state, "Conversation transition");
        }

        if !session.state.is_idle() {
            self.sessions.lock().await.insert(user.clone(), session);
        }
        response
    }

    /// Drop conversations idle for longer than the timeout.
    /// Returns the number of sessions removed.
    pub async fn prune_idle_sessions(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, self.idle_timeout));
        let pruned = before - sessions.len();
        if pruned > 0 {
            info!(count = pruned, "Pruned idle conversations");
        }
        pruned
    }

    async fn step(
        &self,
        user: &UserId,
        session: &mut Session,
        event: ChatEvent,
    ) -> OutgoingResponse {
        use ConversationState as S;

        match (session.state, event) {
            (_, ChatEvent::Restart) => {
                session.reset();
                prompts::main_menu()
            }

            // ── Main menu ───────────────────────────────────────────────
            (S::Idle, ChatEvent::Choice(Choice::ViewStages)) => {
                prompts::stage_list(self.roster.stage_names())
            }
            (S::Idle, ChatEvent::Choice(Choice::ShowStage(stage))) => {
                let members = self.roster.members_of(&stage).await;
                prompts::stage_members(&stage, &members)
            }
            (S::Idle, ChatEvent::Choice(Choice::AddInfo)) => {
                session.state = S::AwaitingCode;
                prompts::code_prompt()
            }
            (S::Idle, ChatEvent::Choice(Choice::EditInfo)) => {
                session.state = S::AwaitingEditCode;
                prompts::edit_code_prompt()
            }
            (S::Idle, ChatEvent::Choice(Choice::Admin)) => {
                session.state = S::AwaitingAdminCode;
                prompts::admin_prompt()
            }

            // ── Submission ──────────────────────────────────────────────
            (S::AwaitingCode, ChatEvent::Text(code)) if !code.is_empty() => {
                match self.codes.try_bind(&code, user).await {
                    Ok(()) => {
                        session.draft = ProfileDraft::for_code(code);
                        session.state = S::AwaitingStage;
                        prompts::stage_picker(self.roster.stage_names())
                    }
                    Err(e) => {
                        warn!(user_id = %user, error = %e, "Access code rejected");
                        prompts::invalid_code()
                    }
                }
            }
            (S::AwaitingStage, ChatEvent::Choice(Choice::ChooseStage(stage))) => {
                if !self.roster.is_stage(&stage) {
                    warn!(user_id = %user, stage = %stage, "Stale stage selected");
                    return prompts::unknown_stage(&stage, self.roster.stage_names());
                }
                session.draft.stage = Some(stage);
                session.state = S::AwaitingName;
                prompts::name_prompt()
            }
            (S::AwaitingName, ChatEvent::Text(name)) if !name.is_empty() => {
                session.draft.name = Some(name);
                session.state = S::AwaitingGender;
                prompts::gender_picker()
            }
            (S::AwaitingGender, ChatEvent::Choice(Choice::Gender(GenderChoice::Other))) => {
                session.state = S::AwaitingGenderOther;
                prompts::gender_other_prompt()
            }
            (S::AwaitingGender, ChatEvent::Choice(Choice::Gender(gender))) => {
                session.draft.gender = Some(gender.as_str().to_string());
                session.state = S::AwaitingDetails;
                prompts::details_prompt()
            }
            (S::AwaitingGenderOther, ChatEvent::Text(gender)) if !gender.is_empty() => {
                session.draft.gender = Some(gender);
                session.state = S::AwaitingDetails;
                prompts::details_prompt()
            }
            (S::AwaitingDetails, ChatEvent::Text(details)) if !details.is_empty() => {
                self.commit(user, session, &details).await
            }

            // ── Edit ────────────────────────────────────────────────────
            (S::AwaitingEditCode, ChatEvent::Text(code)) if !code.is_empty() => {
                self.start_edit(user, session, code).await
            }

            // ── Admin ───────────────────────────────────────────────────
            (S::AwaitingAdminCode, ChatEvent::Text(secret)) => {
                if secret == self.admin_secret.expose_secret() {
                    info!(user_id = %user, "Admin dump requested");
                    session.reset();
                    prompts::admin_dump(&self.roster.submissions().await)
                } else {
                    let e = RegistrationError::WrongAdminSecret;
                    warn!(user_id = %user, error = %e, "Admin access denied");
                    prompts::wrong_admin_secret()
                }
            }

            // ── Back navigation ─────────────────────────────────────────
            (
                _,
                ChatEvent::Choice(
                    choice @ (Choice::BackToStage | Choice::BackToName | Choice::BackToGender),
                ),
            ) => self.go_back(user, session, &choice),

            // Anything else is not valid here.
            (state, event) => {
                debug!(user_id = %user, state = %state, event = ?event, "Event not valid here");
                self.reprompt(session)
            }
        }
    }

    /// Commit the finished draft. Either the profile is stored in full or
    /// nothing is, and the conversation ends either way.
    async fn commit(
        &self,
        user: &UserId,
        session: &mut Session,
        details: &str,
    ) -> OutgoingResponse {
        let completed = match session.draft.complete(user, details) {
            Ok(c) => c,
            Err(e) => {
                warn!(user_id = %user, error = %e, "Cannot commit incomplete draft");
                session.reset();
                return prompts::generic_failure();
            }
        };

        let result = self
            .roster
            .commit(&completed.code, &completed.stage, completed.profile)
            .await;
        session.reset();

        match result {
            Ok(()) => {
                info!(user_id = %user, stage = %completed.stage, "Profile saved");
                prompts::saved()
            }
            Err(e) => {
                warn!(user_id = %user, error = %e, "Profile commit failed");
                prompts::generic_failure()
            }
        }
    }

    /// Verify that `code` belongs to `user` and reopen their profile.
    async fn start_edit(
        &self,
        user: &UserId,
        session: &mut Session,
        code: String,
    ) -> OutgoingResponse {
        if self.codes.owner_of(&code).await.as_ref() != Some(user) {
            let e = RegistrationError::UnauthorizedCode;
            warn!(user_id = %user, error = %e, "Edit refused");
            return prompts::unauthorized_edit_code();
        }

        let previous = self.roster.submission_for(&code).await;
        session.draft = ProfileDraft::for_code(code);

        match previous {
            Some(sub) => {
                session.draft.stage = Some(sub.stage);
                session.state = ConversationState::AwaitingName;
                prompts::edit_name_prompt()
            }
            // Bound but never submitted: nothing to edit yet, so pick a stage.
            None => {
                session.state = ConversationState::AwaitingStage;
                prompts::stage_picker(self.roster.stage_names())
            }
        }
    }

    /// Step back to an earlier answer, discarding the draft fields after it.
    fn go_back(&self, user: &UserId, session: &mut Session, choice: &Choice) -> OutgoingResponse {
        match back_target(choice) {
            Some(target) if session.state.can_go_back_to(target) => {
                session.draft.rewind_to(target);
                session.state = target;
            }
            _ => debug!(user_id = %user, state = %session.state, "Back not available here"),
        }
        self.reprompt(session)
    }

    /// Render the prompt for the session's current step again.
    fn reprompt(&self, session: &Session) -> OutgoingResponse {
        use ConversationState as S;
        match session.state {
            S::Idle => prompts::main_menu(),
            S::AwaitingCode => prompts::code_prompt(),
            S::AwaitingStage => prompts::stage_picker(self.roster.stage_names()),
            S::AwaitingName => prompts::name_prompt(),
            S::AwaitingGender => prompts::gender_picker(),
            S::AwaitingGenderOther => prompts::gender_other_prompt(),
            S::AwaitingDetails => prompts::details_prompt(),
            S::AwaitingEditCode => prompts::edit_code_prompt(),
            S::AwaitingAdminCode => prompts::admin_prompt(),
        }
    }
}

/// The step a back button returns to.
fn back_target(choice: &Choice) -> Option<ConversationState> {
    match choice {
        Choice::BackToStage => Some(ConversationState::AwaitingStage),
        Choice::BackToName => Some(ConversationState::AwaitingName),
        Choice::BackToGender => Some(ConversationState::AwaitingGender),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: &str = "Dadyar.admin";

    fn engine_with_timeout(idle_timeout: Duration) -> ConversationEngine {
        let codes = Arc::new(CodeRegistry::new([
            "ABC123".to_string(),
            "XYZ789".to_string(),
        ]));
        let roster = Arc::new(StageRoster::new(
            ["Stage 1", "Stage 2", "Stage 3", "Stage 4"]
                .map(String::from)
                .to_vec(),
        ));
        ConversationEngine::new(codes, roster, SecretString::from(ADMIN.to_string()), idle_timeout)
    }

    fn engine() -> ConversationEngine {
        engine_with_timeout(Duration::from_secs(3600))
    }

    fn text(s: &str) -> ChatEvent {
        ChatEvent::Text(s.to_string())
    }

    fn choice(c: Choice) -> ChatEvent {
        ChatEvent::Choice(c)
    }

    /// Walk `user` up to the gender picker with `code` and `stage`.
    async fn to_gender(engine: &ConversationEngine, user: &UserId, code: &str, stage: &str) {
        engine.handle(user, ChatEvent::Restart).await;
        engine.handle(user, choice(Choice::AddInfo)).await;
        engine.handle(user, text(code)).await;
        engine
            .handle(user, choice(Choice::ChooseStage(stage.into())))
            .await;
        engine.handle(user, text("Alex")).await;
        assert_eq!(engine.state_of(user).await, ConversationState::AwaitingGender);
    }

    #[tokio::test]
    async fn restart_shows_main_menu() {
        let engine = engine();
        let u = UserId::new("1");
        let resp = engine.handle(&u, ChatEvent::Restart).await;
        assert_eq!(resp, prompts::main_menu());
        assert_eq!(engine.state_of(&u).await, ConversationState::Idle);
        assert_eq!(engine.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn menu_entries_open_their_gates() {
        let engine = engine();
        let u = UserId::new("1");

        engine.handle(&u, choice(Choice::AddInfo)).await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingCode);

        engine.handle(&u, ChatEvent::Restart).await;
        engine.handle(&u, choice(Choice::EditInfo)).await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingEditCode);

        engine.handle(&u, ChatEvent::Restart).await;
        engine.handle(&u, choice(Choice::Admin)).await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingAdminCode);
    }

    #[tokio::test]
    async fn view_stages_stays_idle() {
        let engine = engine();
        let u = UserId::new("1");
        let resp = engine.handle(&u, choice(Choice::ViewStages)).await;
        assert_eq!(resp.choices.len(), 5);
        assert_eq!(engine.state_of(&u).await, ConversationState::Idle);

        let resp = engine
            .handle(&u, choice(Choice::ShowStage("NoSuchStage".into())))
            .await;
        assert_eq!(resp.content, "😕 No users in NoSuchStage yet.");
        assert_eq!(engine.state_of(&u).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn invalid_code_reprompts() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::AddInfo)).await;
        let resp = engine.handle(&u, text("WRONG")).await;
        assert_eq!(resp, prompts::invalid_code());
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingCode);
    }

    #[tokio::test]
    async fn code_used_by_someone_else_gets_same_message() {
        let engine = engine();
        let u1 = UserId::new("1");
        let u2 = UserId::new("2");
        engine.handle(&u1, choice(Choice::AddInfo)).await;
        engine.handle(&u1, text("ABC123")).await;

        engine.handle(&u2, choice(Choice::AddInfo)).await;
        let resp = engine.handle(&u2, text("ABC123")).await;
        assert_eq!(resp, prompts::invalid_code());
        assert_eq!(engine.state_of(&u2).await, ConversationState::AwaitingCode);
    }

    #[tokio::test]
    async fn owner_reentering_code_advances() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::AddInfo)).await;
        engine.handle(&u, text("ABC123")).await;
        engine.handle(&u, ChatEvent::Restart).await;

        engine.handle(&u, choice(Choice::AddInfo)).await;
        engine.handle(&u, text("ABC123")).await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingStage);
    }

    #[tokio::test]
    async fn other_gender_asks_for_free_text() {
        let engine = engine();
        let u = UserId::new("1");
        to_gender(&engine, &u, "ABC123", "Stage 1").await;

        let resp = engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Other)))
            .await;
        assert_eq!(resp, prompts::gender_other_prompt());
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingGenderOther);

        engine.handle(&u, text("Composer")).await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingDetails);
    }

    #[tokio::test]
    async fn details_commit_and_return_to_idle() {
        let engine = engine();
        let u = UserId::new("1");
        to_gender(&engine, &u, "ABC123", "Stage 1").await;
        engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Female)))
            .await;
        let resp = engine.handle(&u, text("Sings")).await;

        assert_eq!(resp, prompts::saved());
        assert_eq!(engine.state_of(&u).await, ConversationState::Idle);
        let members = engine.roster().members_of("Stage 1").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].gender, "Female");
        assert_eq!(members[0].details, "Sings");
    }

    #[tokio::test]
    async fn back_from_gender_returns_to_stage_and_clears_later_fields() {
        let engine = engine();
        let u = UserId::new("1");
        to_gender(&engine, &u, "ABC123", "Stage 1").await;

        let resp = engine.handle(&u, choice(Choice::BackToStage)).await;
        assert_eq!(resp.content, "📚 Choose your stage:");
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingStage);

        engine
            .handle(&u, choice(Choice::ChooseStage("Stage 3".into())))
            .await;
        engine.handle(&u, text("Sam")).await;
        engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Male)))
            .await;
        engine.handle(&u, text("Drums")).await;

        assert!(engine.roster().members_of("Stage 1").await.is_empty());
        let members = engine.roster().members_of("Stage 3").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "Sam");
    }

    #[tokio::test]
    async fn back_from_name_clears_stage_and_accepts_a_new_one() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::AddInfo)).await;
        engine.handle(&u, text("ABC123")).await;
        engine
            .handle(&u, choice(Choice::ChooseStage("Stage 1".into())))
            .await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingName);

        let resp = engine.handle(&u, choice(Choice::BackToStage)).await;
        assert_eq!(resp.content, "📚 Choose your stage:");
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingStage);
        {
            let sessions = engine.sessions.lock().await;
            let draft = &sessions.get(&u).unwrap().draft;
            assert_eq!(draft.stage, None);
            assert_eq!(draft.code.as_deref(), Some("ABC123"));
        }

        engine
            .handle(&u, choice(Choice::ChooseStage("Stage 2".into())))
            .await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingName);
        engine.handle(&u, text("Alex")).await;
        engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Male)))
            .await;
        engine.handle(&u, text("Piano")).await;

        assert!(engine.roster().members_of("Stage 1").await.is_empty());
        assert_eq!(engine.roster().members_of("Stage 2").await.len(), 1);
    }

    #[tokio::test]
    async fn numeric_free_text_is_accepted() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::AddInfo)).await;
        engine.handle(&u, text("ABC123")).await;
        engine
            .handle(&u, choice(Choice::ChooseStage("Stage 1".into())))
            .await;
        engine.handle(&u, text("7")).await;
        engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Other)))
            .await;
        engine.handle(&u, text("2")).await;
        let resp = engine.handle(&u, text("1")).await;

        assert_eq!(resp, prompts::saved());
        let members = engine.roster().members_of("Stage 1").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "7");
        assert_eq!(members[0].gender, "2");
        assert_eq!(members[0].details, "1");
    }

    #[tokio::test]
    async fn back_from_gender_other_and_details_returns_to_gender() {
        let engine = engine();
        let u = UserId::new("1");
        to_gender(&engine, &u, "ABC123", "Stage 1").await;

        engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Other)))
            .await;
        engine.handle(&u, choice(Choice::BackToGender)).await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingGender);

        engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Male)))
            .await;
        engine.handle(&u, choice(Choice::BackToGender)).await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingGender);
    }

    #[tokio::test]
    async fn back_does_not_move_forward() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::AddInfo)).await;
        engine.handle(&u, text("ABC123")).await;

        let resp = engine.handle(&u, choice(Choice::BackToGender)).await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingStage);
        assert_eq!(resp.content, "📚 Choose your stage:");
    }

    #[tokio::test]
    async fn unknown_stage_in_picker_reprompts() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::AddInfo)).await;
        engine.handle(&u, text("ABC123")).await;

        let resp = engine
            .handle(&u, choice(Choice::ChooseStage("Stage 9".into())))
            .await;
        assert!(resp.content.starts_with("❌ Stage 9 is not available."));
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingStage);
    }

    #[tokio::test]
    async fn invalid_event_rerenders_current_step() {
        let engine = engine();
        let u = UserId::new("1");
        to_gender(&engine, &u, "ABC123", "Stage 1").await;

        let resp = engine.handle(&u, text("typed instead of pressing")).await;
        assert_eq!(resp, prompts::gender_picker());
        let resp = engine.handle(&u, ChatEvent::Unknown("stale".into())).await;
        assert_eq!(resp, prompts::gender_picker());
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingGender);
    }

    #[tokio::test]
    async fn empty_text_reprompts() {
        let engine = engine();
        let u = UserId::new("1");
        to_gender(&engine, &u, "ABC123", "Stage 1").await;
        engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Male)))
            .await;
        let resp = engine.handle(&u, text("")).await;
        assert_eq!(resp, prompts::details_prompt());
        assert!(engine.roster().submissions().await.is_empty());
    }

    #[tokio::test]
    async fn restart_discards_draft_without_commit() {
        let engine = engine();
        let u = UserId::new("1");
        to_gender(&engine, &u, "ABC123", "Stage 1").await;
        engine.handle(&u, ChatEvent::Restart).await;

        assert_eq!(engine.state_of(&u).await, ConversationState::Idle);
        assert!(engine.roster().members_of("Stage 1").await.is_empty());
        // The binding made at the code step survives.
        assert_eq!(engine.codes().owner_of("ABC123").await, Some(u));
    }

    #[tokio::test]
    async fn edit_with_unbound_code_is_refused() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::EditInfo)).await;
        let resp = engine.handle(&u, text("XYZ789")).await;
        assert_eq!(resp, prompts::unauthorized_edit_code());
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingEditCode);
    }

    #[tokio::test]
    async fn edit_before_any_submission_goes_to_stage_picker() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::AddInfo)).await;
        engine.handle(&u, text("ABC123")).await;
        engine.handle(&u, ChatEvent::Restart).await;

        engine.handle(&u, choice(Choice::EditInfo)).await;
        engine.handle(&u, text("ABC123")).await;
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingStage);
    }

    #[tokio::test]
    async fn edit_reuses_previous_stage() {
        let engine = engine();
        let u = UserId::new("1");
        to_gender(&engine, &u, "ABC123", "Stage 4").await;
        engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Male)))
            .await;
        engine.handle(&u, text("v1")).await;

        engine.handle(&u, choice(Choice::EditInfo)).await;
        let resp = engine.handle(&u, text("ABC123")).await;
        assert_eq!(resp, prompts::edit_name_prompt());
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingName);

        engine.handle(&u, text("Alex B")).await;
        engine
            .handle(&u, choice(Choice::Gender(GenderChoice::Male)))
            .await;
        engine.handle(&u, text("v2")).await;

        let members = engine.roster().members_of("Stage 4").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "Alex B");
        assert_eq!(members[0].details, "v2");
    }

    #[tokio::test]
    async fn admin_wrong_secret_stays_in_gate() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::Admin)).await;
        let resp = engine.handle(&u, text("guess")).await;
        assert_eq!(resp, prompts::wrong_admin_secret());
        assert!(!resp.content.contains(ADMIN));
        assert_eq!(engine.state_of(&u).await, ConversationState::AwaitingAdminCode);
    }

    #[tokio::test]
    async fn admin_secret_is_not_an_access_code() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::AddInfo)).await;
        let resp = engine.handle(&u, text(ADMIN)).await;
        assert_eq!(resp, prompts::invalid_code());
    }

    #[tokio::test]
    async fn admin_secret_dumps_and_returns_to_idle() {
        let engine = engine();
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::Admin)).await;
        let resp = engine.handle(&u, text(ADMIN)).await;
        assert!(resp.content.starts_with("📑 Registered Codes and Data:"));
        assert_eq!(engine.state_of(&u).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn expired_session_starts_over() {
        let engine = engine_with_timeout(Duration::ZERO);
        let u = UserId::new("1");
        engine.handle(&u, choice(Choice::AddInfo)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The stale code prompt is gone; text in Idle shows the menu.
        let resp = engine.handle(&u, text("ABC123")).await;
        assert_eq!(resp, prompts::main_menu());
        assert_eq!(engine.codes().owner_of("ABC123").await, None);
    }

    #[tokio::test]
    async fn prune_removes_idle_sessions() {
        let engine = engine_with_timeout(Duration::ZERO);
        engine
            .handle(&UserId::new("1"), choice(Choice::AddInfo))
            .await;
        engine.handle(&UserId::new("2"), choice(Choice::Admin)).await;
        assert_eq!(engine.active_sessions().await, 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(engine.prune_idle_sessions().await, 2);
        assert_eq!(engine.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn prune_keeps_fresh_sessions() {
        let engine = engine();
        engine
            .handle(&UserId::new("1"), choice(Choice::AddInfo))
            .await;
        assert_eq!(engine.prune_idle_sessions().await, 0);
        assert_eq!(engine.active_sessions().await, 1);
    }
}
