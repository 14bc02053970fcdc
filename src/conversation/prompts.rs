//! User-facing texts and menus for every step of the conversation.

use super::event::{Choice, GenderChoice, RESTART_TOKEN};
use crate::channels::{ChoiceButton, OutgoingResponse};
use crate::registry::{Profile, Submission};

fn button(label: &str, choice: Choice) -> ChoiceButton {
    ChoiceButton::new(label, choice.token())
}

fn back(choice: Choice) -> ChoiceButton {
    button("🔙 Back", choice)
}

fn back_to_menu() -> ChoiceButton {
    ChoiceButton::new("🔙 Back", RESTART_TOKEN)
}

/// The root menu.
pub fn main_menu() -> OutgoingResponse {
    OutgoingResponse::text("👋 Welcome! Please choose an option:").with_choices(vec![
        button("📋 View Stages", Choice::ViewStages),
        button("➕ Add My Info", Choice::AddInfo),
        button("✏️ Edit My Info", Choice::EditInfo),
        button("🛠️ Admin Panel", Choice::Admin),
    ])
}

/// Read-only list of stages, each opening its member view.
pub fn stage_list(stages: &[String]) -> OutgoingResponse {
    let mut choices: Vec<ChoiceButton> = stages
        .iter()
        .map(|s| button(s, Choice::ShowStage(s.clone())))
        .collect();
    choices.push(back_to_menu());
    OutgoingResponse::text("📚 Choose your stage:").with_choices(choices)
}

/// Members of one stage.
pub fn stage_members(stage: &str, members: &[Profile]) -> OutgoingResponse {
    let content = if members.is_empty() {
        format!("😕 No users in {stage} yet.")
    } else {
        let mut message = format!("📄 Members of {stage}:\n\n");
        for member in members {
            message.push_str(&format!(
                "👤 Name: {}\n🚻 Gender: {}\n📝 Details: {}\n\n",
                member.name, member.gender, member.details
            ));
        }
        message.trim_end().to_string()
    };
    OutgoingResponse::text(content).with_choice(back(Choice::ViewStages))
}

pub fn code_prompt() -> OutgoingResponse {
    OutgoingResponse::text("🔑 Please enter your access code:")
}

pub fn invalid_code() -> OutgoingResponse {
    OutgoingResponse::text("❌ Invalid code. Please try again.")
}

pub fn edit_code_prompt() -> OutgoingResponse {
    OutgoingResponse::text("📝 Enter your access code to edit your information:")
}

pub fn unauthorized_edit_code() -> OutgoingResponse {
    OutgoingResponse::text("❌ Invalid or unauthorized code.")
}

/// Stage picker for a submission.
pub fn stage_picker(stages: &[String]) -> OutgoingResponse {
    let mut choices: Vec<ChoiceButton> = stages
        .iter()
        .map(|s| button(s, Choice::ChooseStage(s.clone())))
        .collect();
    choices.push(back_to_menu());
    OutgoingResponse::text("📚 Choose your stage:").with_choices(choices)
}

pub fn unknown_stage(stage: &str, stages: &[String]) -> OutgoingResponse {
    with_hint(&format!("❌ {stage} is not available."), stage_picker(stages))
}

pub fn name_prompt() -> OutgoingResponse {
    OutgoingResponse::text("👤 What is your name?").with_choice(back(Choice::BackToStage))
}

pub fn edit_name_prompt() -> OutgoingResponse {
    OutgoingResponse::text("✏️ Please re-enter your name:").with_choice(back(Choice::BackToStage))
}

pub fn gender_picker() -> OutgoingResponse {
    let labels = ["♂️ Male", "♀️ Female", "🌈 Other"];
    let mut choices: Vec<ChoiceButton> = GenderChoice::ALL
        .into_iter()
        .zip(labels)
        .map(|(g, label)| button(label, Choice::Gender(g)))
        .collect();
    choices.push(back(Choice::BackToStage));
    OutgoingResponse::text("🚻 Choose your gender:").with_choices(choices)
}

pub fn gender_other_prompt() -> OutgoingResponse {
    OutgoingResponse::text("💬 Please specify your gender:").with_choice(back(Choice::BackToGender))
}

pub fn details_prompt() -> OutgoingResponse {
    OutgoingResponse::text("📝 Write your details (bio/script):")
        .with_choice(back(Choice::BackToGender))
}

pub fn saved() -> OutgoingResponse {
    OutgoingResponse::text("✅ Your information has been saved. Thank you!")
        .with_choice(ChoiceButton::new("🏠 Main menu", RESTART_TOKEN))
}

pub fn admin_prompt() -> OutgoingResponse {
    OutgoingResponse::text("🔐 Enter admin code:")
}

pub fn wrong_admin_secret() -> OutgoingResponse {
    OutgoingResponse::text("❌ Invalid admin code.")
}

/// Every committed code with its latest profile.
pub fn admin_dump(submissions: &[Submission]) -> OutgoingResponse {
    let mut message = String::from("📑 Registered Codes and Data:\n");
    if submissions.is_empty() {
        message.push_str("\n(no submissions yet)");
    }
    for sub in submissions {
        message.push_str(&format!(
            "\n🔑 Code: {}\n  📚 Stage: {}\n  👤 Name: {}\n  🚻 Gender: {}\n  📝 Details: {}\n",
            sub.code, sub.stage, sub.profile.name, sub.profile.gender, sub.profile.details
        ));
    }
    OutgoingResponse::text(message.trim_end())
        .with_choice(ChoiceButton::new("🏠 Main menu", RESTART_TOKEN))
}

/// Shown when the current step cannot be completed and the conversation is reset.
pub fn generic_failure() -> OutgoingResponse {
    OutgoingResponse::text("⚠️ Something went wrong. Please start again.")
        .with_choice(ChoiceButton::new("🏠 Main menu", RESTART_TOKEN))
}

/// Prefix a re-rendered prompt with a short hint.
fn with_hint(hint: &str, prompt: OutgoingResponse) -> OutgoingResponse {
    OutgoingResponse {
        content: format!("{hint}\n\n{}", prompt.content),
        choices: prompt.choices,
    }
}
