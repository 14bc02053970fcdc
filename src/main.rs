use std::sync::Arc;

use anyhow::Context as _;
use secrecy::ExposeSecret;

use stage_signup::bot::Bot;
use stage_signup::channels::{ChannelManager, CliChannel, TelegramChannel};
use stage_signup::config::BotConfig;
use stage_signup::conversation::ConversationEngine;
use stage_signup::registry::{CodeRegistry, StageRoster, load_codes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("invalid configuration")?;

    eprintln!("📋 Stage signup v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Codes file: {}", config.codes_path.display());
    eprintln!("   Stages: {}", config.stages.join(", "));

    // ── Shared state ────────────────────────────────────────────────────
    let registry = Arc::new(CodeRegistry::new(load_codes(&config.codes_path).await));
    if registry.is_empty() {
        eprintln!("   Warning: no access codes loaded; nobody can register");
    } else {
        eprintln!("   Access codes: {}", registry.len());
    }
    let roster = Arc::new(StageRoster::new(config.stages.clone()));

    let engine = Arc::new(ConversationEngine::new(
        registry,
        roster,
        config.admin_secret,
        config.session_idle_timeout,
    ));

    // ── Channels ────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();

    if let Some(token) = &config.telegram_token {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if config.allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                config.allowed_users.join(", ")
            }
        );
        channels.add(Box::new(TelegramChannel::new(
            token.expose_secret().to_string(),
            config.allowed_users.clone(),
        )));
    } else {
        eprintln!("   Telegram: disabled (BOT_TOKEN not set)");
    }

    if config.enable_cli {
        channels.add(Box::new(CliChannel::new()));
    }

    if channels.is_empty() {
        anyhow::bail!("no channels enabled; set BOT_TOKEN or BOT_ENABLE_CLI=1");
    }
    eprintln!("   Channels: {}\n", channels.names().join(", "));

    Bot::new(engine, channels, config.sweep_interval)
        .run()
        .await
        .context("bot stopped with an error")?;

    Ok(())
}
