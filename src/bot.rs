//! Bot runner — feeds channel messages through the conversation engine and
//! sends each reply back where the message came from.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::channels::{ChannelManager, IncomingMessage};
use crate::conversation::{ChatEvent, ConversationEngine};
use crate::error::Result;
use crate::registry::UserId;

/// Spawn a background task that prunes idle conversations every `interval`.
pub fn spawn_session_sweep(engine: Arc<ConversationEngine>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            engine.prune_idle_sessions().await;
        }
    })
}

/// The running bot.
pub struct Bot {
    engine: Arc<ConversationEngine>,
    channels: ChannelManager,
    sweep_interval: Duration,
}

impl Bot {
    pub fn new(
        engine: Arc<ConversationEngine>,
        channels: ChannelManager,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            engine,
            channels,
            sweep_interval,
        }
    }

    /// Handle one message and deliver the reply. Delivery failures are
    /// logged; the conversation state has already moved on.
    pub async fn handle_message(&self, msg: &IncomingMessage) {
        let user = UserId::new(msg.user_id.as_str());
        let event = ChatEvent::from(&msg.payload);
        tracing::debug!(
            message_id = %msg.id,
            channel = %msg.channel,
            user_id = %user,
            "Incoming event"
        );

        let response = self.engine.handle(&user, event).await;
        if let Err(e) = self.channels.respond(msg, response).await {
            tracing::warn!(channel = %msg.channel, user_id = %user, "Failed to deliver reply: {e}");
        }
    }

    /// Run until every channel stream ends or Ctrl-C is received.
    ///
    /// Messages are processed one at a time in arrival order, so a user's
    /// events are never handled out of order.
    pub async fn run(self) -> Result<()> {
        for failure in self.channels.health_check_all().await {
            tracing::warn!("Channel health check failed at startup: {failure}");
        }

        let mut stream = self.channels.start_all().await?;
        let sweep = spawn_session_sweep(Arc::clone(&self.engine), self.sweep_interval);

        tracing::info!(channels = ?self.channels.names(), "Bot running");

        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(msg) => self.handle_message(&msg).await,
                    None => {
                        tracing::info!("All channel streams ended");
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        sweep.abort();
        self.channels.shutdown_all().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::stream;
    use secrecy::SecretString;
    use tokio::sync::Mutex;

    use super::*;
    use crate::channels::{Channel, MessagePayload, MessageStream, OutgoingResponse};
    use crate::conversation::Choice;
    use crate::error::ChannelError;
    use crate::registry::{CodeRegistry, StageRoster};

    struct ScriptedChannel {
        script: Vec<IncomingMessage>,
        replies: Arc<Mutex<Vec<OutgoingResponse>>>,
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn start(&self) -> std::result::Result<MessageStream, ChannelError> {
            Ok(stream::iter(self.script.clone()).boxed())
        }

        async fn respond(
            &self,
            _msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> std::result::Result<(), ChannelError> {
            self.replies.lock().await.push(response);
            Ok(())
        }

        async fn health_check(&self) -> std::result::Result<(), ChannelError> {
            Ok(())
        }
    }

    fn engine() -> Arc<ConversationEngine> {
        Arc::new(ConversationEngine::new(
            Arc::new(CodeRegistry::new(["ABC123".to_string()])),
            Arc::new(StageRoster::new(vec!["Stage 1".into()])),
            SecretString::from("secret".to_string()),
            Duration::from_secs(60),
        ))
    }

    fn msg(payload: MessagePayload) -> IncomingMessage {
        IncomingMessage::new("scripted", "42", payload)
    }

    #[tokio::test]
    async fn run_processes_script_in_order() {
        let replies = Arc::new(Mutex::new(Vec::new()));
        let channel = ScriptedChannel {
            script: vec![
                msg(MessagePayload::Command("start".into())),
                msg(MessagePayload::Choice("add_info".into())),
                msg(MessagePayload::Text("ABC123".into())),
                msg(MessagePayload::Choice("choose_stage_Stage 1".into())),
                msg(MessagePayload::Text("Alex".into())),
                msg(MessagePayload::Choice("gender_Male".into())),
                msg(MessagePayload::Text("Plays cello".into())),
            ],
            replies: Arc::clone(&replies),
        };

        let mut channels = ChannelManager::new();
        channels.add(Box::new(channel));
        let engine = engine();
        Bot::new(Arc::clone(&engine), channels, Duration::from_secs(60))
            .run()
            .await
            .unwrap();

        let replies = replies.lock().await;
        assert_eq!(replies.len(), 7);
        assert!(replies[0].content.starts_with("👋 Welcome!"));
        assert!(replies[6].content.starts_with("✅"));

        let members = engine.roster().members_of("Stage 1").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].owner, UserId::new("42"));
    }

    #[tokio::test]
    async fn sweep_task_prunes_idle_sessions() {
        let engine = Arc::new(ConversationEngine::new(
            Arc::new(CodeRegistry::new(Vec::<String>::new())),
            Arc::new(StageRoster::new(vec!["Stage 1".into()])),
            SecretString::from("secret".to_string()),
            Duration::ZERO,
        ));
        engine
            .handle(&UserId::new("1"), ChatEvent::Choice(Choice::Admin))
            .await;
        assert_eq!(engine.active_sessions().await, 1);

        let handle = spawn_session_sweep(Arc::clone(&engine), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(engine.active_sessions().await, 0);
        handle.abort();
    }
}
