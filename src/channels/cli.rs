//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Choices are printed as a numbered list; typing `#N` presses button N.
//! A bare number is ordinary text, so it can be a name or details.
//! `/start` (or any `/command`) is passed through as a command.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use crate::channels::{Channel, IncomingMessage, MessagePayload, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    /// Tokens of the choices shown last, in display order.
    last_choices: Arc<Mutex<Vec<String>>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            last_choices: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpret one input line against the currently offered choices.
fn parse_line(line: &str, choices: &[String]) -> Option<MessagePayload> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(command) = line.strip_prefix('/') {
        return Some(MessagePayload::Command(command.trim().to_string()));
    }
    if let Some(n) = line.strip_prefix('#').and_then(|n| n.trim().parse::<usize>().ok()) {
        if let Some(token) = n.checked_sub(1).and_then(|i| choices.get(i)) {
            return Some(MessagePayload::Choice(token.clone()));
        }
    }
    Some(MessagePayload::Text(line.to_string()))
}

/// Render a response as plain text with numbered choices.
fn render(response: &OutgoingResponse) -> String {
    let mut out = response.content.clone();
    if !response.choices.is_empty() {
        out.push('\n');
        for (i, choice) in response.choices.iter().enumerate() {
            out.push_str(&format!("\n  [#{}] {}", i + 1, choice.label));
        }
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let last_choices = Arc::clone(&self.last_choices);

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprintln!("Type /start to begin, #N to press a button.");
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let payload = {
                            let choices = last_choices.lock().await;
                            parse_line(&line, &choices)
                        };
                        let Some(payload) = payload else {
                            eprint!("> ");
                            continue;
                        };
                        let msg = IncomingMessage::new("cli", "local-user", payload)
                            .with_user_name("local");
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", render(&response));
        *self.last_choices.lock().await = response.tokens().map(String::from).collect();
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
