//! CLI channel: stdin/stdout REPL for running the dialog locally.
//!
//! Every line belongs to a single local user. `/start` starts the dialog,
//! `/contact <phone>` imitates sharing a contact, anything else is text.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingReply, ReplyKeyboard};
use crate::dialog::{EventKind, InboundEvent, UserId};
use crate::error::ChannelError;

/// Identity used for the local user.
pub const LOCAL_USER_ID: UserId = 0;

/// A simple CLI channel that reads from stdin and writes to stdout.
#[derive(Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

/// Classify one input line.
pub fn parse_line(line: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "/start" || line.starts_with("/start ") {
        return Some(InboundEvent::start());
    }
    if let Some(rest) = line.strip_prefix("/contact") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            let phone = rest.trim();
            let payload = (!phone.is_empty()).then(|| phone.to_string());
            return Some(InboundEvent::new(EventKind::Contact, payload));
        }
    }
    Some(InboundEvent::text(line))
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(event) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        let msg = IncomingMessage::new("cli", LOCAL_USER_ID, event);
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

    async fn send(&self, _user_id: UserId, replies: &[OutgoingReply]) -> Result<(), ChannelError> {
        for reply in replies {
            println!("\n{}", reply.text);
            if let ReplyKeyboard::RequestContact { label } = &reply.keyboard {
                println!("[{label}]  (type /contact <phone> to share)");
            }
        }
        println!();
        eprint!("> ");
        Ok(())
    }
}
