//! Dispatcher: the main loop between a channel and the dialog.
//!
//! Every user with pending messages gets one worker task that drains a FIFO
//! queue, so a user's messages are handled in arrival order while different
//! users proceed concurrently. A worker exits once its queue is empty; the
//! next message for that user starts a new one.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use crate::channels::{self, Channel, IncomingMessage};
use crate::config::Prompts;
use crate::dialog::{RegistrationService, UserId};
use crate::error::Error;

/// How often idle sessions are swept at most.
const MAX_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Pending messages per user. An entry exists exactly while that user's
/// worker is running.
type UserQueues = DashMap<UserId, mpsc::UnboundedSender<IncomingMessage>>;

pub struct Dispatcher {
    service: Arc<RegistrationService>,
    channel: Arc<dyn Channel>,
    prompts: Arc<Prompts>,
    session_idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        service: Arc<RegistrationService>,
        channel: Arc<dyn Channel>,
        prompts: Prompts,
        session_idle_timeout: Duration,
    ) -> Self {
        Self {
            service,
            channel,
            prompts: Arc::new(prompts),
            session_idle_timeout,
        }
    }

    /// Run until Ctrl+C or until the channel stream ends. Queued messages
    /// are finished before returning.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channel.start().await?;

        let sessions = Arc::clone(self.service.sessions());
        let idle_timeout = self.session_idle_timeout;
        let pruning_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(idle_timeout.min(MAX_PRUNE_INTERVAL));
            interval.tick().await; // Skip immediate first tick
            loop {
                interval.tick().await;
                sessions.prune_idle(idle_timeout);
            }
        });

        tracing::info!(channel = self.channel.name(), "Signup bot ready and listening");

        let queues: Arc<UserQueues> = Arc::new(DashMap::new());
        let mut workers = JoinSet::new();
        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            let user_id = message.user_id;
            // Hand the message to the running worker, if any. The entry guard
            // is held across the send so the worker cannot retire in between.
            let unqueued = match queues.get(&user_id) {
                Some(tx) => tx.send(message).err().map(|e| e.0),
                None => Some(message),
            };

            if let Some(message) = unqueued {
                let (tx, rx) = mpsc::unbounded_channel();
                queues.insert(user_id, tx);
                workers.spawn(drain_user_queue(
                    Arc::clone(&self.service),
                    Arc::clone(&self.channel),
                    Arc::clone(&self.prompts),
                    Arc::clone(&queues),
                    message,
                    rx,
                ));
            }

            // Reap finished workers so the set does not grow without bound.
            while let Some(result) = workers.try_join_next() {
                log_worker_exit(result);
            }
        }

        while let Some(result) = workers.join_next().await {
            log_worker_exit(result);
        }

        pruning_handle.abort();
        self.channel.shutdown().await?;
        Ok(())
    }
}

/// Handle `first`, then everything queued behind it for the same user.
async fn drain_user_queue(
    service: Arc<RegistrationService>,
    channel: Arc<dyn Channel>,
    prompts: Arc<Prompts>,
    queues: Arc<UserQueues>,
    first: IncomingMessage,
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
) {
    let user_id = first.user_id;
    handle_message(&service, channel.as_ref(), &prompts, first).await;

    loop {
        while let Ok(message) = rx.try_recv() {
            handle_message(&service, channel.as_ref(), &prompts, message).await;
        }
        // Retire only if nothing arrived since the last `try_recv`.
        if queues.remove_if(&user_id, |_, _| rx.is_empty()).is_some() {
            break;
        }
    }
}

fn log_worker_exit(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!("Message worker failed: {}", e);
    }
}

/// Run one message through the dialog and deliver the reply.
pub async fn handle_message(
    service: &RegistrationService,
    channel: &dyn Channel,
    prompts: &Prompts,
    message: IncomingMessage,
) {
    let user_id = message.user_id;
    let replies = match service.handle_event(user_id, message.event).await {
        Ok(directive) => {
            if directive.closes_dialog() {
                tracing::info!(user_id, %directive, "Dialog closed");
            }
            channels::render(directive, prompts)
        }
        Err(e) => {
            tracing::error!(user_id, channel = %message.channel, "Error handling event: {}", e);
            vec![channels::render::failure(prompts)]
        }
    };

    if let Err(e) = channel.send(user_id, &replies).await {
        tracing::warn!(user_id, "Failed to deliver reply: {}", e);
    }
}
