// libs/registration-cell/src/services/notification.rs
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::models::{Registration, RegistrationEvent, RegistrationEventKind};

/// Destination for decision events. Failures are logged by the worker and never propagate.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, event: &RegistrationEvent) -> Result<()>;
}

// ==============================================================================
// DISPATCHER
// ==============================================================================

/// Non-blocking producer side of the notification channel.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<RegistrationEvent>,
}

impl NotificationDispatcher {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<RegistrationEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }

    /// Returns whether the event was queued. A full or closed channel drops it.
    pub fn dispatch(&self, event: RegistrationEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "Notification channel full, dropping {:?} for registration {}",
                    event.kind, event.registration_id
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(
                    "Notification worker stopped, dropping {:?} for registration {}",
                    event.kind, event.registration_id
                );
                false
            }
        }
    }

    pub fn notify(&self, kind: RegistrationEventKind, registration: &Registration) -> bool {
        self.dispatch(RegistrationEvent::from_registration(kind, registration))
    }
}

// ==============================================================================
// WORKER
// ==============================================================================

pub struct NotificationWorker {
    receiver: mpsc::Receiver<RegistrationEvent>,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl NotificationWorker {
    pub fn new(receiver: mpsc::Receiver<RegistrationEvent>, sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { receiver, sinks }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until every dispatcher has been dropped.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!("Notification worker started");

        while let Some(event) = self.receiver.recv().await {
            for sink in &self.sinks {
                if let Err(e) = sink.notify(&event).await {
                    error!(
                        "Sink {} failed for {:?} on registration {}: {}",
                        sink.name(),
                        event.kind,
                        event.registration_id,
                        e
                    );
                }
            }
        }

        info!("Notification worker stopped");
    }
}

// ==============================================================================
// SINKS
// ==============================================================================

pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &RegistrationEvent) -> Result<()> {
        info!(
            registration_id = %event.registration_id,
            status = %event.status,
            queue_number = ?event.queue_number,
            "Registration event {:?}",
            event.kind
        );
        Ok(())
    }
}

/// Fans events out to in-process subscribers.
pub struct BroadcastSink {
    sender: broadcast::Sender<RegistrationEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn notify(&self, event: &RegistrationEvent) -> Result<()> {
        // No subscribers is not an error.
        let delivered = self.sender.send(event.clone()).unwrap_or(0);
        debug!("Broadcast {:?} to {} subscribers", event.kind, delivered);
        Ok(())
    }
}

/// POSTs each event as JSON to an external endpoint.
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, event: &RegistrationEvent) -> Result<()> {
        let response = self.client.post(&self.url).json(event).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Webhook returned {}: {}", status, body));
        }

        debug!("Delivered {:?} for {} to webhook", event.kind, event.registration_id);
        Ok(())
    }
}
