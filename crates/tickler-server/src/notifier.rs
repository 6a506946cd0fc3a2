//! Outbound notification channel.
//!
//! The dispatcher talks to a [`Notifier`]; which chat platform sits behind
//! it is not its concern.  [`WebhookNotifier`] posts each reminder as JSON to
//! a bridge service, [`LogNotifier`] only writes it to the log.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use tickler_shared::{Target, TaskEmbed};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bridge rejected the notification with status {0}")]
    Rejected(u16),

    #[error("Delivery timed out after {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: Target, text: &str, embed: &TaskEmbed) -> Result<(), DeliveryError>;
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WebhookPayload<'a> {
    target: Target,
    content: &'a str,
    embed: &'a TaskEmbed,
}

/// Posts `{target, content, embed}` to a chat bridge.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, target: Target, text: &str, embed: &TaskEmbed) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload {
                target,
                content: text,
                embed,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Log only
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, target: Target, text: &str, embed: &TaskEmbed) -> Result<(), DeliveryError> {
        info!(%target, title = %embed.title, text, "reminder");
        Ok(())
    }
}
