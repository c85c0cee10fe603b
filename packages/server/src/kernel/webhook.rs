//! Outbound webhook notifier.
//!
//! Used for partner-created events and the admin "simulate high demand" call.
//! Delivery is fire-and-forget: callers never wait on, or fail because of, the
//! receiving end.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::kernel::BaseWebhookNotifier;

pub struct HttpWebhookNotifier {
    client: Client,
    url: Option<String>,
}

impl HttpWebhookNotifier {
    /// Without a URL every notification is dropped (logged at debug)
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl BaseWebhookNotifier for HttpWebhookNotifier {
    async fn notify(&self, event: &str, payload: serde_json::Value) -> Result<()> {
        let Some(url) = &self.url else {
            debug!(event = %event, "No webhook URL configured, dropping notification");
            return Ok(());
        };

        let body = serde_json::json!({
            "event": event,
            "payload": payload,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(event = %event, status = %status, "Webhook returned non-success status");
            anyhow::bail!("Webhook {} returned {}", event, status);
        }

        info!(event = %event, "Webhook delivered");
        Ok(())
    }
}

/// Spawn a webhook delivery without waiting for it
pub fn fire_and_forget(
    notifier: Arc<dyn BaseWebhookNotifier>,
    event: &'static str,
    payload: serde_json::Value,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(event, payload).await {
            error!(event = %event, error = %e, "Webhook delivery failed");
        }
    })
}
