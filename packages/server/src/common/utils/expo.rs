use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::kernel::{BasePushNotificationService, DeliveryReport, NotificationData, PushMessage};

const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Expo Push Notification Client
/// Sends dispatch offers to partner apps
pub struct ExpoClient {
    client: Client,
    access_token: Option<String>,
    push_url: String,
}

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a NotificationData,
    sound: &'static str,
    priority: &'static str,
}

impl<'a> From<&'a PushMessage> for ExpoMessage<'a> {
    fn from(message: &'a PushMessage) -> Self {
        Self {
            to: &message.to,
            title: &message.title,
            body: &message.body,
            data: &message.data,
            sound: "default",
            priority: "high",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    data: Vec<ExpoTicket>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[allow(dead_code)]
    id: Option<String>,
    message: Option<String>,
}

impl ExpoClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            access_token,
            push_url: EXPO_PUSH_URL.to_string(),
        }
    }

    /// Point the client at a different push endpoint (self-hosted relay, tests)
    pub fn with_push_url(mut self, push_url: impl Into<String>) -> Self {
        self.push_url = push_url.into();
        self
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<ExpoResponse> {
        let mut request = self.client.post(&self.push_url).json(body);

        // Access token raises rate limits
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            error!("Expo push failed {}: {}", status, body);
            anyhow::bail!("Expo push API error {}: {}", status, body);
        }

        Ok(response.json().await?)
    }
}

/// Pair tickets with the messages they answer; Expo returns them in request order.
fn reports_from_tickets(messages: &[PushMessage], tickets: Vec<ExpoTicket>) -> Vec<DeliveryReport> {
    let mut tickets = tickets.into_iter();
    messages
        .iter()
        .map(|message| match tickets.next() {
            Some(ticket) if ticket.status == "ok" => DeliveryReport::delivered(&message.to),
            Some(ticket) => DeliveryReport::failed(
                &message.to,
                ticket
                    .message
                    .unwrap_or_else(|| format!("ticket status {}", ticket.status)),
            ),
            None => DeliveryReport::failed(&message.to, "no ticket returned"),
        })
        .collect()
}

#[async_trait]
impl BasePushNotificationService for ExpoClient {
    async fn send_notification(&self, message: &PushMessage) -> Result<()> {
        info!("Sending Expo push notification to: {}", message.to);

        // Sent as a one-element batch so the response is always a ticket list
        let expo_response = self.post(&[ExpoMessage::from(message)]).await?;

        for ticket in &expo_response.data {
            if ticket.status == "error" {
                error!("Expo ticket error: {:?}", ticket);
                anyhow::bail!("Expo ticket error: {:?}", ticket);
            }
        }

        info!("Expo notification sent successfully");
        Ok(())
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<DeliveryReport>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let payload: Vec<ExpoMessage<'_>> = messages.iter().map(ExpoMessage::from).collect();

        info!("Sending batch of {} Expo push notifications", payload.len());

        let expo_response = self.post(&payload).await?;
        let reports = reports_from_tickets(messages, expo_response.data);

        let failed = reports.iter().filter(|r| !r.delivered).count();
        if failed > 0 {
            error!("{} out of {} notifications failed", failed, reports.len());
        } else {
            info!("All {} notifications sent successfully", reports.len());
        }

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(token: &str) -> PushMessage {
        PushMessage {
            to: token.to_string(),
            title: "New ride request".to_string(),
            body: "Pickup 2.0 km away".to_string(),
            data: NotificationData::new(),
        }
    }

    #[test]
    fn test_expo_client_creation() {
        let client = ExpoClient::new(None);
        assert!(client.access_token.is_none());
        assert_eq!(client.push_url, EXPO_PUSH_URL);

        let client = ExpoClient::new(Some("test-token".to_string())).with_push_url("http://relay");
        assert!(client.access_token.is_some());
        assert_eq!(client.push_url, "http://relay");
    }

    #[test]
    fn test_tickets_map_to_reports_in_order() {
        let messages = vec![message("a"), message("b"), message("c")];
        let tickets = vec![
            ExpoTicket {
                status: "ok".to_string(),
                id: Some("1".to_string()),
                message: None,
            },
            ExpoTicket {
                status: "error".to_string(),
                id: None,
                message: Some("DeviceNotRegistered".to_string()),
            },
        ];

        let reports = reports_from_tickets(&messages, tickets);

        assert_eq!(reports.len(), 3);
        assert!(reports[0].delivered);
        assert!(!reports[1].delivered);
        assert_eq!(reports[1].error.as_deref(), Some("DeviceNotRegistered"));
        assert_eq!(reports[2].to, "c");
        assert!(!reports[2].delivered);
    }

    #[test]
    fn test_payload_is_flat_string_map() {
        let mut msg = message("ExponentPushToken[x]");
        msg.data.insert("distance".to_string(), "2.5".to_string());

        let json = serde_json::to_value(ExpoMessage::from(&msg)).unwrap();
        assert_eq!(json["data"]["distance"], "2.5");
        assert_eq!(json["to"], "ExponentPushToken[x]");
    }
}
