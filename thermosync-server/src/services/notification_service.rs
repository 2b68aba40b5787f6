use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thermosync_api::AdjustmentRecord;

use super::NotificationGateway;
use crate::configs::settings::mask_phone;
use crate::errors::GatewayError;

pub fn adjustment_message(record: &AdjustmentRecord) -> String {
    format!(
        "Thermostat adjusted. Previous: {:.1}°F, New: {:.1}°F, Ambient: {:.1}°F",
        record.previous_target, record.new_target, record.ambient_at_adjustment
    )
}

pub fn threshold_alert_message(count: u64, threshold: u32, last_error: &str) -> String {
    format!("ALERT: error threshold exceeded. Errors: {count}/{threshold}. Last error: {last_error}")
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    to: &'a str,
    message: &'a str,
}

/// Posts `{to, message}` to an SMS webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    recipient: String,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        recipient: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Permanent(format!("http client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            recipient: recipient.into(),
        })
    }
}

#[async_trait]
impl NotificationGateway for WebhookNotifier {
    async fn send(&self, message: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookBody {
                to: &self.recipient,
                message,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(
                status.as_u16(),
                format!("webhook responded {status}: {body}"),
            ));
        }

        tracing::info!(recipient = %mask_phone(&self.recipient), "notification delivered");
        Ok(())
    }
}

/// Writes notifications to the log when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationGateway for LogNotifier {
    async fn send(&self, message: &str) -> Result<(), GatewayError> {
        tracing::info!(target: "thermosync_server::notification", "{message}");
        Ok(())
    }
}
