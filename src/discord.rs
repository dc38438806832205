use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SEND_TIMEOUT_SECS: u64 = 10;
const EMBED_COLOR: u32 = 0xC0_392B;

#[async_trait]
pub trait WebhookApi: Send + Sync {
    /// Posts one payload to the downstream webhook. Success means the
    /// endpoint acknowledged with 204 No Content.
    async fn send(&self, payload: &Value) -> Result<()>;
}

pub struct DiscordWebhook {
    client: Client,
    url: String,
}

impl DiscordWebhook {
    /// Returns `None` when DISCORD_WEBHOOK_URL is unset: dispatch is
    /// disabled but submissions still succeed.
    pub fn from_env() -> Result<Option<Self>> {
        let url = match env::var("DISCORD_WEBHOOK_URL").ok().filter(|s| !s.is_empty()) {
            Some(url) => url,
            None => return Ok(None),
        };
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Some(Self { client, url }))
    }
}

#[async_trait]
impl WebhookApi for DiscordWebhook {
    async fn send(&self, payload: &Value) -> Result<()> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if response.status() != StatusCode::NO_CONTENT {
            return Err(anyhow!(
                "Webhook returned unexpected status {}",
                response.status()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Skipped,
    Failed(String),
}

/// Builds the notification message for an accepted report: a mention of
/// the submitter plus one embed carrying every form field and a relative
/// submission-time marker.
pub fn build_payload(
    report: &crate::models::SubmissionRequest,
    client_address: &str,
    submitted_at: DateTime<Utc>,
) -> Value {
    json!({
        "content": format!("Resignation report from <@{}>", report.identity_id),
        "embeds": [{
            "title": "Resignation report",
            "color": EMBED_COLOR,
            "description": format!("Submitted <t:{}:R>", submitted_at.timestamp()),
            "fields": [
                { "name": "Identity", "value": report.identity_id, "inline": true },
                { "name": "Name / code", "value": report.name_and_code, "inline": true },
                { "name": "Rank", "value": report.rank, "inline": true },
                { "name": "Department", "value": report.department, "inline": true },
                { "name": "Client address", "value": client_address, "inline": true },
                { "name": "Reason", "value": report.reason, "inline": false },
                { "name": "Tablet screenshot", "value": report.tablet_screenshot_url, "inline": false },
                { "name": "Inventory screenshot", "value": report.inventory_screenshot_url, "inline": false },
            ],
        }],
    })
}

/// Single delivery attempt, fire-and-forget: the outcome is logged and
/// returned for inspection but never reaches the submitter.
pub async fn dispatch(webhook: Option<&Arc<dyn WebhookApi>>, payload: &Value) -> DispatchOutcome {
    let Some(webhook) = webhook else {
        info!("No webhook configured, skipping report notification");
        return DispatchOutcome::Skipped;
    };
    match webhook.send(payload).await {
        Ok(()) => {
            info!("Report notification delivered");
            DispatchOutcome::Delivered
        }
        Err(e) => {
            warn!("Report notification failed: {}", e);
            DispatchOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubmissionRequest;

    struct FakeWebhook {
        fail: bool,
    }

    #[async_trait]
    impl WebhookApi for FakeWebhook {
        async fn send(&self, _payload: &Value) -> Result<()> {
            if self.fail {
                anyhow::bail!("Webhook returned unexpected status 400 Bad Request");
            }
            Ok(())
        }
    }

    fn report() -> SubmissionRequest {
        SubmissionRequest {
            identity_id: "123456789012345678".to_string(),
            name_and_code: "Ivan Petrov | 42".to_string(),
            rank: "5".to_string(),
            department: "DEA".to_string(),
            tablet_screenshot_url: "https://x.test/a.png".to_string(),
            inventory_screenshot_url: "https://x.test/b.png".to_string(),
            reason: "relocation".to_string(),
            client_address: None,
        }
    }

    #[test]
    fn payload_mentions_the_submitter() {
        let payload = build_payload(&report(), "10.0.0.1", Utc::now());
        let content = payload.get("content").and_then(|v| v.as_str()).unwrap();
        assert!(content.contains("<@123456789012345678>"));
    }

    #[test]
    fn payload_embed_carries_every_field() {
        let at = Utc::now();
        let payload = build_payload(&report(), "10.0.0.1", at);
        let embed = &payload["embeds"][0];
        assert_eq!(
            embed["description"].as_str(),
            Some(format!("Submitted <t:{}:R>", at.timestamp()).as_str())
        );

        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 8);
        let value_of = |name: &str| {
            fields
                .iter()
                .find(|f| f["name"].as_str() == Some(name))
                .and_then(|f| f["value"].as_str())
                .map(|s| s.to_string())
        };
        assert_eq!(value_of("Name / code").as_deref(), Some("Ivan Petrov | 42"));
        assert_eq!(value_of("Department").as_deref(), Some("DEA"));
        assert_eq!(value_of("Client address").as_deref(), Some("10.0.0.1"));
        assert_eq!(value_of("Reason").as_deref(), Some("relocation"));
        assert_eq!(
            value_of("Tablet screenshot").as_deref(),
            Some("https://x.test/a.png")
        );
        assert_eq!(
            value_of("Inventory screenshot").as_deref(),
            Some("https://x.test/b.png")
        );
    }

    #[tokio::test]
    async fn dispatch_without_endpoint_is_skipped() {
        let payload = build_payload(&report(), "10.0.0.1", Utc::now());
        assert_eq!(dispatch(None, &payload).await, DispatchOutcome::Skipped);
    }

    #[tokio::test]
    async fn dispatch_maps_send_results_to_outcomes() {
        let payload = build_payload(&report(), "10.0.0.1", Utc::now());

        let ok: Arc<dyn WebhookApi> = Arc::new(FakeWebhook { fail: false });
        assert_eq!(
            dispatch(Some(&ok), &payload).await,
            DispatchOutcome::Delivered
        );

        let failing: Arc<dyn WebhookApi> = Arc::new(FakeWebhook { fail: true });
        match dispatch(Some(&failing), &payload).await {
            DispatchOutcome::Failed(reason) => assert!(reason.contains("400")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }
}
