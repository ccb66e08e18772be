use nomad_events::{Criticality, Notification};
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

const COLOR_SUCCESS: u32 = 0x2e_cc_71;
const COLOR_FAILURE: u32 = 0xe7_4c_3c;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Posts each notification to every configured Discord webhook, once.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    http: Client,
    webhooks: Vec<String>,
}

impl DiscordNotifier {
    pub fn new(http: Client, webhooks: Vec<String>) -> Self {
        Self { http, webhooks }
    }

    pub fn destinations(&self) -> usize {
        self.webhooks.len()
    }

    /// Failures are logged and dropped; delivery is at-most-once.
    pub async fn notify(&self, notification: &Notification) -> usize {
        let body = render(notification);
        let mut delivered = 0;
        for (destination, url) in self.webhooks.iter().enumerate() {
            match self.post(url, &body).await {
                Ok(()) => delivered += 1,
                Err(err) => tracing::warn!(
                    destination,
                    task = %notification.task,
                    event_type = %notification.event_type,
                    error = %err,
                    "failed to deliver notification"
                ),
            }
        }
        delivered
    }

    async fn post(&self, url: &str, body: &Value) -> Result<(), NotifyError> {
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }
        Ok(())
    }
}

pub fn content(notification: &Notification) -> String {
    let mut text = format!(
        "**{}** task is **{}**: {}",
        notification.task, notification.event_type, notification.display_message
    );
    if !notification.details.is_empty() {
        let details = notification
            .details
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        text.push_str(&format!("\n```\n{details}\n```"));
    }
    text
}

pub fn render(notification: &Notification) -> Value {
    let mut embed = json!({
        "description": content(notification),
        "footer": {"text": format!("{} \u{b7} {}", notification.node_name, notification.time)},
    });
    let color = match notification.criticality {
        Criticality::Success => Some(COLOR_SUCCESS),
        Criticality::Failure => Some(COLOR_FAILURE),
        Criticality::None => None,
    };
    if let Some(color) = color {
        embed["color"] = json!(color);
    }
    json!({ "embeds": [embed] })
}
