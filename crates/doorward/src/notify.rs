//! Fire-and-forget webhook notifications
//!
//! Posts plain-text messages to a chat webhook on every decision. Denials
//! of a known holder additionally ping the admin escalation channel so
//! someone follows up on the lapsed membership. Failures are logged, never
//! retried, never propagated.

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::WebhookConfig;

/// Outbound notification dispatcher.
#[derive(Clone)]
pub struct Notifier {
    http: Client,
    url: Option<String>,
    escalation_url: Option<String>,
}

impl Notifier {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            http: Client::new(),
            url: config.url.clone(),
            escalation_url: config.escalation_url.clone(),
        }
    }

    /// Notify the general channel of an admission.
    pub fn admitted(&self, holder: &str) {
        self.send(self.url.clone(), format!("{holder} just checked in"));
    }

    /// Notify of a denial; escalated denials also go to the admin channel.
    pub fn denied(&self, reason: &str, escalate: bool) {
        if escalate {
            let admin_msg = format!(
                "<!channel> ```{reason}``` Maybe we missed renewing them or they need to be reached out to?"
            );
            // Escalation falls back to the general channel when no admin
            // webhook is configured
            let target = self.escalation_url.clone().or_else(|| self.url.clone());
            self.send(target, admin_msg);
        }
        self.send(self.url.clone(), format!("denied access: {reason}"));
    }

    fn send(&self, url: Option<String>, text: String) {
        let Some(url) = url else {
            debug!(text = %text, "webhook not configured, notification dropped");
            return;
        };
        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(e) = post_text(&http, &url, &text).await {
                warn!(error = %e, "notification not delivered");
            }
        });
    }
}

async fn post_text(http: &Client, url: &str, text: &str) -> anyhow::Result<()> {
    let resp = http
        .post(url)
        .json(&serde_json::json!({ "text": text }))
        .send()
        .await?;

    if !resp.status().is_success() {
        anyhow::bail!("webhook returned {}", resp.status());
    }
    Ok(())
}
