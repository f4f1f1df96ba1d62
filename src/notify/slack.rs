// src/notify/slack.rs
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{ChannelRouter, Notifier, OpportunityPayload};

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Posts Block Kit messages through `chat.postMessage` with a bot token.
pub struct SlackNotifier {
    token: Option<String>,
    router: ChannelRouter,
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct SlackResp {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(token: Option<String>, router: ChannelRouter) -> Self {
        let client = Client::builder()
            .user_agent("lead-hunter/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            router,
            client,
            endpoint: POST_MESSAGE_URL.to_string(),
        }
    }

    /// Token from `SLACK_BOT_TOKEN`; `SLACK_DEFAULT_CHANNEL` overrides the router default.
    pub fn from_env(router: ChannelRouter) -> Self {
        let router = router.with_default(std::env::var("SLACK_DEFAULT_CHANNEL").ok());
        Self::new(std::env::var("SLACK_BOT_TOKEN").ok(), router)
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }
}

/// Block Kit layout: header, summary, source/country context, fit and solution side by side,
/// value proposition.
pub fn build_blocks(p: &OpportunityPayload) -> Value {
    let d = &p.details;
    let country = p
        .country
        .as_deref()
        .map(str::to_uppercase)
        .unwrap_or_else(|| "N/A".to_string());
    json!([
        {
            "type": "header",
            "text": { "type": "plain_text", "text": format!("New opportunity: {}", d.company_name), "emoji": true }
        },
        {
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Opportunity:*\n{}", d.opportunity_summary) }
        },
        {
            "type": "context",
            "elements": [
                { "type": "mrkdwn", "text": format!("*Source:* <{}|article> | *Country:* {}", p.source_url, country) }
            ]
        },
        { "type": "divider" },
        {
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*Why it fits:*\n{}", d.fit_rationale) },
                { "type": "mrkdwn", "text": format!("*Proposed solution:*\n{}", d.proposed_solution) }
            ]
        },
        { "type": "divider" },
        {
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Value proposition:*\n_{}_", d.value_proposition) }
        }
    ])
}

fn missing_fields(p: &OpportunityPayload) -> Vec<&'static str> {
    let d = &p.details;
    [
        ("company_name", &d.company_name),
        ("opportunity_summary", &d.opportunity_summary),
        ("fit_rationale", &d.fit_rationale),
        ("proposed_solution", &d.proposed_solution),
        ("value_proposition", &d.value_proposition),
    ]
    .into_iter()
    .filter(|(_, v)| v.trim().is_empty())
    .map(|(k, _)| k)
    .collect()
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, payload: &OpportunityPayload, region: Option<&str>) -> bool {
        let Some(token) = &self.token else {
            tracing::warn!(target: "notify", "slack disabled (no SLACK_BOT_TOKEN)");
            return false;
        };
        let Some(channel) = self.router.resolve(region) else {
            tracing::warn!(target: "notify", region = region.unwrap_or("-"), "no channel for region and no default");
            return false;
        };
        let missing = missing_fields(payload);
        if !missing.is_empty() {
            tracing::warn!(target: "notify", ?missing, "incomplete opportunity; not sent");
            return false;
        }

        let d = &payload.details;
        let body = json!({
            "channel": channel,
            "text": format!("New opportunity: {} - {} ({})", d.company_name, d.opportunity_summary, payload.source_url),
            "blocks": build_blocks(payload),
        });

        let resp = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "notify", error = %e, "slack post failed");
                return false;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(target: "notify", status = %resp.status(), "slack non-2xx");
            return false;
        }
        match resp.json::<SlackResp>().await {
            Ok(SlackResp { ok: true, .. }) => {
                tracing::info!(target: "notify", channel, company = %d.company_name, "slack notification sent");
                true
            }
            Ok(SlackResp { error, .. }) => {
                tracing::warn!(target: "notify", error = error.as_deref().unwrap_or("unknown"), "slack api error");
                false
            }
            Err(e) => {
                tracing::warn!(target: "notify", error = %e, "slack reply unreadable");
                false
            }
        }
    }
}
