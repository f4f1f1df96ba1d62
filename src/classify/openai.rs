// src/classify/openai.rs
//! Chat-completions client behind `ClassifierOracle`.
//!
//! Transport problems (connect errors, non-2xx other than 429, a body cut off mid-read) are
//! `ClassificationFailure` and leave the item pending. Only a complete reply that does not
//! hold a usable verdict is `MalformedVerdict`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::verdict::{parse_verdict, Verdict};
use super::{build_prompt, ClassificationRequest, ClassifierOracle};
use crate::analyze::anon_hash;
use crate::error::PipelineError;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Chat-completions oracle. The model name comes from the active budget tier per call.
pub struct OpenAiClassifier {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClassifier {
    pub fn new(api_key: String) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .user_agent("lead-hunter/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PipelineError::ClassificationFailure(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            endpoint: CHAT_URL.to_string(),
        })
    }

    /// `None` when `OPENAI_API_KEY` is unset or blank.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("OPENAI_API_KEY").ok()?;
        if key.trim().is_empty() {
            return None;
        }
        Self::new(key).ok()
    }

    /// Point at a compatible endpoint (proxies, local gateways).
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }
}

#[async_trait]
impl ClassifierOracle for OpenAiClassifier {
    async fn classify(
        &self,
        model: &str,
        req: &ClassificationRequest,
    ) -> Result<Verdict, PipelineError> {
        let prompt = build_prompt(req);
        let body = Req {
            model,
            messages: vec![
                Msg {
                    role: "system",
                    content: "Answer with a single JSON object and nothing else.",
                },
                Msg {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.1,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::ClassificationFailure(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PipelineError::RateLimited);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let short: String = text.chars().take(200).collect();
            return Err(PipelineError::ClassificationFailure(format!(
                "{status}: {short}"
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::ClassificationFailure(format!("reading reply: {e}")))?;
        let parsed: Resp = serde_json::from_slice(&body)
            .map_err(|e| PipelineError::MalformedVerdict(format!("unexpected envelope: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(target: "classify", model, id = %anon_hash(&req.text), bytes = content.len(), "oracle replied");
        parse_verdict(&content)
    }
}
