// src/notify/mod.rs
pub mod routing;
pub mod slack;

pub use routing::{ChannelRouter, ChannelsConfig};
pub use slack::SlackNotifier;

use serde::Serialize;

use crate::classify::OpportunityDetails;

/// What a sink receives for one accepted opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpportunityPayload {
    pub source_url: String,
    pub country: Option<String>,
    pub details: OpportunityDetails,
}

/// Outbound sink. Returns `true` on confirmed delivery; failures are logged by the sink.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &OpportunityPayload, region: Option<&str>) -> bool;
}

/// Logs instead of delivering; used when no sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, payload: &OpportunityPayload, region: Option<&str>) -> bool {
        tracing::info!(
            target: "notify",
            company = %payload.details.company_name,
            url = %payload.source_url,
            region = region.unwrap_or("-"),
            "opportunity (log only)"
        );
        true
    }
}
