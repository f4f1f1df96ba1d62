// src/classify/verdict.rs
//! Structured verdicts and their validation at the oracle boundary.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Enrichment the oracle must supply for an accepted item. All fields non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityDetails {
    pub company_name: String,
    pub opportunity_summary: String,
    pub fit_rationale: String,
    pub proposed_solution: String,
    pub value_proposition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    Rejected { reason: String },
    Opportunity(OpportunityDetails),
}

impl Verdict {
    pub fn is_opportunity(&self) -> bool {
        matches!(self, Verdict::Opportunity(_))
    }
}

/// Loose wire shape; every field optional so validation can name what is missing.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    is_opportunity: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    opportunity_summary: Option<String>,
    #[serde(default, alias = "igeneris_fit", alias = "company_fit", alias = "fit")]
    fit_rationale: Option<String>,
    #[serde(default)]
    proposed_solution: Option<String>,
    #[serde(default)]
    value_proposition: Option<String>,
}

pub const DEFAULT_REJECTION_REASON: &str = "no reason given";

/// Strip a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse and validate an oracle reply.
///
/// An accepted verdict missing any enrichment field is `MalformedVerdict`, same as
/// unparseable JSON.
pub fn parse_verdict(raw: &str) -> Result<Verdict, PipelineError> {
    let body = strip_code_fence(raw);
    let parsed: RawVerdict = serde_json::from_str(body)
        .map_err(|e| PipelineError::MalformedVerdict(format!("invalid json: {e}")))?;

    match parsed.is_opportunity {
        None => Err(PipelineError::MalformedVerdict(
            "missing is_opportunity".into(),
        )),
        Some(false) => {
            let reason = parsed
                .reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());
            Ok(Verdict::Rejected { reason })
        }
        Some(true) => {
            let fields = [
                ("company_name", &parsed.company_name),
                ("opportunity_summary", &parsed.opportunity_summary),
                ("fit_rationale", &parsed.fit_rationale),
                ("proposed_solution", &parsed.proposed_solution),
                ("value_proposition", &parsed.value_proposition),
            ];
            let missing: Vec<&str> = fields
                .iter()
                .filter(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
                .map(|(name, _)| *name)
                .collect();
            if !missing.is_empty() {
                return Err(PipelineError::MalformedVerdict(format!(
                    "opportunity missing fields: {}",
                    missing.join(", ")
                )));
            }
            let take = |v: Option<String>| v.unwrap_or_default().trim().to_string();
            Ok(Verdict::Opportunity(OpportunityDetails {
                company_name: take(parsed.company_name),
                opportunity_summary: take(parsed.opportunity_summary),
                fit_rationale: take(parsed.fit_rationale),
                proposed_solution: take(parsed.proposed_solution),
                value_proposition: take(parsed.value_proposition),
            }))
        }
    }
}
