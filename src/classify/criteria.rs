// src/classify/criteria.rs
//! Learned classification criteria distilled from historical human feedback.
//!
//! Loaded from a JSON file produced offline; rendered into the classification prompt.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaMetadata {
    #[serde(default)]
    pub distilled_from: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnedCriteria {
    pub must_have_criteria: Vec<String>,
    pub must_not_have_criteria: Vec<String>,
    pub positive_signals: Vec<String>,
    pub red_flags: Vec<String>,
    pub geographic_rules: Vec<String>,
    pub industry_patterns: Vec<String>,
    pub metadata: CriteriaMetadata,
}

impl LearnedCriteria {
    /// `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading criteria {}", path.display()))?;
        let c: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing criteria {}", path.display()))?;
        Ok(Some(c))
    }

    pub fn is_empty(&self) -> bool {
        self.must_have_criteria.is_empty()
            && self.must_not_have_criteria.is_empty()
            && self.positive_signals.is_empty()
            && self.red_flags.is_empty()
            && self.geographic_rules.is_empty()
            && self.industry_patterns.is_empty()
    }

    /// Compact prompt block; empty sections are omitted.
    pub fn format_for_prompt(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = String::from("LEARNED CRITERIA FROM HISTORICAL FEEDBACK\n");
        out.push_str(&format!(
            "(distilled from {} reviewed examples)\n\n",
            self.metadata.distilled_from
        ));

        let sections: [(&str, &[String]); 6] = [
            ("MUST HAVE", &self.must_have_criteria),
            ("MUST NOT HAVE", &self.must_not_have_criteria),
            ("POSITIVE SIGNALS", &self.positive_signals),
            ("RED FLAGS", &self.red_flags),
            ("GEOGRAPHIC RULES", &self.geographic_rules),
            ("INDUSTRY PATTERNS", &self.industry_patterns),
        ];
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            out.push_str(title);
            out.push_str(":\n");
            for it in items {
                out.push_str("  - ");
                out.push_str(it);
                out.push('\n');
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    /// Extraction guidance: the first three positive signals.
    pub fn extraction_guidance(&self) -> String {
        if self.positive_signals.is_empty() {
            return String::new();
        }
        let mut out = String::from("Make sure to capture these elements if present:\n");
        for s in self.positive_signals.iter().take(3) {
            out.push_str("  - ");
            out.push_str(s);
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// Fallback criteria when nothing was distilled: recent human-confirmed relevant headlines.
pub fn criteria_from_examples(headlines: &[String]) -> String {
    if headlines.is_empty() {
        return String::new();
    }
    let mut out = String::from("RELEVANT EXAMPLES:\n");
    for h in headlines {
        out.push_str("- ");
        out.push_str(h);
        out.push('\n');
    }
    out.trim_end().to_string()
}
