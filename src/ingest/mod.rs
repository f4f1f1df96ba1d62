// src/ingest/mod.rs
pub mod providers;
pub mod types;

pub use providers::json_file::JsonFileProvider;
pub use types::{CandidateItem, SourceProvider, SourceType};

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

/// Cleaned text longer than this is cut.
pub const MAX_TEXT_CHARS: usize = 1500;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Candidate items returned by providers.");
        describe_counter!(
            "ingest_dropped_total",
            "Items dropped at ingest (empty text or repeated URL)."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
    });
}

/// Clean collector text: decode entities, strip tags, unify quotes, collapse whitespace, cap length.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

/// Clean every item, drop empty ones, and keep only the first record per URL.
/// Returns the kept items and how many were dropped.
pub fn clean_and_dedup(raw: Vec<CandidateItem>) -> (Vec<CandidateItem>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;
    for mut item in raw {
        item.raw_text = clean_text(&item.raw_text);
        item.source_url = item.source_url.trim().to_string();
        if item.raw_text.is_empty() || item.source_url.is_empty() {
            dropped += 1;
            continue;
        }
        if !seen.insert(item.source_url.clone()) {
            dropped += 1;
            continue;
        }
        kept.push(item);
    }
    (kept, dropped)
}

/// Fetch from all providers once. Provider errors are logged and skipped.
pub async fn collect(providers: &[Box<dyn SourceProvider>]) -> Vec<CandidateItem> {
    ensure_metrics_described();

    let mut raw = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => raw.append(&mut v),
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
            }
        }
    }
    counter!("ingest_items_total").increment(raw.len() as u64);

    let (kept, dropped) = clean_and_dedup(raw);
    counter!("ingest_dropped_total").increment(dropped as u64);
    tracing::info!(target: "ingest", kept = kept.len(), dropped, "collected candidates");
    kept
}
