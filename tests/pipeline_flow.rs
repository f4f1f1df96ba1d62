// tests/pipeline_flow.rs
//
// End-to-end cycles through the orchestrator with stubbed oracle, notifier and store.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::*;
use lead_hunter::classify::LearnedCriteria;
use lead_hunter::error::PipelineError;
use lead_hunter::pipeline::CycleSettings;
use lead_hunter::relevance::RelevanceFilter;
use lead_hunter::store::{MemoryStore, RecordStatus, Store, StoredRecord};

const SANTANDER: &str = "Banco Santander acquires fintech Kueski for 500 million";

#[tokio::test]
async fn same_url_is_classified_once() {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ScriptedOracle::always(rejected("not a fit")));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store.clone(), oracle.clone(), notifier, tiers(&[("A", 20)]));

    let report = orch
        .run_cycle(vec![
            news("https://n/1", "Iberdrola opens a wind farm in Galicia"),
            news("https://n/1", "Iberdrola opens a wind farm in Galicia"),
        ])
        .await
        .unwrap();

    assert_eq!(oracle.call_count(), 1);
    assert_eq!(report.skipped_seen, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.rejections, 1);

    // already stored → skipped on the next cycle too
    let report = orch
        .run_cycle(vec![news("https://n/1", "Iberdrola opens a wind farm in Galicia")])
        .await
        .unwrap();
    assert_eq!(report.skipped_seen, 1);
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn rate_limit_exhausting_retries_leaves_item_pending() {
    let store = Arc::new(CountingStore::default());
    let oracle = Arc::new(ScriptedOracle::always(Err(PipelineError::RateLimited)));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store.clone(), oracle.clone(), notifier, tiers(&[("A", 20)]));

    let report = orch
        .run_cycle(vec![news("https://n/rl", "Telefonica launches a data venture")])
        .await
        .unwrap();

    assert_eq!(oracle.call_count(), 3, "three attempts");
    assert_eq!(report.pending, 1);
    assert_eq!(report.calls_made, 0, "failed call refunded");
    assert_eq!(store.pending_inserts.load(Ordering::SeqCst), 1);
    // pending records are dropped at cycle end so the URL is retried later
    assert!(store.query_urls().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_retryable_failure_is_not_retried() {
    let store = Arc::new(CountingStore::default());
    let oracle = Arc::new(ScriptedOracle::always(Err(PipelineError::ClassificationFailure(
        "500: upstream".into(),
    ))));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store.clone(), oracle.clone(), notifier, tiers(&[("A", 20)]));

    let report = orch
        .run_cycle(vec![news("https://n/x", "Cemex invests in a construction startup")])
        .await
        .unwrap();

    assert_eq!(oracle.call_count(), 1);
    assert_eq!(report.pending, 1);
    assert_eq!(report.calls_made, 0);
}

#[tokio::test]
async fn exhausted_budget_stops_the_cycle() {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ScriptedOracle::always(rejected("no")));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store, oracle.clone(), notifier, tiers(&[("A", 1)]));

    let report = orch
        .run_cycle(vec![
            news("https://n/a", "Repsol enters the hydrogen market"),
            news("https://n/b", "Mercado Libre expands logistics in Chile"),
            news("https://n/c", "Grupo Bimbo buys a bakery chain"),
        ])
        .await
        .unwrap();

    assert!(report.budget_exhausted);
    assert_eq!(report.calls_made, 1);
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(report.rejections, 1);
}

#[tokio::test]
async fn tiers_are_used_in_order_and_reset_each_cycle() {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ScriptedOracle::always(rejected("no")));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store, oracle.clone(), notifier, tiers(&[("A", 1), ("B", 1)]));

    let report = orch
        .run_cycle(vec![
            news("https://n/1", "Repsol enters the hydrogen market"),
            news("https://n/2", "Mercado Libre expands logistics in Chile"),
            news("https://n/3", "Grupo Bimbo buys a bakery chain"),
        ])
        .await
        .unwrap();
    assert_eq!(oracle.models(), vec!["A", "B"]);
    assert!(report.budget_exhausted);

    let report = orch
        .run_cycle(vec![news("https://n/3", "Grupo Bimbo buys a bakery chain")])
        .await
        .unwrap();
    assert!(!report.budget_exhausted);
    assert_eq!(oracle.models(), vec!["A", "B", "A"]);
}

#[tokio::test]
async fn opportunity_is_recorded_notified_and_learned() {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ScriptedOracle::always(opportunity("Banco Santander", SANTANDER)));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let filter = RelevanceFilter::new(semantic(Some(Arc::new(HashEmbedder))), None);
    let mut orch =
        orchestrator_with_filter(store.clone(), oracle, notifier.clone(), tiers(&[("A", 5)]), filter);

    let report = orch
        .run_cycle(vec![news("https://n/s", SANTANDER)])
        .await
        .unwrap();

    assert_eq!(report.new_opportunities, 1);
    assert_eq!(report.notify_failures, 0);
    assert_eq!(notifier.sent_count(), 1);
    {
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].1.as_deref(), Some("es"));
        assert_eq!(sent[0].0.details.company_name, "Banco Santander");
    }

    let table = store.snapshot().await;
    let rec = table.get("https://n/s").unwrap();
    assert_eq!(rec.status, RecordStatus::Notified);
    assert!(rec.notified_at.is_some());
    assert_eq!(rec.company_name.as_deref(), Some("Banco Santander"));

    let stats = orch.training_stats();
    assert_eq!(stats.positive_count, 1);
    assert_eq!(stats.negative_count, 0);
}

#[tokio::test]
async fn restated_story_within_a_cycle_is_a_duplicate() {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ScriptedOracle::always(opportunity("Banco Santander", SANTANDER)));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store, oracle.clone(), notifier.clone(), tiers(&[("A", 5)]));

    let report = orch
        .run_cycle(vec![
            news("https://outlet-a/1", SANTANDER),
            news("https://outlet-b/9", &format!("{SANTANDER} dollars")),
        ])
        .await
        .unwrap();

    assert_eq!(report.new_opportunities, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(notifier.sent_count(), 1);
}

#[tokio::test]
async fn restated_story_in_a_later_cycle_is_a_duplicate() {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ScriptedOracle::always(opportunity("Banco Santander", SANTANDER)));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store, oracle.clone(), notifier, tiers(&[("A", 5)]));

    orch.run_cycle(vec![news("https://outlet-a/1", SANTANDER)])
        .await
        .unwrap();
    let report = orch
        .run_cycle(vec![news("https://outlet-b/9", &format!("{SANTANDER} dollars"))])
        .await
        .unwrap();

    assert_eq!(report.duplicates, 1);
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn undelivered_opportunity_does_not_suppress_later_items() {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ScriptedOracle::always(opportunity("Banco Santander", SANTANDER)));
    let notifier = Arc::new(RecordingNotifier::new(false));
    let mut orch = orchestrator(store.clone(), oracle.clone(), notifier, tiers(&[("A", 5)]));

    let report = orch
        .run_cycle(vec![
            news("https://outlet-a/1", SANTANDER),
            news("https://outlet-b/9", &format!("{SANTANDER} dollars")),
        ])
        .await
        .unwrap();

    assert_eq!(report.duplicates, 0);
    assert_eq!(report.new_opportunities, 2);
    assert_eq!(report.notify_failures, 2);
    assert_eq!(oracle.call_count(), 2);

    // records kept, but never stamped as delivered
    let table = store.snapshot().await;
    assert_eq!(table.len(), 2);
    assert!(table.get("https://outlet-a/1").unwrap().notified_at.is_none());
    assert!(store.query_recent_notified(7).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_verdict_counts_as_rejection() {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ScriptedOracle::always(Err(PipelineError::MalformedVerdict(
        "missing field value_proposition".into(),
    ))));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store.clone(), oracle.clone(), notifier.clone(), tiers(&[("A", 5)]));

    let report = orch
        .run_cycle(vec![news("https://n/m", "Bancolombia launches a neobank")])
        .await
        .unwrap();

    assert_eq!(report.rejections, 1);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.pending, 0);
    assert_eq!(report.calls_made, 1, "slot is spent");
    assert_eq!(oracle.call_count(), 1, "not retried");
    assert_eq!(notifier.sent_count(), 0);

    let table = store.snapshot().await;
    let rec = table.get("https://n/m").unwrap();
    assert_eq!(rec.status, RecordStatus::AiRejected);
    assert!(rec
        .rejection_reason
        .as_deref()
        .unwrap()
        .starts_with("malformed verdict"));
}

#[tokio::test]
async fn mixed_outcomes_are_tallied() {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ScriptedOracle::scripted(
        vec![
            rejected("consumer product"),
            opportunity("Cemex", "Cemex launches a construction marketplace"),
            Err(PipelineError::ClassificationFailure("timeout".into())),
        ],
        rejected("no"),
    ));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store.clone(), oracle, notifier, tiers(&[("A", 10)]));

    let report = orch
        .run_cycle(vec![
            news("https://n/1", "Zara opens a store in Lima"),
            news("https://n/2", "Cemex launches a construction marketplace for builders"),
            news("https://n/3", "Petrobras announces a venture fund"),
            news("https://n/4", "   "),
        ])
        .await
        .unwrap();

    assert_eq!(report.processed, 4);
    assert_eq!(report.rejections, 1);
    assert_eq!(report.new_opportunities, 1);
    assert_eq!(report.pending, 1);
    assert_eq!(report.filtered, 1, "empty text never reaches the oracle");
    assert_eq!(report.calls_made, 2);

    let urls = store.query_urls().await.unwrap();
    assert!(urls.contains("https://n/1"));
    assert!(urls.contains("https://n/2"));
    assert!(!urls.contains("https://n/3"));
}

#[tokio::test]
async fn feedback_headlines_reach_the_prompt_context() {
    let mut confirmed = StoredRecord::rejection(&news("https://old/1", "Old story"), "x", Utc::now());
    confirmed.status = RecordStatus::Relevant;
    confirmed.headline = "Falabella spins off its fintech".into();
    let store = Arc::new(MemoryStore::with_records([confirmed]).unwrap());
    assert_eq!(
        store.feedback_examples(3).await.unwrap(),
        vec!["Falabella spins off its fintech".to_string()]
    );

    let oracle = Arc::new(ScriptedOracle::always(rejected("no")));
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store, oracle.clone(), notifier, tiers(&[("A", 2)]))
        .with_criteria(Some(LearnedCriteria::default()));

    // empty criteria are ignored, so confirmed headlines become the criteria block
    let report = orch
        .run_cycle(vec![news("https://n/f", "Falabella launches a fintech arm")])
        .await
        .unwrap();
    assert_eq!(report.rejections, 1);
    assert_eq!(oracle.call_count(), 1);
    let seen = oracle.criteria_seen.lock().unwrap();
    assert!(
        seen[0].contains("Falabella spins off its fintech"),
        "criteria block was {:?}",
        seen[0]
    );
}

#[tokio::test]
async fn distilled_criteria_take_precedence_over_feedback() {
    let mut confirmed = StoredRecord::rejection(&news("https://old/2", "Old story"), "x", Utc::now());
    confirmed.status = RecordStatus::Relevant;
    confirmed.headline = "Falabella spins off its fintech".into();
    let store = Arc::new(MemoryStore::with_records([confirmed]).unwrap());

    let oracle = Arc::new(ScriptedOracle::always(rejected("no")));
    let criteria = LearnedCriteria {
        must_have_criteria: vec!["Named large company".into()],
        ..Default::default()
    };
    let notifier = Arc::new(RecordingNotifier::new(true));
    let mut orch = orchestrator(store, oracle.clone(), notifier, tiers(&[("A", 2)]))
        .with_criteria(Some(criteria));

    orch.run_cycle(vec![news("https://n/g", "Cencosud opens a retail media venture")])
        .await
        .unwrap();
    let seen = oracle.criteria_seen.lock().unwrap();
    assert!(seen[0].contains("Named large company"), "{:?}", seen[0]);
    assert!(!seen[0].contains("Falabella"));
}

#[tokio::test(start_paused = true)]
async fn every_call_waits_for_the_rate_limit() {
    let oracle = Arc::new(ScriptedOracle::always(rejected("no")));
    let settings = CycleSettings {
        rate_limit: Duration::from_secs(15),
        ..fast_settings()
    };
    let mut orch = orchestrator_with(
        Arc::new(MemoryStore::new()),
        oracle.clone(),
        Arc::new(RecordingNotifier::new(true)),
        tiers(&[("A", 2), ("B", 5)]),
        RelevanceFilter::new(semantic(None), None),
        settings,
    );

    let started = tokio::time::Instant::now();
    let report = orch
        .run_cycle(vec![
            news("https://n/r1", "Iberdrola opens a wind farm in Galicia"),
            news("https://n/r2", "Cemex launches a construction marketplace"),
            news("https://n/r3", "Petrobras announces a venture fund"),
        ])
        .await
        .unwrap();

    assert_eq!(oracle.call_count(), 3);
    assert_eq!(report.calls_made, 3);
    assert!(
        started.elapsed() >= Duration::from_secs(45),
        "only {:?} elapsed",
        started.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn filtered_items_do_not_wait() {
    let oracle = Arc::new(ScriptedOracle::always(rejected("no")));
    let settings = CycleSettings {
        rate_limit: Duration::from_secs(15),
        ..fast_settings()
    };
    let mut orch = orchestrator_with(
        Arc::new(MemoryStore::new()),
        oracle.clone(),
        Arc::new(RecordingNotifier::new(true)),
        tiers(&[("A", 5)]),
        RelevanceFilter::new(semantic(None), None),
        settings,
    );

    let started = tokio::time::Instant::now();
    let report = orch
        .run_cycle(vec![news("https://n/e1", "  "), news("https://n/e2", "")])
        .await
        .unwrap();
    assert_eq!(report.filtered, 2);
    assert_eq!(oracle.call_count(), 0);
    assert!(started.elapsed() < Duration::from_secs(15));
}

const SPORTS: [&str; 3] = [
    "Real Madrid wins the football match with a late goal",
    "Barcelona wins the football match with an early goal",
    "Sevilla loses the football match at home",
];

async fn sports_averse_filter() -> RelevanceFilter {
    let mut f = semantic(Some(Arc::new(HashEmbedder)));
    for p in [
        "Bank launches digital venture studio for fintech startups",
        "Retailer invests in corporate venture building program",
        "Insurer creates new digital business unit with startup partners",
        "Telecom operator announces fintech spin-off and venture fund",
        "Airline launches loyalty fintech venture with digital wallet",
    ] {
        f.add_positive(p).await.unwrap();
    }
    f.add_negative(SPORTS[0], "sports news").await.unwrap();
    RelevanceFilter::new(f, None)
}

#[tokio::test]
async fn batch_minimum_forces_the_best_rejected_items_through() {
    let sports = || {
        SPORTS
            .iter()
            .enumerate()
            .map(|(i, t)| news(&format!("https://n/sp{i}"), t))
            .collect::<Vec<_>>()
    };

    // without a minimum, the trained filter stops every sports story
    let oracle = Arc::new(ScriptedOracle::always(rejected("no")));
    let mut strict = orchestrator_with_filter(
        Arc::new(MemoryStore::new()),
        oracle.clone(),
        Arc::new(RecordingNotifier::new(true)),
        tiers(&[("A", 5)]),
        sports_averse_filter().await,
    );
    let report = strict.run_cycle(sports()).await.unwrap();
    assert_eq!(report.filtered, 3);
    assert_eq!(oracle.call_count(), 0);

    let oracle = Arc::new(ScriptedOracle::always(rejected("no")));
    let settings = CycleSettings {
        batch_min_pass: 1,
        ..fast_settings()
    };
    let mut lenient = orchestrator_with(
        Arc::new(MemoryStore::new()),
        oracle.clone(),
        Arc::new(RecordingNotifier::new(true)),
        tiers(&[("A", 5)]),
        sports_averse_filter().await,
        settings,
    );
    let report = lenient.run_cycle(sports()).await.unwrap();
    assert_eq!(report.filtered, 2);
    assert_eq!(report.rejections, 1);
    assert_eq!(oracle.call_count(), 1);
}
