// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete cascade pipeline.
//!
//! Each test builds an isolated engine over a scripted `MockProvider`, so
//! routing, scoring, escalation, and admission decisions are exercised
//! together the way a real deployment would see them. Tests are independent
//! and order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use cascade_config::{CascadeConfig, DegradationStep, EnforcementMode, TierConfig};
use cascade_core::{CascadeError, Domain, LimitKind, ModelRole, ModelSpec, ProviderAdapter, Query};
use cascade_engine::{BatchStrategy, CascadeEngine, ExportFormat};
use cascade_test_utils::{MockProvider, MockReply};

const DRAFT_INPUT_RATE: f64 = 0.8;
const DRAFT_OUTPUT_RATE: f64 = 4.0;
const VERIFIER_INPUT_RATE: f64 = 15.0;
const VERIFIER_OUTPUT_RATE: f64 = 75.0;

fn catalog() -> Vec<ModelSpec> {
    vec![
        ModelSpec {
            name: "draft-s".to_string(),
            role: ModelRole::Draft,
            input_cost_per_mtok: DRAFT_INPUT_RATE,
            output_cost_per_mtok: DRAFT_OUTPUT_RATE,
            specializations: vec![],
            supports_tools: false,
        },
        ModelSpec {
            name: "verifier-xl".to_string(),
            role: ModelRole::Verifier,
            input_cost_per_mtok: VERIFIER_INPUT_RATE,
            output_cost_per_mtok: VERIFIER_OUTPUT_RATE,
            specializations: vec![],
            supports_tools: true,
        },
    ]
}

fn engine(provider: Arc<MockProvider>) -> CascadeEngine {
    CascadeEngine::new(CascadeConfig::default(), catalog(), provider).unwrap()
}

/// Mirrors the mock provider's deterministic usage accounting.
fn mock_tokens(text: &str) -> f64 {
    (text.len() / 4).max(1) as f64
}

fn invocation_cost(input_rate: f64, output_rate: f64, query: &str, answer: &str) -> f64 {
    mock_tokens(query) / 1_000_000.0 * input_rate + mock_tokens(answer) / 1_000_000.0 * output_rate
}

// A query the rule classifier reliably rates moderate, with a reply that
// echoes every salient term and carries near-certain logprobs.
const MODERATE_QUERY: &str = "Summarize the causes of the French Revolution";
const STRONG_DRAFT: &str =
    "To summarize the causes of the French Revolution: crushing state debt, failed harvests \
     and bread shortages, resentment of aristocratic privilege, and Enlightenment ideas that \
     undermined the legitimacy of the old order.";
const WEAK_DRAFT: &str = "Hmm, it might have been something about taxes, I think.";

// ---- Routing ----

#[tokio::test]
async fn simple_query_routes_direct_to_cheapest() {
    let provider = Arc::new(MockProvider::with_replies(vec![MockReply::text("4.")]));
    let engine = engine(Arc::clone(&provider));

    let result = engine.run(Query::new("What's 2+2?")).await.unwrap();

    assert_eq!(result.content, "4.");
    assert_eq!(result.model_used, "draft-s");
    assert_eq!(result.draft_accepted, None);
    assert_eq!(provider.total_calls().await, 1);
    assert_eq!(provider.calls_for("verifier-xl").await, 0);
    assert!(result.savings_percent > 0.0);
}

#[tokio::test]
async fn expert_query_routes_direct_to_strongest() {
    let provider = Arc::new(MockProvider::with_replies(vec![MockReply::text(
        "Assume sqrt(2) = p/q in lowest terms; then p^2 = 2q^2, so p is even...",
    )]));
    let engine = engine(Arc::clone(&provider));

    let query = Query::new(
        "Construct a formal proof that this distributed consensus algorithm preserves \
         safety under network partition, step by step, covering each failure mode of \
         the leader election phase in detail",
    );
    let result = engine.run(query).await.unwrap();

    assert_eq!(result.model_used, "verifier-xl");
    assert_eq!(result.draft_accepted, None);
    assert_eq!(provider.calls_for("draft-s").await, 0);
    assert_eq!(provider.calls_for("verifier-xl").await, 1);
    // Direct-strongest has no cheaper baseline to save against.
    assert!(result.savings_percent.abs() < 1e-9);
}

// ---- Draft acceptance and escalation ----

#[tokio::test]
async fn confident_draft_accepted_without_escalation() {
    let provider = Arc::new(MockProvider::with_replies(vec![MockReply::with_logprobs(
        STRONG_DRAFT,
        vec![-0.05; 20],
    )]));
    let engine = engine(Arc::clone(&provider));

    let result = engine.run(Query::new(MODERATE_QUERY)).await.unwrap();

    assert_eq!(result.model_used, "draft-s");
    assert_eq!(result.draft_accepted, Some(true));
    assert_eq!(provider.calls_for("verifier-xl").await, 0);

    // Cost covers exactly the one model invoked.
    let expected =
        invocation_cost(DRAFT_INPUT_RATE, DRAFT_OUTPUT_RATE, MODERATE_QUERY, STRONG_DRAFT);
    assert!((result.total_cost_usd - expected).abs() < 1e-12);
    assert!(result.savings_percent > 0.0);
    assert!(result.latencies.verify.is_none());
}

#[tokio::test]
async fn weak_draft_escalates_to_verifier() {
    let verifier_answer = "The French Revolution was caused by fiscal crisis, famine, and \
                           deep resentment of the privileged estates.";
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::with_logprobs(WEAK_DRAFT, vec![-2.5; 10]),
        MockReply::text(verifier_answer),
    ]));
    let engine = engine(Arc::clone(&provider));

    let result = engine.run(Query::new(MODERATE_QUERY)).await.unwrap();

    assert_eq!(result.content, verifier_answer);
    assert_eq!(result.model_used, "verifier-xl");
    assert_eq!(result.draft_accepted, Some(false));
    assert_eq!(provider.calls_for("draft-s").await, 1);
    assert_eq!(provider.calls_for("verifier-xl").await, 1);

    // Escalation pays for both legs, never the verifier alone.
    let expected =
        invocation_cost(DRAFT_INPUT_RATE, DRAFT_OUTPUT_RATE, MODERATE_QUERY, WEAK_DRAFT)
            + invocation_cost(
                VERIFIER_INPUT_RATE,
                VERIFIER_OUTPUT_RATE,
                MODERATE_QUERY,
                verifier_answer,
            );
    assert!((result.total_cost_usd - expected).abs() < 1e-12);
    assert!(result.savings_percent < 0.0);
    assert!(result.latencies.verify.is_some());
}

#[tokio::test]
async fn off_topic_answer_escalates_despite_confident_logprobs() {
    // Fluent, high-probability prose that never addresses the question.
    let off_topic = "Stock markets rallied strongly today as investors cheered upbeat \
                     quarterly earnings reports across the technology sector.";
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::with_logprobs(off_topic, vec![-0.01; 10]),
        MockReply::text("For seasonal migraines, first-line treatment options include..."),
    ]));
    let engine = engine(Arc::clone(&provider));

    let query =
        Query::new("Summarize the treatment options for seasonal migraines").with_domain(Domain::Medical);
    let result = engine.run(query).await.unwrap();

    assert_eq!(result.domain, Domain::Medical);
    assert_eq!(result.draft_accepted, Some(false));
    assert_eq!(result.model_used, "verifier-xl");
}

// ---- Provider failure handling ----

#[tokio::test]
async fn draft_failure_falls_through_to_verifier() {
    let verifier_answer = "The causes of the French Revolution were primarily fiscal.";
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::PermanentFailure("model decommissioned".to_string()),
        MockReply::text(verifier_answer),
    ]));
    let engine = engine(Arc::clone(&provider));

    let result = engine.run(Query::new(MODERATE_QUERY)).await.unwrap();

    assert_eq!(result.content, verifier_answer);
    assert_eq!(result.draft_accepted, Some(false));

    // The failed draft produced no usage, so only the verifier is billed.
    let expected = invocation_cost(
        VERIFIER_INPUT_RATE,
        VERIFIER_OUTPUT_RATE,
        MODERATE_QUERY,
        verifier_answer,
    );
    assert!((result.total_cost_usd - expected).abs() < 1e-12);
}

#[tokio::test]
async fn transient_failure_retried_once() {
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::TransientFailure("overloaded".to_string()),
        MockReply::text("4."),
    ]));
    let engine = engine(Arc::clone(&provider));

    let result = engine.run(Query::new("What's 2+2?")).await.unwrap();

    assert_eq!(result.content, "4.");
    assert_eq!(provider.calls_for("draft-s").await, 2);
}

// ---- Admission control ----

#[tokio::test]
async fn eleventh_request_in_hour_rate_limited() {
    let provider = Arc::new(MockProvider::new());
    let engine = engine(Arc::clone(&provider));

    for _ in 0..10 {
        engine
            .run(Query::new("What's 2+2?").with_caller("alice"))
            .await
            .unwrap();
    }

    let err = engine
        .run(Query::new("What's 2+2?").with_caller("alice"))
        .await
        .unwrap_err();
    match err {
        CascadeError::RateLimitExceeded {
            limit,
            used,
            cap,
            retry_after,
        } => {
            assert_eq!(limit, LimitKind::HourlyRequests);
            assert_eq!(used, 10);
            assert_eq!(cap, 10);
            assert!(retry_after > Duration::ZERO);
            assert!(retry_after <= Duration::from_secs(3600));
        }
        other => panic!("expected rate limit error, got {other}"),
    }
    // The denied request never reached the provider.
    assert_eq!(provider.total_calls().await, 10);
}

#[tokio::test]
async fn tight_budget_denied_before_invocation() {
    let mut config = CascadeConfig::default();
    config.admission.tiers.push(TierConfig {
        name: "tight".to_string(),
        mode: EnforcementMode::Block,
        hourly_requests: None,
        daily_requests: None,
        daily_spend_usd: Some(0.001),
        monthly_spend_usd: None,
        soft_threshold: 0.8,
        allowed_models: Vec::new(),
        degradation: Vec::new(),
    });
    let provider = Arc::new(MockProvider::new());
    let adapter: Arc<dyn ProviderAdapter> = provider.clone();
    let engine = CascadeEngine::new(config, catalog(), adapter).unwrap();

    let err = engine
        .run(Query::new("What's 2+2?").with_caller("bob").with_tier("tight"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CascadeError::BudgetExceeded {
            limit: LimitKind::DailySpend,
            ..
        }
    ));
    assert_eq!(provider.total_calls().await, 0);
}

#[tokio::test]
async fn degrade_tier_substitutes_cheaper_model() {
    let mut config = CascadeConfig::default();
    config.admission.tiers.push(TierConfig {
        name: "metered".to_string(),
        mode: EnforcementMode::Degrade,
        hourly_requests: None,
        daily_requests: None,
        // The reservation estimate alone puts utilization past the step.
        daily_spend_usd: Some(0.01),
        monthly_spend_usd: None,
        soft_threshold: 0.5,
        allowed_models: Vec::new(),
        degradation: vec![DegradationStep {
            at: 0.5,
            model: "draft-xs".to_string(),
        }],
    });
    let mut models = catalog();
    models.push(ModelSpec {
        name: "draft-xs".to_string(),
        role: ModelRole::Verifier,
        input_cost_per_mtok: 0.4,
        output_cost_per_mtok: 2.0,
        specializations: vec![],
        supports_tools: false,
    });
    let provider = Arc::new(MockProvider::with_replies(vec![MockReply::text("4.")]));
    let adapter: Arc<dyn ProviderAdapter> = provider.clone();
    let engine = CascadeEngine::new(config, models, adapter).unwrap();

    let result = engine
        .run(Query::new("What's 2+2?").with_caller("carol").with_tier("metered"))
        .await
        .unwrap();

    assert_eq!(result.model_used, "draft-xs");
    assert_eq!(provider.calls_for("draft-xs").await, 1);
    assert_eq!(provider.calls_for("draft-s").await, 0);
}

// ---- Streaming ----

#[tokio::test]
async fn streaming_direct_emits_content() {
    let provider = Arc::new(MockProvider::with_replies(vec![MockReply::text("4.")]));
    let engine = engine(provider);

    let (tx, mut rx) = mpsc::channel(16);
    let result = engine
        .run_streaming(Query::new("What's 2+2?"), tx)
        .await
        .unwrap();

    let mut streamed = String::new();
    while let Some(chunk) = rx.recv().await {
        streamed.push_str(&chunk);
    }
    assert_eq!(streamed, "4.");
    assert_eq!(result.content, "4.");
    assert_eq!(result.draft_accepted, None);
}

#[tokio::test]
async fn streaming_escalation_emits_only_verifier_output() {
    let verifier_answer = "The revolution's causes were fiscal collapse and famine.";
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::with_logprobs(WEAK_DRAFT, vec![-2.5; 10]),
        MockReply::text(verifier_answer),
    ]));
    let engine = engine(provider);

    let (tx, mut rx) = mpsc::channel(16);
    let result = engine
        .run_streaming(Query::new(MODERATE_QUERY), tx)
        .await
        .unwrap();

    let mut streamed = String::new();
    while let Some(chunk) = rx.recv().await {
        streamed.push_str(&chunk);
    }
    // The rejected draft was buffered and discarded, never streamed.
    assert_eq!(streamed, verifier_answer);
    assert_eq!(result.draft_accepted, Some(false));
}

#[tokio::test]
async fn streaming_accepted_draft_sent_whole() {
    let provider = Arc::new(MockProvider::with_replies(vec![MockReply::with_logprobs(
        STRONG_DRAFT,
        vec![-0.05; 20],
    )]));
    let engine = engine(provider);

    let (tx, mut rx) = mpsc::channel(16);
    let result = engine
        .run_streaming(Query::new(MODERATE_QUERY), tx)
        .await
        .unwrap();

    let mut streamed = String::new();
    while let Some(chunk) = rx.recv().await {
        streamed.push_str(&chunk);
    }
    assert_eq!(streamed, STRONG_DRAFT);
    assert_eq!(result.draft_accepted, Some(true));
}

// ---- Batch ----

#[tokio::test]
async fn paced_batch_preserves_order() {
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::text("first"),
        MockReply::text("second"),
        MockReply::text("third"),
    ]));
    let engine = engine(provider);

    let queries = vec![
        Query::new("What's 2+2?"),
        Query::new("What's 2+2?"),
        Query::new("What's 2+2?"),
    ];
    let batch = engine.run_batch(queries, BatchStrategy::Paced, 4).await;

    assert!((batch.success_rate - 1.0).abs() < 1e-9);
    let contents: Vec<&str> = batch
        .results
        .iter()
        .map(|r| r.as_ref().unwrap().content.as_str())
        .collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
    assert!(batch.total_cost_usd > 0.0);
}

#[tokio::test]
async fn eager_batch_reports_partial_failure() {
    let provider = Arc::new(MockProvider::new());
    let mut config = CascadeConfig::default();
    config.admission.tiers.push(TierConfig {
        name: "one-shot".to_string(),
        mode: EnforcementMode::Block,
        hourly_requests: Some(1),
        daily_requests: None,
        daily_spend_usd: None,
        monthly_spend_usd: None,
        soft_threshold: 0.8,
        allowed_models: Vec::new(),
        degradation: Vec::new(),
    });
    let engine = CascadeEngine::new(config, catalog(), provider).unwrap();

    let queries = vec![
        Query::new("What's 2+2?").with_caller("erin").with_tier("one-shot"),
        Query::new("What's 2+2?").with_caller("erin").with_tier("one-shot"),
    ];
    // Serial submission so the rate limit lands deterministically on the second.
    let batch = engine.run_batch(queries, BatchStrategy::Paced, 1).await;

    assert!((batch.success_rate - 0.5).abs() < 1e-9);
    assert!(batch.results[0].is_ok());
    assert!(matches!(
        batch.results[1],
        Err(CascadeError::RateLimitExceeded { .. })
    ));
}

// ---- Usage reporting ----

#[tokio::test]
async fn usage_export_reflects_committed_requests() {
    let provider = Arc::new(MockProvider::new());
    let engine = engine(provider);

    for _ in 0..2 {
        engine
            .run(Query::new("What's 2+2?").with_caller("dana"))
            .await
            .unwrap();
    }

    let bytes = engine.export_usage(ExportFormat::Json).unwrap();
    let snapshots: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let dana = snapshots
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["caller"] == "dana")
        .expect("dana has a usage entry");
    assert_eq!(dana["tier"], "free");
    assert_eq!(dana["hourly_requests"], 2);
    assert!(dana["daily_spend_usd"].as_f64().unwrap() > 0.0);
}
