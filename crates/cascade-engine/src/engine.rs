// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The cascade orchestrator.
//!
//! Sequences classification, routing, draft invocation, validation, and
//! escalation. Trivial/simple queries route directly to the cheapest
//! eligible model and hard/expert queries to the strongest; only moderate
//! queries pay for the draft/verify cascade. Every model invocation passes
//! through the admission controller first, and no shared lock is ever held
//! across a provider call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cascade_admission::{AdmissionController, ExportFormat};
use cascade_classify::{ComplexityClassifier, DomainClassifier};
use cascade_config::CascadeConfig;
use cascade_core::traits::{EmbeddingAdapter, ProviderAdapter};
use cascade_core::{
    CallerId, CascadeError, ComplexityLevel, Domain, ModelSpec, ProviderRequest,
    ProviderResponse, Query, StreamEventType, TokenUsage,
};
use cascade_score::ConfidenceScorer;

use crate::attempt::{CascadeAttempt, CascadeStage, RoutingStrategy};
use crate::result::{savings_percent, BatchResult, BatchStrategy, CascadeResult, StageLatencies};

/// Caller identity applied to queries that carry none.
const ANONYMOUS_CALLER: &str = "anonymous";

/// The quality-gated cascade engine.
///
/// Construct with a model catalog and a provider adapter, optionally attach
/// an embedding adapter for the semantic classification passes, then serve
/// queries through [`run`](CascadeEngine::run),
/// [`run_streaming`](CascadeEngine::run_streaming), or
/// [`run_batch`](CascadeEngine::run_batch).
pub struct CascadeEngine {
    config: CascadeConfig,
    models: Vec<ModelSpec>,
    provider: Arc<dyn ProviderAdapter>,
    complexity: ComplexityClassifier,
    domain: DomainClassifier,
    scorer: ConfidenceScorer,
    admission: AdmissionController,
}

impl CascadeEngine {
    /// Create an engine over a static model catalog.
    ///
    /// The catalog must contain at least one draft-eligible and one
    /// verifier-eligible model.
    pub fn new(
        config: CascadeConfig,
        models: Vec<ModelSpec>,
        provider: Arc<dyn ProviderAdapter>,
    ) -> Result<Self, CascadeError> {
        if !models.iter().any(|m| m.draft_eligible()) {
            return Err(CascadeError::Config(
                "model catalog has no draft-eligible model".to_string(),
            ));
        }
        if !models.iter().any(|m| m.verifier_eligible()) {
            return Err(CascadeError::Config(
                "model catalog has no verifier-eligible model".to_string(),
            ));
        }

        Ok(Self {
            complexity: ComplexityClassifier::new(config.classify.clone()),
            domain: DomainClassifier::new(config.classify.clone()),
            scorer: ConfidenceScorer::new(config.scoring.clone()),
            admission: AdmissionController::new(config.admission.clone()),
            config,
            models,
            provider,
        })
    }

    /// Attach an embedding adapter, enabling the semantic classification
    /// passes. Without one the classifiers run rule-only.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        self.complexity = ComplexityClassifier::with_semantic(
            self.config.classify.clone(),
            Arc::clone(&embedder),
        );
        self.domain = DomainClassifier::with_semantic(self.config.classify.clone(), embedder);
        self
    }

    /// Run one query through the cascade and return its final result.
    pub async fn run(&self, query: Query) -> Result<CascadeResult, CascadeError> {
        let start = Instant::now();
        let mut attempt = CascadeAttempt::new();

        let (complexity, domain, classify_latency) = self.classify(&query, &mut attempt).await;
        let strategy = route(complexity);
        attempt.strategy = Some(strategy);
        attempt.advance(CascadeStage::Routed);
        info!(%complexity, %domain, %strategy, "query routed");

        let result = match strategy {
            RoutingStrategy::DirectCheapest => {
                let model = self.cheapest_draft(domain)?;
                self.run_direct(&query, model, &mut attempt).await
            }
            RoutingStrategy::DirectStrongest => {
                let model = self.strongest()?;
                self.run_direct(&query, model, &mut attempt).await
            }
            RoutingStrategy::Cascade => self.run_cascade(&query, complexity, domain, &mut attempt).await,
        };

        match result {
            Ok(mut result) => {
                result.complexity = complexity;
                result.domain = domain;
                result.latencies.classify = classify_latency;
                result.latencies.total = start.elapsed();
                Ok(result)
            }
            Err(err) => {
                attempt.advance(CascadeStage::Failed);
                Err(err)
            }
        }
    }

    /// Run one query, emitting partial content on `tx` as it is produced.
    ///
    /// Direct routes stream straight from the provider. In cascade mode the
    /// draft is buffered until validation: only an accepted draft is sent,
    /// so the caller never sees content that is about to be discarded; an
    /// escalated verifier streams normally.
    pub async fn run_streaming(
        &self,
        query: Query,
        tx: mpsc::Sender<String>,
    ) -> Result<CascadeResult, CascadeError> {
        let start = Instant::now();
        let mut attempt = CascadeAttempt::new();

        let (complexity, domain, classify_latency) = self.classify(&query, &mut attempt).await;
        let strategy = route(complexity);
        attempt.strategy = Some(strategy);
        attempt.advance(CascadeStage::Routed);

        let result = match strategy {
            RoutingStrategy::DirectCheapest | RoutingStrategy::DirectStrongest => {
                let model = if strategy == RoutingStrategy::DirectCheapest {
                    self.cheapest_draft(domain)?
                } else {
                    self.strongest()?
                };
                attempt.advance(CascadeStage::DirectDone);
                let draft_start = Instant::now();
                let (content, usage, cost, model_used) =
                    self.admitted_stream(&query, model, &tx).await?;
                attempt.advance(CascadeStage::Done);
                let baseline = self.strongest()?.cost_for(&usage);
                Ok(CascadeResult {
                    content,
                    model_used,
                    total_cost_usd: cost,
                    strongest_cost_usd: baseline,
                    savings_percent: savings_percent(cost, baseline),
                    complexity,
                    domain,
                    draft_accepted: None,
                    latencies: StageLatencies {
                        draft: Some(draft_start.elapsed()),
                        ..StageLatencies::default()
                    },
                })
            }
            RoutingStrategy::Cascade => {
                self.run_cascade_streaming(&query, complexity, domain, &mut attempt, &tx)
                    .await
            }
        };

        match result {
            Ok(mut result) => {
                result.latencies.classify = classify_latency;
                result.latencies.total = start.elapsed();
                Ok(result)
            }
            Err(err) => {
                attempt.advance(CascadeStage::Failed);
                Err(err)
            }
        }
    }

    /// Run a batch of queries with bounded concurrency.
    ///
    /// Per-query order is preserved in the returned results; per-caller
    /// admission semantics apply exactly as in single-query submission.
    pub async fn run_batch(
        &self,
        queries: Vec<Query>,
        strategy: BatchStrategy,
        max_concurrency: usize,
    ) -> BatchResult {
        let limit = match strategy {
            BatchStrategy::Eager => max_concurrency
                .max(1)
                .min(self.config.engine.batch_max_concurrency),
            BatchStrategy::Paced => 1,
        };

        let results = futures::stream::iter(queries.into_iter().map(|q| self.run(q)))
            .buffered(limit)
            .collect::<Vec<_>>()
            .await;

        BatchResult::from_results(results)
    }

    /// Whether the caller's spend limits would admit a cost. Records nothing.
    pub fn can_afford(
        &self,
        caller: &CallerId,
        tier: Option<&str>,
        estimated_usd: f64,
    ) -> Result<bool, CascadeError> {
        self.admission.can_afford(caller, tier, estimated_usd)
    }

    /// Export per-caller usage as CSV or JSON bytes.
    pub fn export_usage(&self, format: ExportFormat) -> Result<Vec<u8>, CascadeError> {
        self.admission.export_usage(format)
    }

    /// Run both classifiers in parallel and record the outcome.
    async fn classify(
        &self,
        query: &Query,
        attempt: &mut CascadeAttempt,
    ) -> (ComplexityLevel, Domain, Duration) {
        let classify_start = Instant::now();
        let (complexity, domain) = tokio::join!(
            self.complexity.classify(&query.text),
            self.domain.classify(&query.text, query.domain_override),
        );
        debug!(
            level = %complexity.level,
            level_confidence = complexity.confidence,
            domain = %domain.domain,
            domain_confidence = domain.confidence,
            "query classified"
        );
        attempt.complexity = Some(complexity.level);
        attempt.domain = Some(domain.domain);
        attempt.advance(CascadeStage::Classified);
        (complexity.level, domain.domain, classify_start.elapsed())
    }

    async fn run_direct(
        &self,
        query: &Query,
        model: &ModelSpec,
        attempt: &mut CascadeAttempt,
    ) -> Result<CascadeResult, CascadeError> {
        attempt.advance(CascadeStage::DirectDone);
        let draft_start = Instant::now();
        let (response, cost, model_used) = self.admitted_invoke(query, model).await?;
        attempt.advance(CascadeStage::Done);

        let baseline = self.strongest()?.cost_for(&response.usage);
        Ok(CascadeResult {
            content: response.content,
            model_used,
            total_cost_usd: cost,
            strongest_cost_usd: baseline,
            savings_percent: savings_percent(cost, baseline),
            complexity: ComplexityLevel::Trivial, // overwritten by run()
            domain: Domain::General,              // overwritten by run()
            draft_accepted: None,
            latencies: StageLatencies {
                draft: Some(draft_start.elapsed()),
                ..StageLatencies::default()
            },
        })
    }

    async fn run_cascade(
        &self,
        query: &Query,
        complexity: ComplexityLevel,
        domain: Domain,
        attempt: &mut CascadeAttempt,
    ) -> Result<CascadeResult, CascadeError> {
        attempt.advance(CascadeStage::Drafting);
        let draft_model = self.cheapest_draft(domain)?;
        attempt.draft_model = Some(draft_model.name.clone());
        let threshold = self.accept_threshold(complexity, domain);

        let draft_start = Instant::now();
        let draft = match self.admitted_invoke(query, draft_model).await {
            Ok(outcome) => Some(outcome),
            Err(err) if is_provider_failure(&err) => {
                // A failed draft is not fatal: fall through to the verifier.
                warn!(model = %draft_model.name, error = %err, "draft failed, escalating");
                None
            }
            Err(err) => return Err(err),
        };
        let draft_latency = draft_start.elapsed();

        if let Some((response, cost, model_used)) = draft {
            attempt.advance(CascadeStage::Validating);
            let report = self.scorer.score(
                &query.text,
                &response.content,
                domain,
                response.logprobs.as_deref(),
            );
            attempt.confidence = Some(report.confidence);
            attempt.alignment = Some(report.alignment);
            debug!(
                confidence = report.confidence,
                alignment = report.alignment,
                kind = %report.alignment_kind,
                capped = report.capped,
                threshold,
                "draft validated"
            );

            let accepted = report.confidence >= threshold
                && report.alignment >= domain.confidence_floor();
            if accepted {
                attempt.advance(CascadeStage::Accepted);
                attempt.advance(CascadeStage::Done);
                let baseline = self.strongest()?.cost_for(&response.usage);
                return Ok(CascadeResult {
                    content: response.content,
                    model_used,
                    total_cost_usd: cost,
                    strongest_cost_usd: baseline,
                    savings_percent: savings_percent(cost, baseline),
                    complexity,
                    domain,
                    draft_accepted: Some(true),
                    latencies: StageLatencies {
                        draft: Some(draft_latency),
                        ..StageLatencies::default()
                    },
                });
            }

            attempt.advance(CascadeStage::Escalating);
            self.verify(query, complexity, domain, cost, draft_latency, attempt)
                .await
        } else {
            attempt.advance(CascadeStage::Escalating);
            self.verify(query, complexity, domain, 0.0, draft_latency, attempt)
                .await
        }
    }

    /// Escalation leg: invoke the strongest model and fold in the draft cost.
    async fn verify(
        &self,
        query: &Query,
        complexity: ComplexityLevel,
        domain: Domain,
        draft_cost: f64,
        draft_latency: Duration,
        attempt: &mut CascadeAttempt,
    ) -> Result<CascadeResult, CascadeError> {
        attempt.advance(CascadeStage::Verifying);
        let verifier = self.strongest()?;
        attempt.verifier_model = Some(verifier.name.clone());

        let verify_start = Instant::now();
        let (response, verifier_cost, model_used) = self.admitted_invoke(query, verifier).await?;
        attempt.advance(CascadeStage::Done);

        let total = draft_cost + verifier_cost;
        let baseline = verifier.cost_for(&response.usage);
        Ok(CascadeResult {
            content: response.content,
            model_used,
            total_cost_usd: total,
            strongest_cost_usd: baseline,
            savings_percent: savings_percent(total, baseline),
            complexity,
            domain,
            draft_accepted: Some(false),
            latencies: StageLatencies {
                draft: Some(draft_latency),
                verify: Some(verify_start.elapsed()),
                ..StageLatencies::default()
            },
        })
    }

    /// Cascade mode with a streaming surface: buffer the draft through
    /// validation, stream only what will actually be returned.
    async fn run_cascade_streaming(
        &self,
        query: &Query,
        complexity: ComplexityLevel,
        domain: Domain,
        attempt: &mut CascadeAttempt,
        tx: &mpsc::Sender<String>,
    ) -> Result<CascadeResult, CascadeError> {
        attempt.advance(CascadeStage::Drafting);
        let draft_model = self.cheapest_draft(domain)?;
        attempt.draft_model = Some(draft_model.name.clone());
        let threshold = self.accept_threshold(complexity, domain);

        let draft_start = Instant::now();
        let draft = match self.admitted_invoke(query, draft_model).await {
            Ok(outcome) => Some(outcome),
            Err(err) if is_provider_failure(&err) => {
                warn!(model = %draft_model.name, error = %err, "draft failed, escalating");
                None
            }
            Err(err) => return Err(err),
        };
        let draft_latency = draft_start.elapsed();

        if let Some((response, cost, model_used)) = draft {
            attempt.advance(CascadeStage::Validating);
            let report = self.scorer.score(
                &query.text,
                &response.content,
                domain,
                response.logprobs.as_deref(),
            );
            let accepted = report.confidence >= threshold
                && report.alignment >= domain.confidence_floor();
            if accepted {
                attempt.advance(CascadeStage::Accepted);
                tx.send(response.content.clone())
                    .await
                    .map_err(|_| CascadeError::Internal("stream receiver dropped".to_string()))?;
                attempt.advance(CascadeStage::Done);
                let baseline = self.strongest()?.cost_for(&response.usage);
                return Ok(CascadeResult {
                    content: response.content,
                    model_used,
                    total_cost_usd: cost,
                    strongest_cost_usd: baseline,
                    savings_percent: savings_percent(cost, baseline),
                    complexity,
                    domain,
                    draft_accepted: Some(true),
                    latencies: StageLatencies {
                        draft: Some(draft_latency),
                        ..StageLatencies::default()
                    },
                });
            }
            attempt.advance(CascadeStage::Escalating);
            self.verify_streaming(query, complexity, domain, cost, draft_latency, attempt, tx)
                .await
        } else {
            attempt.advance(CascadeStage::Escalating);
            self.verify_streaming(query, complexity, domain, 0.0, draft_latency, attempt, tx)
                .await
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn verify_streaming(
        &self,
        query: &Query,
        complexity: ComplexityLevel,
        domain: Domain,
        draft_cost: f64,
        draft_latency: Duration,
        attempt: &mut CascadeAttempt,
        tx: &mpsc::Sender<String>,
    ) -> Result<CascadeResult, CascadeError> {
        attempt.advance(CascadeStage::Verifying);
        let verifier = self.strongest()?;
        attempt.verifier_model = Some(verifier.name.clone());

        let verify_start = Instant::now();
        let (content, usage, verifier_cost, model_used) =
            self.admitted_stream(query, verifier, tx).await?;
        attempt.advance(CascadeStage::Done);

        let total = draft_cost + verifier_cost;
        let baseline = verifier.cost_for(&usage);
        Ok(CascadeResult {
            content,
            model_used,
            total_cost_usd: total,
            strongest_cost_usd: baseline,
            savings_percent: savings_percent(total, baseline),
            complexity,
            domain,
            draft_accepted: Some(false),
            latencies: StageLatencies {
                draft: Some(draft_latency),
                verify: Some(verify_start.elapsed()),
                ..StageLatencies::default()
            },
        })
    }

    /// Reserve an admission slot, invoke the model, and commit the measured
    /// cost. A degrade-mode substitution is applied before invoking; any
    /// failure releases the reservation via its drop guard.
    async fn admitted_invoke(
        &self,
        query: &Query,
        model: &ModelSpec,
    ) -> Result<(ProviderResponse, f64, String), CascadeError> {
        let caller = effective_caller(query);
        let reservation = self.admission.reserve(
            &caller,
            query.tier.as_deref(),
            &model.name,
            self.estimate_cost(model, &query.text),
        )?;
        let spec = self.effective_model(model, reservation.substituted_model());

        match self.invoke(&spec.name, &query.text).await {
            Ok(response) => {
                let cost = spec.cost_for(&response.usage);
                reservation.commit(cost);
                Ok((response, cost, spec.name.clone()))
            }
            Err(err) => Err(err), // reservation dropped here: spend released
        }
    }

    /// Streaming counterpart of [`admitted_invoke`](Self::admitted_invoke),
    /// forwarding deltas to `tx` while accumulating the full content.
    async fn admitted_stream(
        &self,
        query: &Query,
        model: &ModelSpec,
        tx: &mpsc::Sender<String>,
    ) -> Result<(String, TokenUsage, f64, String), CascadeError> {
        let caller = effective_caller(query);
        let reservation = self.admission.reserve(
            &caller,
            query.tier.as_deref(),
            &model.name,
            self.estimate_cost(model, &query.text),
        )?;
        let spec = self.effective_model(model, reservation.substituted_model());

        let request = self.request_for(&spec.name, &query.text);
        let timeout = self.invocation_timeout();
        let mut stream = match tokio::time::timeout(timeout, self.provider.stream(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(CascadeError::Timeout { duration: timeout }),
        };

        let mut content = String::new();
        let mut usage = None;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            match chunk.event_type {
                StreamEventType::Delta => {
                    if let Some(text) = chunk.text {
                        tx.send(text.clone()).await.map_err(|_| {
                            CascadeError::Internal("stream receiver dropped".to_string())
                        })?;
                        content.push_str(&text);
                    }
                }
                StreamEventType::Stop => usage = chunk.usage,
                StreamEventType::Start => {}
            }
        }

        let usage = usage.unwrap_or(TokenUsage {
            input_tokens: estimate_tokens(&query.text),
            output_tokens: estimate_tokens(&content),
        });
        let cost = spec.cost_for(&usage);
        reservation.commit(cost);
        Ok((content, usage, cost, spec.name.clone()))
    }

    /// Invoke a model with the configured deadline, retrying once on a
    /// transient failure.
    async fn invoke(&self, model: &str, text: &str) -> Result<ProviderResponse, CascadeError> {
        let timeout = self.invocation_timeout();
        match self.invoke_once(model, text, timeout).await {
            Err(err) if err.is_transient() && self.config.engine.retry_transient => {
                warn!(model, error = %err, "transient provider error, retrying once");
                self.invoke_once(model, text, timeout).await
            }
            other => other,
        }
    }

    async fn invoke_once(
        &self,
        model: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<ProviderResponse, CascadeError> {
        let request = self.request_for(model, text);
        match tokio::time::timeout(timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(CascadeError::Timeout { duration: timeout }),
        }
    }

    fn request_for(&self, model: &str, text: &str) -> ProviderRequest {
        ProviderRequest {
            model: model.to_string(),
            query: text.to_string(),
            max_tokens: self.config.engine.max_tokens,
            logprobs: true,
        }
    }

    fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.config.engine.invocation_timeout_secs)
    }

    /// Acceptance threshold: the complexity table, raised to the domain
    /// floor when that floor is stricter.
    fn accept_threshold(&self, complexity: ComplexityLevel, domain: Domain) -> f32 {
        self.config
            .scoring
            .accept_threshold(complexity)
            .max(domain.confidence_floor())
    }

    /// Cheapest draft-eligible model, preferring domain specialists.
    fn cheapest_draft(&self, domain: Domain) -> Result<&ModelSpec, CascadeError> {
        let drafts = || self.models.iter().filter(|m| m.draft_eligible());
        drafts()
            .filter(|m| m.specializes_in(domain))
            .min_by(|a, b| a.blended_rate().total_cmp(&b.blended_rate()))
            .or_else(|| drafts().min_by(|a, b| a.blended_rate().total_cmp(&b.blended_rate())))
            .ok_or_else(|| CascadeError::Internal("no draft-eligible model".to_string()))
    }

    /// Strongest verifier-eligible model by blended rate.
    fn strongest(&self) -> Result<&ModelSpec, CascadeError> {
        self.models
            .iter()
            .filter(|m| m.verifier_eligible())
            .max_by(|a, b| a.blended_rate().total_cmp(&b.blended_rate()))
            .ok_or_else(|| CascadeError::Internal("no verifier-eligible model".to_string()))
    }

    /// Resolve a degrade-mode substitution against the catalog, keeping the
    /// requested model when the substitute is unknown.
    fn effective_model<'a>(
        &'a self,
        requested: &'a ModelSpec,
        substituted: Option<&str>,
    ) -> &'a ModelSpec {
        let Some(name) = substituted else {
            return requested;
        };
        match self.models.iter().find(|m| m.name == name) {
            Some(spec) => spec,
            None => {
                warn!(substitute = name, "degradation substitute not in catalog, keeping requested model");
                requested
            }
        }
    }

    /// Optimistic cost estimate used for admission reservations: measured
    /// input size, half the output budget.
    fn estimate_cost(&self, model: &ModelSpec, text: &str) -> f64 {
        let usage = TokenUsage {
            input_tokens: estimate_tokens(text),
            output_tokens: self.config.engine.max_tokens / 2,
        };
        model.cost_for(&usage)
    }
}

/// Map a complexity level to its routing strategy.
fn route(complexity: ComplexityLevel) -> RoutingStrategy {
    match complexity {
        ComplexityLevel::Trivial | ComplexityLevel::Simple => RoutingStrategy::DirectCheapest,
        ComplexityLevel::Moderate => RoutingStrategy::Cascade,
        ComplexityLevel::Hard | ComplexityLevel::Expert => RoutingStrategy::DirectStrongest,
    }
}

/// Provider-side failures fall through from draft to verifier; admission
/// and configuration errors surface to the caller instead.
fn is_provider_failure(err: &CascadeError) -> bool {
    matches!(
        err,
        CascadeError::Provider { .. } | CascadeError::Timeout { .. }
    )
}

fn effective_caller(query: &Query) -> CallerId {
    query
        .caller
        .clone()
        .unwrap_or_else(|| CallerId(ANONYMOUS_CALLER.to_string()))
}

fn estimate_tokens(text: &str) -> u32 {
    (text.len() / 4).max(1) as u32
}
