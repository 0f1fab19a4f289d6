// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Final cascade outputs and batch aggregation.

use std::time::Duration;

use cascade_core::{CascadeError, ComplexityLevel, Domain};

/// Per-stage latency breakdown for one request.
#[derive(Debug, Clone, Default)]
pub struct StageLatencies {
    /// Complexity + domain classification (run in parallel).
    pub classify: Duration,
    /// Draft or direct model invocation.
    pub draft: Option<Duration>,
    /// Verifier invocation, present only when escalated.
    pub verify: Option<Duration>,
    /// End-to-end wall time.
    pub total: Duration,
}

/// The final, immutable output of one cascade run.
///
/// `total_cost_usd` covers exactly the models actually invoked: the draft
/// alone when accepted, draft plus verifier when escalated — never the
/// verifier alone.
#[derive(Debug, Clone)]
pub struct CascadeResult {
    /// The answer returned to the caller.
    pub content: String,
    /// Model whose output was returned.
    pub model_used: String,
    /// Summed cost of every model actually invoked.
    pub total_cost_usd: f64,
    /// What the same answer would have cost on the strongest model alone.
    pub strongest_cost_usd: f64,
    /// Savings against the strongest-model baseline, as a percentage.
    /// Negative when an escalated cascade cost more than going direct.
    pub savings_percent: f64,
    /// Classified complexity.
    pub complexity: ComplexityLevel,
    /// Classified (or overridden) domain.
    pub domain: Domain,
    /// `Some(true)` when a draft was accepted, `Some(false)` when escalated,
    /// `None` for direct routes that never drafted.
    pub draft_accepted: Option<bool>,
    /// Per-stage latencies.
    pub latencies: StageLatencies,
}

/// How a batch submits its queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStrategy {
    /// Submit everything at once, bounded only by `max_concurrency`.
    Eager,
    /// Submit one query at a time, trading latency for smooth provider load.
    Paced,
}

/// Aggregated outcome of a batch run; per-query order is preserved.
#[derive(Debug)]
pub struct BatchResult {
    pub results: Vec<Result<CascadeResult, CascadeError>>,
    /// Fraction of queries that produced a result, in `[0, 1]`.
    pub success_rate: f64,
    /// Summed cost of all successful queries.
    pub total_cost_usd: f64,
}

impl BatchResult {
    pub fn from_results(results: Vec<Result<CascadeResult, CascadeError>>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let success_rate = if results.is_empty() {
            1.0
        } else {
            succeeded as f64 / results.len() as f64
        };
        let total_cost_usd = results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|r| r.total_cost_usd)
            .sum();
        Self {
            results,
            success_rate,
            total_cost_usd,
        }
    }
}

/// Savings of `total` against the `baseline` cost, as a percentage.
///
/// Zero when the baseline is zero (nothing to save against).
pub(crate) fn savings_percent(total: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    (baseline - total) / baseline * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_result(cost: f64) -> CascadeResult {
        CascadeResult {
            content: "ok".to_string(),
            model_used: "draft-s".to_string(),
            total_cost_usd: cost,
            strongest_cost_usd: cost * 10.0,
            savings_percent: 90.0,
            complexity: ComplexityLevel::Simple,
            domain: Domain::General,
            draft_accepted: None,
            latencies: StageLatencies::default(),
        }
    }

    #[test]
    fn batch_aggregates_cost_and_success_rate() {
        let batch = BatchResult::from_results(vec![
            Ok(dummy_result(0.1)),
            Err(CascadeError::transient("boom")),
            Ok(dummy_result(0.2)),
            Ok(dummy_result(0.3)),
        ]);
        assert!((batch.success_rate - 0.75).abs() < 1e-9);
        assert!((batch.total_cost_usd - 0.6).abs() < 1e-9);
    }

    #[test]
    fn empty_batch_is_fully_successful() {
        let batch = BatchResult::from_results(Vec::new());
        assert!((batch.success_rate - 1.0).abs() < 1e-9);
        assert!(batch.total_cost_usd.abs() < 1e-9);
    }

    #[test]
    fn savings_math() {
        assert!((savings_percent(0.1, 1.0) - 90.0).abs() < 1e-9);
        assert!(savings_percent(0.0, 0.0).abs() < 1e-9);
        // An escalated cascade can cost more than its baseline.
        assert!(savings_percent(1.2, 1.0) < 0.0);
    }
}
