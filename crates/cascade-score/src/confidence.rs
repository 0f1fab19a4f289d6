// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Draft answer confidence scoring.
//!
//! Combines three signals into a weighted aggregate: provider-reported
//! token log-probabilities (when available), structural heuristics over the
//! answer text, and the alignment score. Alignment is not just an input:
//! when it falls below the domain's floor, confidence is hard-capped at a
//! low value so a fluent but off-topic answer can never be accepted.

use cascade_config::ScoringConfig;
use cascade_core::Domain;
use tracing::debug;

use crate::alignment::{AlignmentKind, AlignmentScorer};

/// Hedging phrases that lower structural confidence.
const HEDGING_PHRASES: &[&str] = &[
    "i'm not sure", "i am not sure", "i think", "i believe", "possibly",
    "it might", "it may be", "perhaps", "i cannot be certain", "hard to say",
    "i'd guess", "probably",
];

/// Refusal patterns that sharply lower structural confidence.
const REFUSAL_PHRASES: &[&str] = &[
    "i can't help", "i cannot help", "i can't assist", "i cannot assist",
    "i'm unable to", "i am unable to", "i won't be able to",
];

/// Structural signal baseline before penalties.
const STRUCTURAL_BASE: f32 = 0.75;

/// A confidence verdict with its component signals.
#[derive(Debug, Clone)]
pub struct ConfidenceReport {
    /// Final confidence in `[0, 1]`, after the alignment ceiling.
    pub confidence: f32,
    /// Raw alignment score.
    pub alignment: f32,
    /// Which detector produced the alignment score.
    pub alignment_kind: AlignmentKind,
    /// Log-probability signal, absent when the provider reported none.
    pub logprob_signal: Option<f32>,
    /// Structural heuristic signal.
    pub structural_signal: f32,
    /// True when alignment fell below the domain floor and the ceiling
    /// clamped the final confidence.
    pub capped: bool,
}

/// Scores draft answers for the accept/escalate decision.
pub struct ConfidenceScorer {
    config: ScoringConfig,
    alignment: AlignmentScorer,
}

impl ConfidenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            alignment: AlignmentScorer::new(),
        }
    }

    /// Score a candidate answer against its originating query.
    pub fn score(
        &self,
        query: &str,
        answer: &str,
        domain: Domain,
        logprobs: Option<&[f32]>,
    ) -> ConfidenceReport {
        let alignment = self.alignment.score(query, answer);
        let structural = structural_signal(query, answer);
        let logprob = logprobs.and_then(logprob_signal);

        // Weighted aggregate; the logprob weight redistributes to the other
        // signals when the provider reports no logprobs.
        let mut weighted = self.config.structural_weight * structural
            + self.config.alignment_weight * alignment.score;
        let mut total_weight = self.config.structural_weight + self.config.alignment_weight;
        if let Some(lp) = logprob {
            weighted += self.config.logprob_weight * lp;
            total_weight += self.config.logprob_weight;
        }
        let mut confidence = if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Alignment below the domain floor acts as a hard ceiling, not a
        // weighted input: cap confidence regardless of the other signals.
        let floor = domain.confidence_floor();
        let capped = alignment.score < floor;
        if capped {
            confidence = confidence.min(self.config.alignment_cap);
            debug!(
                alignment = alignment.score,
                floor,
                cap = self.config.alignment_cap,
                "alignment below domain floor, confidence capped"
            );
        }

        ConfidenceReport {
            confidence,
            alignment: alignment.score,
            alignment_kind: alignment.kind,
            logprob_signal: logprob,
            structural_signal: structural,
            capped,
        }
    }
}

/// Mean token probability from natural-log probabilities, in `[0, 1]`.
///
/// Returns `None` for an empty slice so the weight renormalization kicks in.
fn logprob_signal(logprobs: &[f32]) -> Option<f32> {
    if logprobs.is_empty() {
        return None;
    }
    let mean_prob =
        logprobs.iter().map(|lp| lp.exp()).sum::<f32>() / logprobs.len() as f32;
    Some(mean_prob.clamp(0.0, 1.0))
}

/// Heuristic signal over the answer's surface form.
///
/// Starts at a moderately confident baseline and subtracts for hedging
/// language, refusals, apparent truncation, degenerate shortness, and
/// runaway length.
fn structural_signal(query: &str, answer: &str) -> f32 {
    let trimmed = answer.trim();
    let lower = trimmed.to_lowercase();
    let mut signal = STRUCTURAL_BASE;

    let hedges = HEDGING_PHRASES
        .iter()
        .filter(|p| lower.contains(*p))
        .count();
    signal -= (hedges as f32 * 0.08).min(0.25);

    if REFUSAL_PHRASES.iter().any(|p| lower.contains(p)) {
        signal -= 0.4;
    }

    let word_count = trimmed.split_whitespace().count();

    // Truncation: a long answer that stops mid-sentence.
    let terminal = trimmed
        .chars()
        .last()
        .is_some_and(|c| matches!(c, '.' | '!' | '?' | '"' | '\'' | ')' | '`' | ']' | '}'));
    if word_count > 20 && !terminal {
        signal -= 0.15;
    }

    // Degenerate shortness relative to a non-trivial query.
    if word_count < 3 && query.split_whitespace().count() > 5 {
        signal -= 0.2;
    }

    // Runaway length.
    if trimmed.len() > 6000 {
        signal -= 0.1;
    }

    signal.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_config::ScoringConfig;

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::new(ScoringConfig::default())
    }

    const QUERY: &str = "Describe the lifecycle of a monarch butterfly";
    const GOOD_ANSWER: &str =
        "The monarch butterfly lifecycle spans egg, caterpillar, chrysalis, and adult stages.";

    #[test]
    fn hedging_lowers_confidence() {
        let s = scorer();
        let confident = s.score(QUERY, GOOD_ANSWER, Domain::General, None);
        let hedged = s.score(
            QUERY,
            "I'm not sure, but I think the monarch butterfly lifecycle possibly has stages like caterpillar.",
            Domain::General,
            None,
        );
        assert!(hedged.confidence < confident.confidence);
    }

    #[test]
    fn refusal_scores_low() {
        let s = scorer();
        let report = s.score(QUERY, "I'm unable to help with that request.", Domain::General, None);
        assert!(report.structural_signal < 0.4);
    }

    #[test]
    fn high_logprobs_raise_confidence_over_low() {
        let s = scorer();
        let high = s.score(QUERY, GOOD_ANSWER, Domain::General, Some(&[-0.05, -0.02, -0.1]));
        let low = s.score(QUERY, GOOD_ANSWER, Domain::General, Some(&[-3.0, -4.0, -2.5]));
        assert!(high.confidence > low.confidence);
        assert!(high.logprob_signal.unwrap() > 0.9);
        assert!(low.logprob_signal.unwrap() < 0.1);
    }

    #[test]
    fn missing_logprobs_renormalize_weights() {
        let s = scorer();
        let report = s.score(QUERY, GOOD_ANSWER, Domain::General, None);
        assert!(report.logprob_signal.is_none());

        let config = ScoringConfig::default();
        let expected = (config.structural_weight * report.structural_signal
            + config.alignment_weight * report.alignment)
            / (config.structural_weight + config.alignment_weight);
        assert!((report.confidence - expected).abs() < 1e-6);
    }

    #[test]
    fn empty_logprob_slice_treated_as_absent() {
        let s = scorer();
        let report = s.score(QUERY, GOOD_ANSWER, Domain::General, Some(&[]));
        assert!(report.logprob_signal.is_none());
    }

    #[test]
    fn off_topic_medical_answer_is_capped() {
        let s = scorer();
        // Fluent, confident prose that never addresses the medical question.
        let report = s.score(
            "What is the differential diagnosis for chest pain with shortness of breath?",
            "Great question! Here is a detailed overview of automobile engine maintenance.",
            Domain::Medical,
            Some(&[-0.01, -0.02, -0.01]),
        );
        assert!(report.capped);
        assert!(report.confidence <= ScoringConfig::default().alignment_cap);
    }

    #[test]
    fn aligned_answer_is_not_capped() {
        let s = scorer();
        let report = s.score(QUERY, GOOD_ANSWER, Domain::General, None);
        assert!(!report.capped);
        assert!(report.alignment >= Domain::General.confidence_floor());
    }

    #[test]
    fn truncated_answer_penalized() {
        let long_truncated = "The monarch butterfly lifecycle begins when the female lays eggs \
                              on milkweed leaves and then the larvae emerge and begin eating the";
        let s = scorer();
        let report = s.score(QUERY, long_truncated, Domain::General, None);
        let complete = s.score(QUERY, GOOD_ANSWER, Domain::General, None);
        assert!(report.structural_signal < complete.structural_signal);
    }
}
