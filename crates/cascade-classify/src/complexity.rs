// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic query complexity classification.
//!
//! Classifies queries into five difficulty levels using zero-cost heuristic
//! rules. No LLM pre-call, no network, no latency. An optional semantic
//! booster compares the query against per-level exemplar phrases via an
//! embedding adapter and is reconciled with the rule result.

use std::sync::Arc;

use cascade_config::ClassifyConfig;
use cascade_core::traits::{cosine_similarity, EmbeddingAdapter};
use cascade_core::ComplexityLevel;
use tracing::warn;

use crate::reconcile;

/// Result of classifying a query's complexity.
#[derive(Debug, Clone)]
pub struct ComplexityClassification {
    /// The classified difficulty level.
    pub level: ComplexityLevel,
    /// Confidence in the classification (0.0-1.0).
    pub confidence: f32,
    /// Human-readable reason for the classification.
    pub reason: &'static str,
}

/// Greeting/acknowledgement patterns (exact match, case-insensitive).
const TRIVIAL_EXACT: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "bye", "ok", "okay",
    "yes", "no", "sure", "good", "great", "cool", "nice", "wow", "lol",
    "haha", "yep", "nope", "yea", "yeah", "nah",
];

/// Simple single-fact question patterns (contains, case-insensitive).
const SIMPLE_QUESTIONS: &[&str] = &[
    "what time", "what day", "what date", "how are you",
    "what's up", "who are you", "what's your name",
    "what is the time", "what is the date", "what's 2+2",
    "capital of", "how many", "how old",
];

/// Moderate reasoning indicators (contains, case-insensitive).
const MODERATE_INDICATORS: &[&str] = &[
    "explain", "summarize", "describe", "why does", "how does",
    "what causes", "difference between", "tell me about",
];

/// Hard multi-step reasoning indicators (contains, case-insensitive).
const HARD_INDICATORS: &[&str] = &[
    "analyze", "compare", "evaluate", "implement", "design",
    "architecture", "trade-off", "tradeoff", "pros and cons",
    "step by step", "explain in detail", "debug", "refactor",
    "code review", "write a function", "write code", "write a program",
    "optimize", "algorithm", "strategy", "in depth", "comprehensive",
];

/// Expert-level indicators (contains, case-insensitive).
const EXPERT_INDICATORS: &[&str] = &[
    "formal proof", "prove that", "prove the", "formally verify",
    "asymptotic", "np-hard", "np-complete", "theorem",
    "from first principles", "derive the", "distributed consensus",
];

/// Semantic exemplar phrases per difficulty level, used by the optional
/// embedding booster.
const LEVEL_EXEMPLARS: &[(ComplexityLevel, &[&str])] = &[
    (ComplexityLevel::Trivial, &[
        "hello there",
        "thanks a lot",
        "yes please",
    ]),
    (ComplexityLevel::Simple, &[
        "what time is it right now",
        "what is the capital of France",
        "how many days are in March",
    ]),
    (ComplexityLevel::Moderate, &[
        "summarize the main causes of the French Revolution",
        "explain how photosynthesis works",
        "describe the difference between TCP and UDP",
    ]),
    (ComplexityLevel::Hard, &[
        "analyze this codebase and refactor the slowest module",
        "compare the trade-offs of these two database architectures",
        "design a caching strategy for a high-traffic API",
    ]),
    (ComplexityLevel::Expert, &[
        "prove that this distributed consensus protocol is safe under partition",
        "derive the asymptotic complexity bound from first principles",
        "construct a formal proof of the convergence theorem",
    ]),
];

/// Query complexity classifier.
///
/// Rule-based by default; attach an embedding adapter to enable the
/// semantic booster. Deterministic for identical input, never fails:
/// a semantic error falls back to the rule result with a warning.
pub struct ComplexityClassifier {
    config: ClassifyConfig,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
}

impl ComplexityClassifier {
    /// Create a rule-only classifier.
    pub fn new(config: ClassifyConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    /// Create a classifier with a semantic booster backed by `embedder`.
    pub fn with_semantic(config: ClassifyConfig, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        Self {
            config,
            embedder: Some(embedder),
        }
    }

    /// Classify a query, running the semantic booster only when the rule
    /// pass is uncertain (below the configured escalation bar).
    pub async fn classify(&self, text: &str) -> ComplexityClassification {
        let rule = self.classify_rules(text);

        let Some(embedder) = self.embedder.as_ref().filter(|_| self.config.semantic) else {
            return rule;
        };
        if rule.confidence >= self.config.rule_confidence_bar {
            return rule;
        }

        match semantic_classify(embedder.as_ref(), text).await {
            Ok(semantic) => {
                let (level, confidence, agreed) = reconcile(
                    (rule.level, rule.confidence),
                    (semantic.level, semantic.confidence),
                    self.config.disagreement_policy,
                    self.config.agreement_boost,
                );
                ComplexityClassification {
                    level,
                    confidence,
                    reason: if agreed {
                        "rule and semantic agree"
                    } else {
                        "rule and semantic reconciled"
                    },
                }
            }
            Err(err) => {
                warn!(error = %err, "semantic complexity pass failed, using rule result");
                rule
            }
        }
    }

    /// Classify using heuristic rules only. Sub-millisecond, no side effects.
    pub fn classify_rules(&self, text: &str) -> ComplexityClassification {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return ComplexityClassification {
                level: ComplexityLevel::Trivial,
                confidence: 0.1,
                reason: "empty input",
            };
        }

        let mut score: i32 = 0;
        let lower = trimmed.to_lowercase();

        // Signal 1: message length
        let word_count = trimmed.split_whitespace().count();
        score += length_score(word_count);

        // Signal 2: greeting exact match
        if TRIVIAL_EXACT.iter().any(|p| lower == *p) {
            score -= 4;
        }

        // Signal 3: simple question patterns
        if SIMPLE_QUESTIONS.iter().any(|q| lower.contains(q)) {
            score -= 2;
        }

        // Signals 4-6: reasoning indicators by level
        if MODERATE_INDICATORS.iter().any(|m| lower.contains(m)) {
            score += 1;
        }
        if HARD_INDICATORS.iter().any(|h| lower.contains(h)) {
            score += 2;
        }
        if EXPERT_INDICATORS.iter().any(|e| lower.contains(e)) {
            score += 3;
        }

        // Signal 7: code blocks
        if trimmed.contains("```") {
            score += 2;
        }

        // Signal 8: numbered multi-step lists
        if numbered_steps(trimmed) >= 3 {
            score += 1;
        }

        let (level, confidence, reason) = score_to_level(score);
        ComplexityClassification {
            level,
            confidence,
            reason,
        }
    }
}

fn length_score(word_count: usize) -> i32 {
    match word_count {
        0..=3 => -2,
        4..=15 => 0,
        16..=60 => 1,
        61..=150 => 2,
        _ => 3,
    }
}

/// Count lines that open with a list marker like `1.` or `2)`.
fn numbered_steps(text: &str) -> usize {
    text.lines()
        .filter(|line| {
            let t = line.trim_start();
            let mut chars = t.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_digit())
                && matches!(chars.next(), Some('.') | Some(')'))
        })
        .count()
}

fn score_to_level(score: i32) -> (ComplexityLevel, f32, &'static str) {
    if score <= -3 {
        let confidence = ((-score) as f32 / 6.0).min(1.0);
        (ComplexityLevel::Trivial, confidence, "trivial query indicators")
    } else if score <= -1 {
        let confidence = 0.4 + 0.2 * (-score) as f32 / 2.0;
        (ComplexityLevel::Simple, confidence, "simple query indicators")
    } else if score <= 1 {
        let confidence = 0.6 - 0.1 * score as f32;
        (ComplexityLevel::Moderate, confidence, "no strong signals either way")
    } else if score <= 4 {
        let confidence = (score as f32 / 5.0).min(1.0);
        (ComplexityLevel::Hard, confidence, "hard query indicators")
    } else {
        let confidence = (score as f32 / 8.0).min(1.0);
        (ComplexityLevel::Expert, confidence, "expert query indicators")
    }
}

/// Embed the query and compare it to per-level exemplar phrases.
///
/// The level with the highest average similarity wins; confidence combines
/// the absolute similarity with the margin over the runner-up.
async fn semantic_classify(
    embedder: &dyn EmbeddingAdapter,
    text: &str,
) -> Result<ComplexityClassification, cascade_core::CascadeError> {
    let query_vec = embedder.embed(text).await?;

    let mut best: Option<(ComplexityLevel, f32)> = None;
    let mut second = 0.0f32;

    for (level, exemplars) in LEVEL_EXEMPLARS {
        let mut total = 0.0f32;
        for exemplar in *exemplars {
            let exemplar_vec = embedder.embed(exemplar).await?;
            total += cosine_similarity(&query_vec, &exemplar_vec);
        }
        let avg = total / exemplars_len(exemplars);
        match best {
            Some((_, best_score)) if avg <= best_score => {
                if avg > second {
                    second = avg;
                }
            }
            Some((_, best_score)) => {
                second = best_score;
                best = Some((*level, avg));
            }
            None => best = Some((*level, avg)),
        }
    }

    let (level, top) = best.unwrap_or((ComplexityLevel::Moderate, 0.0));
    let confidence = (top + (top - second)).clamp(0.0, 1.0);

    Ok(ComplexityClassification {
        level,
        confidence,
        reason: "semantic exemplar match",
    })
}

fn exemplars_len(exemplars: &[&str]) -> f32 {
    exemplars.len().max(1) as f32
}
