// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic domain classification.
//!
//! Rule-based keyword matching against per-domain exemplar sets, with an
//! optional semantic pass over embedding similarity. An explicit override
//! on the query short-circuits detection entirely.

use std::sync::Arc;

use cascade_config::ClassifyConfig;
use cascade_core::traits::{cosine_similarity, EmbeddingAdapter};
use cascade_core::Domain;
use tracing::warn;

use crate::reconcile;

/// Result of classifying a query's topic domain.
#[derive(Debug, Clone)]
pub struct DomainClassification {
    /// The classified domain.
    pub domain: Domain,
    /// Confidence in the classification (0.0-1.0).
    pub confidence: f32,
}

/// Keyword exemplars per domain. Longer phrases are more distinctive and
/// contribute proportionally more to the match score.
const DOMAIN_KEYWORDS: &[(Domain, &[&str])] = &[
    (Domain::Code, &[
        "function", "compile", "debug", "refactor", "stack trace",
        "segfault", "unit test", "pull request", "source code", "api",
        "regex", "sql query", "python", "rust", "javascript",
    ]),
    (Domain::Medical, &[
        "diagnosis", "symptom", "treatment", "medication", "dosage",
        "side effects", "blood pressure", "prescription", "patient",
        "chronic pain", "differential diagnosis",
    ]),
    (Domain::Legal, &[
        "contract", "liability", "lawsuit", "statute", "plaintiff",
        "defendant", "jurisdiction", "intellectual property",
        "terms of service", "legal advice", "breach of contract",
    ]),
    (Domain::Financial, &[
        "investment", "portfolio", "interest rate", "mortgage",
        "tax deduction", "stock market", "compound interest",
        "retirement account", "capital gains",
    ]),
    (Domain::Math, &[
        "equation", "integral", "derivative", "theorem", "matrix",
        "probability", "polynomial", "prime number", "solve for",
        "quadratic formula",
    ]),
    (Domain::Science, &[
        "experiment", "hypothesis", "molecule", "photosynthesis",
        "quantum", "evolution", "chemical reaction", "velocity",
        "thermodynamics", "cell membrane",
    ]),
    (Domain::Conversation, &[
        "how are you", "tell me a joke", "let's chat", "what do you think",
        "your opinion", "roleplay", "pretend you are",
    ]),
    (Domain::Factual, &[
        "capital of", "who invented", "when was", "how many", "population of",
        "tallest", "largest", "who wrote", "what year",
    ]),
];

/// Semantic exemplar phrases per domain, used by the optional embedding pass.
const DOMAIN_EXEMPLARS: &[(Domain, &[&str])] = &[
    (Domain::Code, &[
        "why does my function throw a null pointer exception",
        "refactor this module to use async io",
    ]),
    (Domain::Medical, &[
        "what are the symptoms of iron deficiency",
        "is this medication safe to combine with ibuprofen",
    ]),
    (Domain::Legal, &[
        "can my landlord break this lease agreement",
        "what does limited liability mean in a contract",
    ]),
    (Domain::Financial, &[
        "how should I allocate my retirement portfolio",
        "what is the tax impact of selling these shares",
    ]),
    (Domain::Math, &[
        "solve this system of linear equations",
        "what is the derivative of this polynomial",
    ]),
    (Domain::Science, &[
        "explain how photosynthesis converts light into energy",
        "why do heavier isotopes decay more slowly",
    ]),
    (Domain::Conversation, &[
        "tell me a joke about programmers",
        "what do you think about rainy days",
    ]),
    (Domain::Factual, &[
        "what is the capital of Australia",
        "who invented the printing press",
    ]),
];

/// Confidence reported when no keyword matches and we default to general.
const DEFAULT_CONFIDENCE: f32 = 0.30;

/// Topic domain classifier.
///
/// Rule-based by default; attach an embedding adapter to enable the
/// semantic pass for low-confidence rule results.
pub struct DomainClassifier {
    config: ClassifyConfig,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
}

impl DomainClassifier {
    /// Create a rule-only classifier.
    pub fn new(config: ClassifyConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    /// Create a classifier with a semantic pass backed by `embedder`.
    pub fn with_semantic(config: ClassifyConfig, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        Self {
            config,
            embedder: Some(embedder),
        }
    }

    /// Classify a query's domain.
    ///
    /// An explicit override returns at confidence 1.0 with no detection.
    /// Otherwise the rule pass runs first, and the semantic pass only when
    /// the rule result falls below the configured escalation bar.
    pub async fn classify(
        &self,
        text: &str,
        override_domain: Option<Domain>,
    ) -> DomainClassification {
        if let Some(domain) = override_domain {
            return DomainClassification {
                domain,
                confidence: 1.0,
            };
        }

        let rule = self.classify_rules(text);

        let Some(embedder) = self.embedder.as_ref().filter(|_| self.config.semantic) else {
            return rule;
        };
        if rule.confidence >= self.config.rule_confidence_bar {
            return rule;
        }

        match semantic_classify(embedder.as_ref(), text).await {
            Ok(semantic) => {
                let (domain, confidence, _) = reconcile(
                    (rule.domain, rule.confidence),
                    (semantic.domain, semantic.confidence),
                    self.config.disagreement_policy,
                    self.config.agreement_boost,
                );
                DomainClassification { domain, confidence }
            }
            Err(err) => {
                warn!(error = %err, "semantic domain pass failed, using rule result");
                rule
            }
        }
    }

    /// Rule-based keyword matching. Sub-millisecond, no side effects.
    ///
    /// Each matched phrase contributes its word count, so longer phrases are
    /// more distinctive. Confidence reflects how far the winning domain is
    /// ahead of the runner-up.
    pub fn classify_rules(&self, text: &str) -> DomainClassification {
        let lower = text.to_lowercase();

        let mut top: Option<(Domain, f32)> = None;
        let mut second = 0.0f32;

        for (domain, keywords) in DOMAIN_KEYWORDS {
            let score: f32 = keywords
                .iter()
                .filter(|k| lower.contains(*k))
                .map(|k| k.split_whitespace().count() as f32)
                .sum();
            if score <= 0.0 {
                continue;
            }
            match top {
                Some((_, top_score)) if score <= top_score => {
                    if score > second {
                        second = score;
                    }
                }
                Some((_, top_score)) => {
                    second = top_score;
                    top = Some((*domain, score));
                }
                None => top = Some((*domain, score)),
            }
        }

        match top {
            Some((domain, top_score)) => {
                let confidence = if second > 0.0 {
                    (top_score / (top_score + second)).min(0.95)
                } else {
                    (0.5 + 0.1 * top_score).min(0.95)
                };
                DomainClassification { domain, confidence }
            }
            None => DomainClassification {
                domain: Domain::General,
                confidence: DEFAULT_CONFIDENCE,
            },
        }
    }
}

/// Embed the query and compare it to per-domain exemplar phrases.
async fn semantic_classify(
    embedder: &dyn EmbeddingAdapter,
    text: &str,
) -> Result<DomainClassification, cascade_core::CascadeError> {
    let query_vec = embedder.embed(text).await?;

    let mut best: Option<(Domain, f32)> = None;
    let mut second = 0.0f32;

    for (domain, exemplars) in DOMAIN_EXEMPLARS {
        let mut total = 0.0f32;
        for exemplar in *exemplars {
            let exemplar_vec = embedder.embed(exemplar).await?;
            total += cosine_similarity(&query_vec, &exemplar_vec);
        }
        let avg = total / exemplars.len().max(1) as f32;
        match best {
            Some((_, best_score)) if avg <= best_score => {
                if avg > second {
                    second = avg;
                }
            }
            Some((_, best_score)) => {
                second = best_score;
                best = Some((*domain, avg));
            }
            None => best = Some((*domain, avg)),
        }
    }

    let (domain, top) = best.unwrap_or((Domain::General, 0.0));
    let confidence = (top + (top - second)).clamp(0.0, 1.0);

    Ok(DomainClassification { domain, confidence })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_config::ClassifyConfig;

    fn classifier() -> DomainClassifier {
        DomainClassifier::new(ClassifyConfig::default())
    }

    #[tokio::test]
    async fn override_wins_at_full_confidence() {
        let c = classifier();
        let result = c
            .classify("what is the capital of France", Some(Domain::Legal))
            .await;
        assert_eq!(result.domain, Domain::Legal);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn code_keywords_match() {
        let c = classifier();
        let result = c.classify_rules("my function throws a segfault, help me debug it");
        assert_eq!(result.domain, Domain::Code);
    }

    #[test]
    fn medical_keywords_match() {
        let c = classifier();
        let result =
            c.classify_rules("what treatment and dosage is appropriate for these symptoms?");
        assert_eq!(result.domain, Domain::Medical);
    }

    #[test]
    fn no_match_defaults_to_general() {
        let c = classifier();
        let result = c.classify_rules("ramblings about nothing in particular");
        assert_eq!(result.domain, Domain::General);
        assert!(result.confidence < 0.5);
    }

    #[test]
    fn longer_phrases_are_more_distinctive() {
        let c = classifier();
        // "breach of contract" (3 words) should outweigh a single-word hit.
        let result = c.classify_rules("is this a breach of contract under the api terms?");
        assert_eq!(result.domain, Domain::Legal);
    }

    #[test]
    fn unambiguous_match_has_higher_confidence_than_contested() {
        let c = classifier();
        let clean = c.classify_rules("differential diagnosis for the patient");
        let contested = c.classify_rules("write a sql query about a patient treatment");
        assert!(clean.confidence > contested.confidence);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let c = classifier();
        let a = c.classify_rules("solve for the derivative of this polynomial");
        let b = c.classify_rules("solve for the derivative of this polynomial");
        assert_eq!(a.domain, b.domain);
        assert_eq!(a.confidence, b.confidence);
    }

    #[tokio::test]
    async fn rule_only_when_no_embedder() {
        let c = classifier();
        let result = c.classify("what is a quadratic formula", None).await;
        assert_eq!(result.domain, Domain::Math);
    }

    #[tokio::test]
    async fn semantic_pass_runs_on_uncertain_rule_result() {
        use cascade_test_utils::MockEmbedder;
        let embedder = MockEmbedder::new().with_cluster(
            "is this safe to take alongside what my doctor gave me",
            &[
                "what are the symptoms of iron deficiency",
                "is this medication safe to combine with ibuprofen",
            ],
        );
        let c = DomainClassifier::with_semantic(ClassifyConfig::default(), Arc::new(embedder));
        // No medical keyword hits, so rules alone would say General.
        let result = c
            .classify("is this safe to take alongside what my doctor gave me", None)
            .await;
        assert_eq!(result.domain, Domain::Medical);
    }
}
