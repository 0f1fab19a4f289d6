// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query classification for the Cascade routing engine.
//!
//! Two independent, side-effect-free classifiers:
//!
//! - [`ComplexityClassifier`] maps query text to a five-level difficulty
//!   scale used to pick a routing strategy.
//! - [`DomainClassifier`] maps query text to a topic domain, each carrying
//!   its own quality floor.
//!
//! Both run rule-based by default (sub-millisecond, deterministic) and can
//! be upgraded with a semantic pass behind the [`EmbeddingAdapter`] trait.
//! The semantic pass only runs when the rule result is uncertain, and a
//! failing embedder degrades back to the rule result.
//!
//! [`EmbeddingAdapter`]: cascade_core::traits::EmbeddingAdapter

pub mod complexity;
pub mod domain;

pub use complexity::{ComplexityClassification, ComplexityClassifier};
pub use domain::{DomainClassification, DomainClassifier};

use cascade_config::DisagreementPolicy;

/// Reconcile a rule-based and a semantic classification of the same query.
///
/// Agreement boosts the stronger confidence additively (capped at 1.0).
/// Disagreement resolves per policy; the default takes the higher-confidence
/// side. Returns the winning label, its confidence, and whether the two
/// passes agreed.
pub(crate) fn reconcile<T: Copy + PartialEq>(
    rule: (T, f32),
    semantic: (T, f32),
    policy: DisagreementPolicy,
    agreement_boost: f32,
) -> (T, f32, bool) {
    let (rule_label, rule_conf) = rule;
    let (sem_label, sem_conf) = semantic;

    if rule_label == sem_label {
        let confidence = (rule_conf.max(sem_conf) + agreement_boost).min(1.0);
        return (rule_label, confidence, true);
    }

    match policy {
        DisagreementPolicy::PreferHigher => {
            if sem_conf > rule_conf {
                (sem_label, sem_conf, false)
            } else {
                (rule_label, rule_conf, false)
            }
        }
        DisagreementPolicy::PreferRule => (rule_label, rule_conf, false),
        DisagreementPolicy::PreferSemantic => (sem_label, sem_conf, false),
    }
}
