// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as unit-range thresholds, positive weights, and
//! well-formed degradation chains.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{CascadeConfig, EnforcementMode};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CascadeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.engine.max_tokens == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.max_tokens must be positive".to_string(),
        });
    }

    if config.engine.batch_max_concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.batch_max_concurrency must be at least 1".to_string(),
        });
    }

    for (key, value) in [
        ("classify.rule_confidence_bar", config.classify.rule_confidence_bar),
        ("classify.agreement_boost", config.classify.agreement_boost),
        ("scoring.alignment_cap", config.scoring.alignment_cap),
        ("scoring.trivial_threshold", config.scoring.trivial_threshold),
        ("scoring.simple_threshold", config.scoring.simple_threshold),
        ("scoring.moderate_threshold", config.scoring.moderate_threshold),
        ("scoring.hard_threshold", config.scoring.hard_threshold),
        ("scoring.expert_threshold", config.scoring.expert_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be in [0.0, 1.0], got {value}"),
            });
        }
    }

    let weight_sum = config.scoring.logprob_weight
        + config.scoring.structural_weight
        + config.scoring.alignment_weight;
    if weight_sum <= 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "scoring weights must sum to a positive value, got {weight_sum}"
            ),
        });
    }

    for (key, value) in [
        ("scoring.logprob_weight", config.scoring.logprob_weight),
        ("scoring.structural_weight", config.scoring.structural_weight),
        ("scoring.alignment_weight", config.scoring.alignment_weight),
    ] {
        if value < 0.0 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be non-negative, got {value}"),
            });
        }
    }

    // Tier catalog checks.
    let mut seen_names = HashSet::new();
    for tier in &config.admission.tiers {
        if tier.name.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "tier name must not be empty".to_string(),
            });
        }
        if !seen_names.insert(&tier.name) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate tier name `{}`", tier.name),
            });
        }
        if !(0.0..=1.0).contains(&tier.soft_threshold) {
            errors.push(ConfigError::Validation {
                message: format!(
                    "tier `{}`: soft_threshold must be in [0.0, 1.0], got {}",
                    tier.name, tier.soft_threshold
                ),
            });
        }
        for (key, value) in [
            ("daily_spend_usd", tier.daily_spend_usd),
            ("monthly_spend_usd", tier.monthly_spend_usd),
        ] {
            if let Some(v) = value {
                if v < 0.0 {
                    errors.push(ConfigError::Validation {
                        message: format!(
                            "tier `{}`: {key} must be non-negative, got {v}",
                            tier.name
                        ),
                    });
                }
            }
        }
        for step in &tier.degradation {
            if !(0.0..=1.0).contains(&step.at) {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "tier `{}`: degradation step `at` must be in [0.0, 1.0], got {}",
                        tier.name, step.at
                    ),
                });
            }
            if step.model.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "tier `{}`: degradation step model must not be empty",
                        tier.name
                    ),
                });
            }
        }
        if tier.mode == EnforcementMode::Degrade && tier.degradation.is_empty() {
            errors.push(ConfigError::Validation {
                message: format!(
                    "tier `{}` uses degrade mode but has no degradation chain; \
                     it will block at the hard limit like block mode",
                    tier.name
                ),
            });
        }
    }

    if config.admission.tier(&config.admission.default_tier).is_none() {
        errors.push(ConfigError::Validation {
            message: format!(
                "admission.default_tier `{}` does not name a configured tier",
                config.admission.default_tier
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
