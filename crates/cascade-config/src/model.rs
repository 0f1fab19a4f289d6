// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Cascade routing engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use cascade_core::ComplexityLevel;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Cascade configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CascadeConfig {
    /// Orchestrator settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Complexity/domain classifier settings.
    #[serde(default)]
    pub classify: ClassifyConfig,

    /// Confidence/alignment scoring settings.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Budget and rate admission settings.
    #[serde(default)]
    pub admission: AdmissionConfig,
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Deadline for a single provider invocation in seconds.
    #[serde(default = "default_invocation_timeout_secs")]
    pub invocation_timeout_secs: u64,

    /// Retry a provider call once on transient errors.
    #[serde(default = "default_retry_transient")]
    pub retry_transient: bool,

    /// Default worker-pool size for batch submission.
    #[serde(default = "default_batch_concurrency")]
    pub batch_max_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            invocation_timeout_secs: default_invocation_timeout_secs(),
            retry_transient: default_retry_transient(),
            batch_max_concurrency: default_batch_concurrency(),
        }
    }
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_invocation_timeout_secs() -> u64 {
    120
}

fn default_retry_transient() -> bool {
    true
}

fn default_batch_concurrency() -> usize {
    8
}

/// How to reconcile rule-based and semantic classifiers when they disagree.
///
/// The source material leaves low-confidence disagreement underspecified;
/// it is an explicit policy knob here rather than a hidden constant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisagreementPolicy {
    /// Take whichever classifier reports higher confidence.
    PreferHigher,
    /// Always trust the rule-based pass.
    PreferRule,
    /// Always trust the semantic pass when it ran.
    PreferSemantic,
}

/// Classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifyConfig {
    /// Run the semantic pass when an embedding adapter is configured.
    #[serde(default = "default_semantic_enabled")]
    pub semantic: bool,

    /// Rule confidence below which the semantic domain pass is consulted.
    #[serde(default = "default_rule_confidence_bar")]
    pub rule_confidence_bar: f32,

    /// Confidence added when rule and semantic passes agree (capped at 1.0).
    #[serde(default = "default_agreement_boost")]
    pub agreement_boost: f32,

    /// Reconciliation policy when the two passes disagree.
    #[serde(default = "default_disagreement_policy")]
    pub disagreement_policy: DisagreementPolicy,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            semantic: default_semantic_enabled(),
            rule_confidence_bar: default_rule_confidence_bar(),
            agreement_boost: default_agreement_boost(),
            disagreement_policy: default_disagreement_policy(),
        }
    }
}

fn default_semantic_enabled() -> bool {
    true
}

fn default_rule_confidence_bar() -> f32 {
    0.85
}

fn default_agreement_boost() -> f32 {
    0.15
}

fn default_disagreement_policy() -> DisagreementPolicy {
    DisagreementPolicy::PreferHigher
}

/// Confidence/alignment scoring configuration.
///
/// Weights renormalize at scoring time when the logprob signal is absent,
/// so they need not sum to 1.0 here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Weight of the provider-reported log-probability signal.
    #[serde(default = "default_logprob_weight")]
    pub logprob_weight: f32,

    /// Weight of the structural heuristics signal.
    #[serde(default = "default_structural_weight")]
    pub structural_weight: f32,

    /// Weight of the alignment signal.
    #[serde(default = "default_alignment_weight")]
    pub alignment_weight: f32,

    /// Hard confidence cap applied when alignment is below the domain floor.
    #[serde(default = "default_alignment_cap")]
    pub alignment_cap: f32,

    /// Draft acceptance threshold for trivial queries.
    #[serde(default = "default_trivial_threshold")]
    pub trivial_threshold: f32,

    /// Draft acceptance threshold for simple queries.
    #[serde(default = "default_simple_threshold")]
    pub simple_threshold: f32,

    /// Draft acceptance threshold for moderate queries.
    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: f32,

    /// Draft acceptance threshold for hard queries.
    #[serde(default = "default_hard_threshold")]
    pub hard_threshold: f32,

    /// Draft acceptance threshold for expert queries.
    #[serde(default = "default_expert_threshold")]
    pub expert_threshold: f32,
}

impl ScoringConfig {
    /// Acceptance threshold for a complexity level.
    ///
    /// Hard/expert rarely apply in cascade mode since those levels route
    /// directly to the strongest model, but the table is complete so a
    /// custom routing policy can still consult it.
    pub fn accept_threshold(&self, level: ComplexityLevel) -> f32 {
        match level {
            ComplexityLevel::Trivial => self.trivial_threshold,
            ComplexityLevel::Simple => self.simple_threshold,
            ComplexityLevel::Moderate => self.moderate_threshold,
            ComplexityLevel::Hard => self.hard_threshold,
            ComplexityLevel::Expert => self.expert_threshold,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            logprob_weight: default_logprob_weight(),
            structural_weight: default_structural_weight(),
            alignment_weight: default_alignment_weight(),
            alignment_cap: default_alignment_cap(),
            trivial_threshold: default_trivial_threshold(),
            simple_threshold: default_simple_threshold(),
            moderate_threshold: default_moderate_threshold(),
            hard_threshold: default_hard_threshold(),
            expert_threshold: default_expert_threshold(),
        }
    }
}

fn default_logprob_weight() -> f32 {
    0.35
}

fn default_structural_weight() -> f32 {
    0.25
}

fn default_alignment_weight() -> f32 {
    0.40
}

fn default_alignment_cap() -> f32 {
    0.20
}

fn default_trivial_threshold() -> f32 {
    0.50
}

fn default_simple_threshold() -> f32 {
    0.50
}

fn default_moderate_threshold() -> f32 {
    0.65
}

fn default_hard_threshold() -> f32 {
    0.80
}

fn default_expert_threshold() -> f32 {
    0.85
}

/// What the admission controller does when a caller crosses a limit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Always permit; emit a warning past the soft threshold.
    Warn,
    /// Deny once any configured limit would be exceeded.
    Block,
    /// Substitute progressively cheaper models past the soft threshold;
    /// deny only at the hard limit.
    Degrade,
}

/// One step in a tier's degradation chain.
///
/// When budget utilization reaches `at` (fraction of the daily cap), the
/// requested model is substituted with `model`. Steps are consulted in
/// descending `at` order; the highest crossed step wins.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DegradationStep {
    /// Utilization fraction at which this step activates (0.0-1.0).
    pub at: f64,
    /// Substitute model identifier.
    pub model: String,
}

/// Per-tier limits and enforcement policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Tier name referenced by `Query::tier` and `admission.default_tier`.
    pub name: String,

    /// Enforcement mode for this tier.
    #[serde(default = "default_tier_mode")]
    pub mode: EnforcementMode,

    /// Requests allowed per rolling hour. `None` means unlimited.
    #[serde(default)]
    pub hourly_requests: Option<u32>,

    /// Requests allowed per rolling day. `None` means unlimited.
    #[serde(default)]
    pub daily_requests: Option<u32>,

    /// Spend allowed per rolling day in USD. `None` means unlimited.
    #[serde(default)]
    pub daily_spend_usd: Option<f64>,

    /// Spend allowed per rolling 30 days in USD. `None` means unlimited.
    #[serde(default)]
    pub monthly_spend_usd: Option<f64>,

    /// Utilization fraction at which warnings/degradation begin.
    #[serde(default = "default_soft_threshold")]
    pub soft_threshold: f64,

    /// Models this tier may invoke. Empty means all models.
    #[serde(default)]
    pub allowed_models: Vec<String>,

    /// Static degradation chain, only consulted in `degrade` mode.
    #[serde(default)]
    pub degradation: Vec<DegradationStep>,
}

fn default_tier_mode() -> EnforcementMode {
    EnforcementMode::Block
}

fn default_soft_threshold() -> f64 {
    0.80
}

/// Admission controller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Tier applied to callers that do not name one.
    #[serde(default = "default_default_tier")]
    pub default_tier: String,

    /// The tier catalog.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
}

impl AdmissionConfig {
    /// Look up a tier by name.
    pub fn tier(&self, name: &str) -> Option<&TierConfig> {
        self.tiers.iter().find(|t| t.name == name)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            default_tier: default_default_tier(),
            tiers: default_tiers(),
        }
    }
}

fn default_default_tier() -> String {
    "free".to_string()
}

fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            name: "free".to_string(),
            mode: EnforcementMode::Block,
            hourly_requests: Some(10),
            daily_requests: Some(100),
            daily_spend_usd: Some(1.0),
            monthly_spend_usd: Some(10.0),
            soft_threshold: default_soft_threshold(),
            allowed_models: Vec::new(),
            degradation: Vec::new(),
        },
        TierConfig {
            name: "pro".to_string(),
            mode: EnforcementMode::Block,
            hourly_requests: Some(120),
            daily_requests: Some(2000),
            daily_spend_usd: Some(50.0),
            monthly_spend_usd: Some(500.0),
            soft_threshold: default_soft_threshold(),
            allowed_models: Vec::new(),
            degradation: Vec::new(),
        },
        TierConfig {
            name: "enterprise".to_string(),
            mode: EnforcementMode::Warn,
            hourly_requests: None,
            daily_requests: None,
            daily_spend_usd: None,
            monthly_spend_usd: None,
            soft_threshold: default_soft_threshold(),
            allowed_models: Vec::new(),
            degradation: Vec::new(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_three_tiers() {
        let config = CascadeConfig::default();
        assert_eq!(config.admission.tiers.len(), 3);
        assert!(config.admission.tier("free").is_some());
        assert!(config.admission.tier("pro").is_some());
        assert!(config.admission.tier("enterprise").is_some());
        assert!(config.admission.tier("missing").is_none());
    }

    #[test]
    fn thresholds_increase_with_complexity() {
        let s = ScoringConfig::default();
        assert!(
            s.accept_threshold(ComplexityLevel::Trivial)
                <= s.accept_threshold(ComplexityLevel::Moderate)
        );
        assert!(
            s.accept_threshold(ComplexityLevel::Moderate)
                <= s.accept_threshold(ComplexityLevel::Expert)
        );
    }

    #[test]
    fn tier_toml_deserializes() {
        let toml_str = r#"
[admission]
default_tier = "starter"

[[admission.tiers]]
name = "starter"
mode = "degrade"
hourly_requests = 5
daily_spend_usd = 0.5
degradation = [
    { at = 0.8, model = "draft-s" },
    { at = 0.95, model = "draft-xs" },
]
"#;
        let config: CascadeConfig = toml::from_str(toml_str).unwrap();
        let tier = config.admission.tier("starter").unwrap();
        assert_eq!(tier.mode, EnforcementMode::Degrade);
        assert_eq!(tier.hourly_requests, Some(5));
        assert_eq!(tier.daily_requests, None);
        assert_eq!(tier.degradation.len(), 2);
        assert_eq!(tier.degradation[1].model, "draft-xs");
    }

    #[test]
    fn unknown_keys_rejected() {
        let toml_str = r#"
[engine]
max_tokens = 1024
not_a_key = true
"#;
        assert!(toml_str.parse::<toml::Table>().is_ok());
        assert!(toml::from_str::<CascadeConfig>(toml_str).is_err());
    }

    #[test]
    fn disagreement_policy_parses() {
        use std::str::FromStr;
        assert_eq!(
            DisagreementPolicy::from_str("prefer_higher").unwrap(),
            DisagreementPolicy::PreferHigher
        );
        let toml_str = r#"
[classify]
disagreement_policy = "prefer_rule"
"#;
        let config: CascadeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.classify.disagreement_policy,
            DisagreementPolicy::PreferRule
        );
    }
}
