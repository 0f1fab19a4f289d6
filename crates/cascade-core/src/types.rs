// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Cascade engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Identifies the caller of a request for admission accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(pub String);

impl From<&str> for CallerId {
    fn from(s: &str) -> Self {
        CallerId(s.to_string())
    }
}

impl std::fmt::Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable routing request.
///
/// Constructed once per incoming query and read-only thereafter.
#[derive(Debug, Clone)]
pub struct Query {
    /// Raw query text.
    pub text: String,
    /// Caller identity for budget/rate accounting. Anonymous when `None`.
    pub caller: Option<CallerId>,
    /// Tier name overriding the caller's configured default tier.
    pub tier: Option<String>,
    /// Explicit domain override, skipping domain detection entirely.
    pub domain_override: Option<Domain>,
}

impl Query {
    /// Create a query with no caller identity or overrides.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            caller: None,
            tier: None,
            domain_override: None,
        }
    }

    /// Attach a caller identity.
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(CallerId(caller.into()));
        self
    }

    /// Attach a tier name.
    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    /// Force a specific domain, skipping detection.
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain_override = Some(domain);
        self
    }
}

/// Query difficulty levels, ordered from cheapest to hardest.
///
/// Trivial/Simple route directly to the cheapest model; Hard/Expert route
/// directly to the strongest; Moderate goes through the draft/verify cascade.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Trivial,
    Simple,
    Moderate,
    Hard,
    Expert,
}

/// Topic domains with per-domain quality bars.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Code,
    Medical,
    Legal,
    Financial,
    Math,
    Science,
    Conversation,
    Factual,
    General,
}

impl Domain {
    /// Minimum alignment an answer must reach for this domain.
    ///
    /// High-stakes domains carry stricter floors; a fluent but off-topic
    /// answer in a medical query must never be accepted.
    pub fn confidence_floor(self) -> f32 {
        match self {
            Domain::Medical | Domain::Legal => 0.30,
            Domain::Financial => 0.25,
            Domain::Code | Domain::Math => 0.20,
            Domain::Science | Domain::Factual => 0.15,
            Domain::Conversation | Domain::General => 0.10,
        }
    }
}

/// Which cascade positions a model may serve in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// Cheap first-attempt model only.
    Draft,
    /// Strong fallback model only.
    Verifier,
    /// Eligible for either position.
    Both,
}

/// Token counts for one provider invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Sum two usages, saturating on overflow.
    pub fn add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
        }
    }
}

/// Static description of a model available to the engine.
///
/// Supplied by the caller at engine construction and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Provider-facing model identifier.
    pub name: String,
    /// Cascade positions this model may serve in.
    pub role: ModelRole,
    /// Cost per million input tokens, USD.
    pub input_cost_per_mtok: f64,
    /// Cost per million output tokens, USD.
    pub output_cost_per_mtok: f64,
    /// Domains this model is considered a specialist in.
    #[serde(default)]
    pub specializations: Vec<Domain>,
    /// Whether the model supports tool/function calling.
    #[serde(default)]
    pub supports_tools: bool,
}

impl ModelSpec {
    /// True if this model may serve as a draft.
    pub fn draft_eligible(&self) -> bool {
        matches!(self.role, ModelRole::Draft | ModelRole::Both)
    }

    /// True if this model may serve as a verifier.
    pub fn verifier_eligible(&self) -> bool {
        matches!(self.role, ModelRole::Verifier | ModelRole::Both)
    }

    /// True if the model declares a specialization for the domain.
    pub fn specializes_in(&self, domain: Domain) -> bool {
        self.specializations.contains(&domain)
    }

    /// Cost in USD for a measured token usage.
    pub fn cost_for(&self, usage: &TokenUsage) -> f64 {
        let input = (usage.input_tokens as f64 / 1_000_000.0) * self.input_cost_per_mtok;
        let output = (usage.output_tokens as f64 / 1_000_000.0) * self.output_cost_per_mtok;
        input + output
    }

    /// Blended per-MTok rate used to order models by expense.
    ///
    /// Output tokens are weighted 3:1 against input to reflect typical
    /// completion-heavy usage.
    pub fn blended_rate(&self) -> f64 {
        (self.input_cost_per_mtok + 3.0 * self.output_cost_per_mtok) / 4.0
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

/// Identifies the type of adapter behind the plugin trait.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Embedding,
}

/// A request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Model identifier to invoke.
    pub model: String,
    /// The query text.
    pub query: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Request per-token log-probabilities when the provider supports them.
    pub logprobs: bool,
}

/// A complete response from an LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated content.
    pub content: String,
    /// Model that actually served the request.
    pub model: String,
    /// Measured token usage.
    pub usage: TokenUsage,
    /// Per-token natural-log probabilities of the emitted tokens, if reported.
    pub logprobs: Option<Vec<f32>>,
    /// Provider round-trip latency.
    pub latency: Duration,
}

/// Event kinds in a provider stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventType {
    /// Stream opened; no content yet.
    Start,
    /// Incremental content.
    Delta,
    /// Stream finished; final usage attached to the last chunk.
    Stop,
}

/// A single chunk from a streaming provider response.
#[derive(Debug, Clone)]
pub struct ProviderStreamChunk {
    pub event_type: StreamEventType,
    /// Incremental text for `Delta` events.
    pub text: Option<String>,
    /// Final usage, attached to the `Stop` event.
    pub usage: Option<TokenUsage>,
}
