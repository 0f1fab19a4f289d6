// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Cascade routing engine.
//!
//! Draft rejection is a normal state transition and never appears here;
//! errors are reserved for configuration problems, provider failures, and
//! admission denials.

use std::time::Duration;

use chrono::{DateTime, Utc};
use strum::{Display, EnumString};
use thiserror::Error;

/// Whether a provider failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderErrorKind {
    /// Network hiccup, timeout, overload. Retried once.
    Transient,
    /// Invalid request, auth failure, unknown model. Surfaced immediately.
    Permanent,
}

/// Which configured limit an admission denial refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LimitKind {
    HourlyRequests,
    DailyRequests,
    DailySpend,
    MonthlySpend,
}

/// The primary error type used across all Cascade crates.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// Configuration errors (invalid TOML, missing required fields, bad thresholds).
    #[error("configuration error: {0}")]
    Config(String),

    /// LLM provider errors (API failure, token limits, model not found).
    #[error("provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A spend limit would be exceeded by this request.
    #[error("budget exceeded: {limit} at ${spent_usd:.4} of ${cap_usd:.4}, resets {resets_at}")]
    BudgetExceeded {
        limit: LimitKind,
        spent_usd: f64,
        cap_usd: f64,
        resets_at: DateTime<Utc>,
    },

    /// A request-count limit would be exceeded by this request.
    #[error("rate limit exceeded: {limit} at {used} of {cap}, retry after {retry_after:?}")]
    RateLimitExceeded {
        limit: LimitKind,
        used: u32,
        cap: u32,
        retry_after: Duration,
    },

    /// A provider call exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CascadeError {
    /// Construct a transient provider error from a message.
    pub fn transient(message: impl Into<String>) -> Self {
        CascadeError::Provider {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
            source: None,
        }
    }

    /// Construct a permanent provider error from a message.
    pub fn permanent(message: impl Into<String>) -> Self {
        CascadeError::Provider {
            kind: ProviderErrorKind::Permanent,
            message: message.into(),
            source: None,
        }
    }

    /// True for failures the orchestrator may retry once before escalating.
    ///
    /// Timeouts count as transient: the provider may simply have been
    /// overloaded for that one call.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CascadeError::Provider {
                kind: ProviderErrorKind::Transient,
                ..
            } | CascadeError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(CascadeError::transient("overloaded").is_transient());
        assert!(
            CascadeError::Timeout {
                duration: Duration::from_secs(30)
            }
            .is_transient()
        );
        assert!(!CascadeError::permanent("bad model").is_transient());
        assert!(!CascadeError::Config("oops".into()).is_transient());
    }

    #[test]
    fn budget_error_carries_detail() {
        let err = CascadeError::BudgetExceeded {
            limit: LimitKind::DailySpend,
            spent_usd: 9.5,
            cap_usd: 10.0,
            resets_at: Utc::now(),
        };
        let msg = err.to_string();
        assert!(msg.contains("daily_spend"), "got: {msg}");
        assert!(msg.contains("9.5"), "got: {msg}");
    }

    #[test]
    fn rate_error_carries_retry_after() {
        let err = CascadeError::RateLimitExceeded {
            limit: LimitKind::HourlyRequests,
            used: 10,
            cap: 10,
            retry_after: Duration::from_secs(120),
        };
        let msg = err.to_string();
        assert!(msg.contains("hourly_requests"), "got: {msg}");
        assert!(msg.contains("120"), "got: {msg}");
    }

    #[test]
    fn limit_kind_round_trips() {
        use std::str::FromStr;
        for kind in [
            LimitKind::HourlyRequests,
            LimitKind::DailyRequests,
            LimitKind::DailySpend,
            LimitKind::MonthlySpend,
        ] {
            let parsed = LimitKind::from_str(&kind.to_string()).unwrap();
            assert_eq!(kind, parsed);
        }
    }
}
