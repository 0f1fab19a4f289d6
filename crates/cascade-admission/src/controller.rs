// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-caller budget and rate admission control.
//!
//! Enforces the reserve/commit/release protocol: `reserve` atomically checks
//! every configured limit and records an optimistic spend estimate in one
//! per-caller critical section, `commit` replaces the estimate with the
//! measured cost, and dropping an uncommitted [`Reservation`] rolls the
//! estimate back. Two concurrent requests from one caller can therefore
//! never both pass a check before either has recorded spend, while requests
//! from different callers never contend on the same lock.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, warn};

use cascade_config::{AdmissionConfig, EnforcementMode, TierConfig};
use cascade_core::{CallerId, CascadeError, LimitKind};

use crate::window::{SlidingWindow, SpendWindow};

const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(86_400);
/// Rolling 30-day window standing in for "monthly".
const MONTH: Duration = Duration::from_secs(30 * 86_400);

/// Mutable admission state for one caller.
///
/// Only ever touched under its own mutex; request entries survive a release
/// (the invocation attempt happened), spend estimates do not.
pub(crate) struct CallerState {
    pub(crate) tier: String,
    pub(crate) hourly: SlidingWindow,
    pub(crate) daily: SlidingWindow,
    pub(crate) daily_spend: SpendWindow,
    pub(crate) monthly_spend: SpendWindow,
}

impl CallerState {
    fn new(tier: &str) -> Self {
        Self {
            tier: tier.to_string(),
            hourly: SlidingWindow::new(HOUR),
            daily: SlidingWindow::new(DAY),
            daily_spend: SpendWindow::new(DAY),
            monthly_spend: SpendWindow::new(MONTH),
        }
    }
}

/// Admission controller enforcing tiered rate and spend limits.
pub struct AdmissionController {
    config: AdmissionConfig,
    pub(crate) callers: DashMap<CallerId, Arc<Mutex<CallerState>>>,
}

/// A granted admission slot, released on drop unless committed.
///
/// Holding one entitles the caller to exactly one model invocation. After
/// the call completes, [`commit`](Reservation::commit) replaces the
/// estimated cost with the measured one; dropping without committing (call
/// failed, cancelled, or timed out) rolls the spend estimate back while
/// keeping the request counted against the rate windows.
#[must_use = "dropping a reservation releases it"]
pub struct Reservation {
    state: Arc<Mutex<CallerState>>,
    daily_id: u64,
    monthly_id: u64,
    substituted_model: Option<String>,
    committed: bool,
}

impl Reservation {
    /// The cheaper model substituted by a degrade-mode tier, if any.
    pub fn substituted_model(&self) -> Option<&str> {
        self.substituted_model.as_deref()
    }

    /// Replace the optimistic estimate with the measured cost.
    pub fn commit(mut self, actual_usd: f64) {
        let mut state = lock_state(&self.state);
        state.daily_spend.adjust(self.daily_id, actual_usd);
        state.monthly_spend.adjust(self.monthly_id, actual_usd);
        self.committed = true;
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("substituted_model", &self.substituted_model)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut state = lock_state(&self.state);
        state.daily_spend.remove(self.daily_id);
        state.monthly_spend.remove(self.monthly_id);
    }
}

/// Lock a caller state, recovering from a poisoned mutex.
///
/// Nothing inside the critical sections panics in normal operation; if a
/// test assertion poisoned the lock, the counters themselves are still
/// consistent because every mutation is a single-field update.
fn lock_state(state: &Mutex<CallerState>) -> MutexGuard<'_, CallerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            callers: DashMap::new(),
        }
    }

    /// Resolve a tier by name, falling back to the configured default.
    fn resolve_tier(&self, requested: Option<&str>) -> Result<&TierConfig, CascadeError> {
        let name = requested.unwrap_or(&self.config.default_tier);
        self.config
            .tier(name)
            .ok_or_else(|| CascadeError::Config(format!("unknown tier `{name}`")))
    }

    /// Reserve an admission slot for one model invocation.
    ///
    /// Checks every configured limit with the request's estimated cost
    /// applied, then records the rate entries and the spend estimate — all
    /// inside one per-caller critical section. Enforcement depends on the
    /// tier's mode: `warn` always permits, `block` denies on the first
    /// violated limit, `degrade` substitutes a cheaper model past the
    /// soft threshold and denies only at a hard limit.
    pub fn reserve(
        &self,
        caller: &CallerId,
        tier: Option<&str>,
        model: &str,
        estimated_usd: f64,
    ) -> Result<Reservation, CascadeError> {
        let tier = self.resolve_tier(tier)?;

        if !tier.allowed_models.is_empty() && !tier.allowed_models.iter().any(|m| m == model) {
            return Err(CascadeError::Config(format!(
                "model `{model}` not allowed for tier `{}`",
                tier.name
            )));
        }

        let state_arc = self
            .callers
            .entry(caller.clone())
            .or_insert_with(|| Arc::new(Mutex::new(CallerState::new(&tier.name))))
            .clone();
        let mut state = lock_state(&state_arc);
        state.tier = tier.name.clone();
        let now = Instant::now();

        let (violation, utilization) = check_limits(&mut state, tier, estimated_usd, now);

        let substituted_model = match tier.mode {
            EnforcementMode::Warn => {
                if let Some(err) = &violation {
                    warn!(caller = %caller, tier = %tier.name, error = %err, "limit exceeded, permitting (warn mode)");
                } else if utilization >= tier.soft_threshold {
                    warn!(caller = %caller, tier = %tier.name, utilization, "approaching tier limits");
                }
                None
            }
            EnforcementMode::Block => {
                if let Some(err) = violation {
                    return Err(err);
                }
                if utilization >= tier.soft_threshold {
                    warn!(caller = %caller, tier = %tier.name, utilization, "approaching tier limits");
                }
                None
            }
            EnforcementMode::Degrade => {
                if let Some(err) = violation {
                    return Err(err);
                }
                // Highest crossed step wins.
                let step = tier
                    .degradation
                    .iter()
                    .filter(|s| utilization >= s.at)
                    .max_by(|a, b| a.at.total_cmp(&b.at));
                if let Some(step) = step {
                    debug!(
                        caller = %caller,
                        tier = %tier.name,
                        utilization,
                        substitute = %step.model,
                        "budget pressure, degrading model"
                    );
                    Some(step.model.clone())
                } else {
                    None
                }
            }
        };

        state.hourly.record(now);
        state.daily.record(now);
        let daily_id = state.daily_spend.record(now, estimated_usd);
        let monthly_id = state.monthly_spend.record(now, estimated_usd);
        drop(state);

        Ok(Reservation {
            state: state_arc,
            daily_id,
            monthly_id,
            substituted_model,
            committed: false,
        })
    }

    /// Whether the caller's spend limits would admit an invocation at the
    /// given estimated cost. Read-only; records nothing.
    pub fn can_afford(
        &self,
        caller: &CallerId,
        tier: Option<&str>,
        estimated_usd: f64,
    ) -> Result<bool, CascadeError> {
        let tier = self.resolve_tier(tier)?;

        let Some(state_arc) = self.callers.get(caller).map(|s| s.clone()) else {
            // No history: only the caps themselves can refuse.
            let daily_ok = tier.daily_spend_usd.is_none_or(|cap| estimated_usd <= cap);
            let monthly_ok = tier.monthly_spend_usd.is_none_or(|cap| estimated_usd <= cap);
            return Ok(daily_ok && monthly_ok);
        };

        let mut state = lock_state(&state_arc);
        let now = Instant::now();
        let daily_ok = tier
            .daily_spend_usd
            .is_none_or(|cap| state.daily_spend.total(now) + estimated_usd <= cap);
        let monthly_ok = tier
            .monthly_spend_usd
            .is_none_or(|cap| state.monthly_spend.total(now) + estimated_usd <= cap);
        Ok(daily_ok && monthly_ok)
    }
}

/// Check all four limits with the incoming request applied.
///
/// Returns the first violated limit as an error (hourly, daily, daily
/// spend, monthly spend — in that order) and the peak utilization fraction
/// across all configured limits.
fn check_limits(
    state: &mut CallerState,
    tier: &TierConfig,
    estimated_usd: f64,
    now: Instant,
) -> (Option<CascadeError>, f64) {
    let mut violation = None;
    let mut utilization = 0.0f64;

    let hourly_used = state.hourly.count(now) as u32 + 1;
    if let Some(cap) = tier.hourly_requests {
        utilization = utilization.max(f64::from(hourly_used) / f64::from(cap.max(1)));
        if hourly_used > cap && violation.is_none() {
            violation = Some(CascadeError::RateLimitExceeded {
                limit: LimitKind::HourlyRequests,
                used: hourly_used - 1,
                cap,
                retry_after: state.hourly.retry_after(now),
            });
        }
    }

    let daily_used = state.daily.count(now) as u32 + 1;
    if let Some(cap) = tier.daily_requests {
        utilization = utilization.max(f64::from(daily_used) / f64::from(cap.max(1)));
        if daily_used > cap && violation.is_none() {
            violation = Some(CascadeError::RateLimitExceeded {
                limit: LimitKind::DailyRequests,
                used: daily_used - 1,
                cap,
                retry_after: state.daily.retry_after(now),
            });
        }
    }

    let daily_spent = state.daily_spend.total(now);
    if let Some(cap) = tier.daily_spend_usd {
        if cap > 0.0 {
            utilization = utilization.max((daily_spent + estimated_usd) / cap);
        }
        if daily_spent + estimated_usd > cap && violation.is_none() {
            let reset = state.daily_spend.time_until_oldest_expires(now);
            violation = Some(CascadeError::BudgetExceeded {
                limit: LimitKind::DailySpend,
                spent_usd: daily_spent,
                cap_usd: cap,
                resets_at: Utc::now() + chrono::Duration::from_std(reset).unwrap_or_default(),
            });
        }
    }

    let monthly_spent = state.monthly_spend.total(now);
    if let Some(cap) = tier.monthly_spend_usd {
        if cap > 0.0 {
            utilization = utilization.max((monthly_spent + estimated_usd) / cap);
        }
        if monthly_spent + estimated_usd > cap && violation.is_none() {
            let reset = state.monthly_spend.time_until_oldest_expires(now);
            violation = Some(CascadeError::BudgetExceeded {
                limit: LimitKind::MonthlySpend,
                spent_usd: monthly_spent,
                cap_usd: cap,
                resets_at: Utc::now() + chrono::Duration::from_std(reset).unwrap_or_default(),
            });
        }
    }

    (violation, utilization)
}
