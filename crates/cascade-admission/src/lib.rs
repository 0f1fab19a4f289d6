// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget and rate admission control for the Cascade routing engine.
//!
//! Every model invocation first passes through the [`AdmissionController`],
//! which enforces per-caller sliding-window rate limits and tiered spend
//! budgets under a reserve/commit/release protocol. Reservations are RAII
//! guards: dropping one uncommitted rolls its spend estimate back, which
//! makes cancellation and provider failure paths release automatically.

pub mod controller;
pub mod usage;
pub mod window;

pub use controller::{AdmissionController, Reservation};
pub use usage::{ExportFormat, UsageSnapshot};

#[cfg(test)]
mod proptests {
    use super::*;
    use cascade_config::{AdmissionConfig, EnforcementMode, TierConfig};
    use cascade_core::CallerId;
    use proptest::prelude::*;

    fn tier_with_daily_cap(cap_usd: f64) -> AdmissionConfig {
        let mut config = AdmissionConfig::default();
        config.tiers.push(TierConfig {
            name: "capped".to_string(),
            mode: EnforcementMode::Block,
            hourly_requests: None,
            daily_requests: None,
            daily_spend_usd: Some(cap_usd),
            monthly_spend_usd: None,
            soft_threshold: 1.0,
            allowed_models: Vec::new(),
            degradation: Vec::new(),
        });
        config
    }

    proptest! {
        /// N requests at cost C against limit L admit exactly
        /// min(N, floor(L / C)), regardless of how many are attempted.
        #[test]
        fn admits_at_most_floor_of_limit_over_cost(
            cap_quarters in 1u32..=40,
            cost_quarters in 1u32..=8,
            attempts in 1usize..=30,
        ) {
            // Quarter-dollar units keep the arithmetic exact in f64.
            let cap = f64::from(cap_quarters) * 0.25;
            let cost = f64::from(cost_quarters) * 0.25;

            let controller = AdmissionController::new(tier_with_daily_cap(cap));
            let caller = CallerId("prop".to_string());

            let mut permitted = 0usize;
            for _ in 0..attempts {
                if let Ok(reservation) =
                    controller.reserve(&caller, Some("capped"), "draft-s", cost)
                {
                    reservation.commit(cost);
                    permitted += 1;
                }
            }

            let floor = (cap / cost).floor() as usize;
            prop_assert_eq!(permitted, attempts.min(floor));
        }
    }
}
