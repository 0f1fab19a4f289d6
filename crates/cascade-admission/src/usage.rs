// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage reporting and export.
//!
//! Snapshots the live sliding-window counters per caller and serializes
//! them as CSV or JSON. Storage is the caller's concern; this module only
//! produces bytes.

use std::time::Instant;

use serde::Serialize;

use cascade_core::{CallerId, CascadeError};

use crate::controller::AdmissionController;

/// Point-in-time usage for one caller.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub caller: String,
    pub tier: String,
    pub hourly_requests: usize,
    pub daily_requests: usize,
    pub daily_spend_usd: f64,
    pub monthly_spend_usd: f64,
}

/// Supported usage export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl AdmissionController {
    /// Snapshot the current usage of one caller, if any is recorded.
    pub fn usage_snapshot(&self, caller: &CallerId) -> Option<UsageSnapshot> {
        let state_arc = self.callers.get(caller).map(|s| std::sync::Arc::clone(&s))?;
        let mut state = state_arc
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        Some(UsageSnapshot {
            caller: caller.0.clone(),
            tier: state.tier.clone(),
            hourly_requests: state.hourly.count(now),
            daily_requests: state.daily.count(now),
            daily_spend_usd: state.daily_spend.total(now),
            monthly_spend_usd: state.monthly_spend.total(now),
        })
    }

    /// Export usage of all known callers, sorted by caller name.
    pub fn export_usage(&self, format: ExportFormat) -> Result<Vec<u8>, CascadeError> {
        // Collect keys first so no shard lock is held while snapshotting.
        let keys: Vec<CallerId> = self.callers.iter().map(|e| e.key().clone()).collect();
        let mut snapshots: Vec<UsageSnapshot> = keys
            .iter()
            .filter_map(|key| self.usage_snapshot(key))
            .collect();
        snapshots.sort_by(|a, b| a.caller.cmp(&b.caller));

        match format {
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                for snapshot in &snapshots {
                    writer
                        .serialize(snapshot)
                        .map_err(|e| CascadeError::Internal(format!("csv export: {e}")))?;
                }
                writer
                    .into_inner()
                    .map_err(|e| CascadeError::Internal(format!("csv export: {e}")))
            }
            ExportFormat::Json => serde_json::to_vec_pretty(&snapshots)
                .map_err(|e| CascadeError::Internal(format!("json export: {e}"))),
        }
    }
}
