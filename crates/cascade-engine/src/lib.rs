// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quality-gated cascade orchestration.
//!
//! Ties the classification, scoring, and admission crates together into one
//! decision engine: classify each query, route it (direct-cheapest,
//! direct-strongest, or draft/verify cascade), gate every model call through
//! admission control, and escalate only when a draft fails its quality bar.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use cascade_engine::CascadeEngine;
//! # use cascade_config::CascadeConfig;
//! # use cascade_core::{ModelRole, ModelSpec, Query};
//! # async fn example(provider: Arc<dyn cascade_core::traits::ProviderAdapter>) -> Result<(), cascade_core::CascadeError> {
//! let models = vec![
//!     ModelSpec {
//!         name: "draft-s".into(),
//!         role: ModelRole::Draft,
//!         input_cost_per_mtok: 0.8,
//!         output_cost_per_mtok: 4.0,
//!         specializations: vec![],
//!         supports_tools: false,
//!     },
//!     ModelSpec {
//!         name: "verifier-xl".into(),
//!         role: ModelRole::Verifier,
//!         input_cost_per_mtok: 15.0,
//!         output_cost_per_mtok: 75.0,
//!         specializations: vec![],
//!         supports_tools: true,
//!     },
//! ];
//! let engine = CascadeEngine::new(CascadeConfig::default(), models, provider)?;
//! let result = engine.run(Query::new("Summarize this article")).await?;
//! println!("{} via {} (saved {:.0}%)", result.content, result.model_used, result.savings_percent);
//! # Ok(())
//! # }
//! ```

pub mod attempt;
pub mod engine;
pub mod result;

pub use attempt::{CascadeAttempt, CascadeStage, RoutingStrategy};
pub use engine::CascadeEngine;
pub use result::{BatchResult, BatchStrategy, CascadeResult, StageLatencies};

pub use cascade_admission::ExportFormat;
