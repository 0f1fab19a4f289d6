// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Answer quality scoring for the Cascade routing engine.
//!
//! Two layers: [`AlignmentScorer`] measures whether an answer actually
//! addresses its query (shape detectors + keyword overlap), and
//! [`ConfidenceScorer`] folds alignment together with log-probability and
//! structural signals into the single confidence number the orchestrator
//! compares against its acceptance threshold.

pub mod alignment;
pub mod confidence;

pub use alignment::{salient_terms, AlignmentKind, AlignmentOutcome, AlignmentScorer};
pub use confidence::{ConfidenceReport, ConfidenceScorer};
