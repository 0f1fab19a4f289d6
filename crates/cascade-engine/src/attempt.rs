// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request cascade state machine.
//!
//! One [`CascadeAttempt`] is created per incoming query, mutated as the
//! orchestrator advances through the stages, and discarded once the final
//! result is produced. Draft rejection is a normal transition here, never
//! an error.

use strum::Display;
use tracing::debug;

use cascade_core::{ComplexityLevel, Domain};

/// Stages of one cascade attempt.
///
/// `Failed` is absorbing and reachable from any stage on an unrecoverable
/// provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CascadeStage {
    Start,
    Classified,
    Routed,
    DirectDone,
    Drafting,
    Validating,
    Accepted,
    Escalating,
    Verifying,
    Done,
    Failed,
}

impl CascadeStage {
    /// Whether `next` is a legal successor of this stage.
    pub fn can_transition_to(self, next: CascadeStage) -> bool {
        use CascadeStage::*;
        if next == Failed {
            return self != Done && self != Failed;
        }
        matches!(
            (self, next),
            (Start, Classified)
                | (Classified, Routed)
                | (Routed, DirectDone)
                | (Routed, Drafting)
                | (DirectDone, Done)
                | (Drafting, Validating)
                | (Drafting, Escalating)
                | (Validating, Accepted)
                | (Validating, Escalating)
                | (Accepted, Done)
                | (Escalating, Verifying)
                | (Verifying, Done)
        )
    }
}

/// How the orchestrator decided to serve a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RoutingStrategy {
    /// Trivial/simple query straight to the cheapest eligible model.
    DirectCheapest,
    /// Hard/expert query straight to the strongest eligible model.
    DirectStrongest,
    /// Draft with a cheap model, validate, escalate only when needed.
    Cascade,
}

/// Mutable per-request record of a cascade in progress.
#[derive(Debug)]
pub struct CascadeAttempt {
    pub stage: CascadeStage,
    pub complexity: Option<ComplexityLevel>,
    pub domain: Option<Domain>,
    pub strategy: Option<RoutingStrategy>,
    pub draft_model: Option<String>,
    pub confidence: Option<f32>,
    pub alignment: Option<f32>,
    pub verifier_model: Option<String>,
}

impl CascadeAttempt {
    pub fn new() -> Self {
        Self {
            stage: CascadeStage::Start,
            complexity: None,
            domain: None,
            strategy: None,
            draft_model: None,
            confidence: None,
            alignment: None,
            verifier_model: None,
        }
    }

    /// Advance to the next stage.
    ///
    /// Transitions are fixed at compile time by the orchestrator's control
    /// flow; the debug assertion catches a refactor that breaks the machine.
    pub fn advance(&mut self, next: CascadeStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal cascade transition {} -> {next}",
            self.stage
        );
        debug!(from = %self.stage, to = %next, "cascade stage");
        self.stage = next;
    }
}

impl Default for CascadeAttempt {
    fn default() -> Self {
        Self::new()
    }
}
