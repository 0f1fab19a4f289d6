// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test utilities for the Cascade workspace.
//!
//! Mock adapters implementing the core provider and embedding traits, so
//! engine and classifier tests run deterministically without network access.

pub mod mock_embedder;
pub mod mock_provider;

pub use mock_embedder::MockEmbedder;
pub use mock_provider::{MockProvider, MockReply};
