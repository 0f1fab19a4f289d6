// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM provider integrations.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::CascadeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse, ProviderStreamChunk};

/// Boxed stream of provider chunks.
pub type ChunkStream =
    Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, CascadeError>> + Send>>;

/// Adapter for LLM provider integrations.
///
/// The engine treats providers as a uniform invocation contract; transport
/// details (HTTP clients, SSE parsing, authentication) live behind this
/// trait. Failures must be reported as `CascadeError::Provider` with the
/// correct transient/permanent kind so the orchestrator's retry policy works.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, CascadeError>;

    /// Sends a completion request and returns a stream of response chunks.
    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, CascadeError>;
}
