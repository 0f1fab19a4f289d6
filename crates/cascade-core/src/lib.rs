// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Cascade routing engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Cascade workspace: the query/result data
//! model, the model catalog types, and the provider/embedding adapter seams.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{CascadeError, LimitKind, ProviderErrorKind};
pub use types::{
    CallerId, ComplexityLevel, Domain, ModelRole, ModelSpec, ProviderRequest, ProviderResponse,
    ProviderStreamChunk, Query, StreamEventType, TokenUsage,
};

// Re-export adapter traits at crate root.
pub use traits::{cosine_similarity, ChunkStream, EmbeddingAdapter, PluginAdapter, ProviderAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = CascadeError::Config("test".into());
        let _provider = CascadeError::transient("test");
        let _timeout = CascadeError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = CascadeError::Internal("test".into());
    }

    #[test]
    fn trait_objects_are_usable() {
        fn _assert_plugin<T: PluginAdapter>() {}
        fn _assert_provider<T: ProviderAdapter>() {}
        fn _assert_embedding<T: EmbeddingAdapter>() {}
        fn _assert_provider_obj(_: &dyn ProviderAdapter) {}
        fn _assert_embedding_obj(_: &dyn EmbeddingAdapter) {}
    }

    #[test]
    fn domain_serde_round_trip() {
        let json = serde_json::to_string(&Domain::Medical).unwrap();
        assert_eq!(json, "\"medical\"");
        let parsed: Domain = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Domain::Medical);
    }
}
