// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock embedding adapter for deterministic semantic-pass testing.
//!
//! Texts grouped into a cluster share an identical vector and therefore
//! score a perfect similarity against each other. Any other text gets a
//! deterministic pseudo-random vector derived from its hash, so unrelated
//! phrases land near the 0.5 "no signal" midpoint.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use cascade_core::traits::{EmbeddingAdapter, PluginAdapter};
use cascade_core::types::{AdapterType, HealthStatus};
use cascade_core::CascadeError;

/// Embedding dimension for all mock vectors.
const DIM: usize = 16;

/// A mock embedder with clusterable, hash-derived vectors.
pub struct MockEmbedder {
    fixed: HashMap<String, Vec<f32>>,
}

impl MockEmbedder {
    /// Create an embedder where every text gets a hash-derived vector.
    pub fn new() -> Self {
        Self {
            fixed: HashMap::new(),
        }
    }

    /// Assign `center` and all `members` the same vector, making them
    /// mutually similar at score 1.0.
    pub fn with_cluster(mut self, center: &str, members: &[&str]) -> Self {
        let vector = hash_vector(center);
        self.fixed.insert(center.to_string(), vector.clone());
        for member in members {
            self.fixed.insert(member.to_string(), vector.clone());
        }
        self
    }

    /// Pin an explicit vector for a text.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.to_string(), vector);
        self
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic pseudo-random unit-range vector derived from the text hash.
fn hash_vector(text: &str) -> Vec<f32> {
    (0..DIM)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let raw = hasher.finish();
            // Map the hash into [-1.0, 1.0].
            (raw as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
        })
        .collect()
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, CascadeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CascadeError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CascadeError> {
        Ok(self
            .fixed
            .get(text)
            .cloned()
            .unwrap_or_else(|| hash_vector(text)))
    }
}
