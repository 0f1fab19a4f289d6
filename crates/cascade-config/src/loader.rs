// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./cascade.toml` > `~/.config/cascade/cascade.toml`
//! > `/etc/cascade/cascade.toml` with environment variable overrides via the
//! `CASCADE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CascadeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/cascade/cascade.toml` (system-wide)
/// 3. `~/.config/cascade/cascade.toml` (user XDG config)
/// 4. `./cascade.toml` (local directory)
/// 5. `CASCADE_*` environment variables
pub fn load_config() -> Result<CascadeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<CascadeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CascadeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CascadeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CascadeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CascadeConfig::default()))
        .merge(Toml::file("/etc/cascade/cascade.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("cascade/cascade.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("cascade.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CASCADE_SCORING_ALIGNMENT_CAP` must map
/// to `scoring.alignment_cap`, not `scoring.alignment.cap`.
fn env_provider() -> Env {
    Env::prefixed("CASCADE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("classify_", "classify.", 1)
            .replacen("scoring_", "scoring.", 1)
            .replacen("admission_", "admission.", 1);
        mapped.into()
    })
}
