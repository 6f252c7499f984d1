// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./pkgrelay.toml` > `~/.config/pkgrelay/pkgrelay.toml` >
//! `/etc/pkgrelay/pkgrelay.toml`, with `PKGRELAY_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PkgrelayConfig;

/// Top-level sections that environment variables may address.
const SECTIONS: &[&str] = &[
    "service",
    "storage",
    "blob",
    "queue",
    "forward",
    "packing",
    "gateway",
    "prometheus",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pkgrelay/pkgrelay.toml`
/// 3. `~/.config/pkgrelay/pkgrelay.toml`
/// 4. `./pkgrelay.toml`
/// 5. `PKGRELAY_*` environment variables
pub fn load_config() -> Result<PkgrelayConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<PkgrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PkgrelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PkgrelayConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading configuration file");
    Figment::new()
        .merge(Serialized::defaults(PkgrelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PkgrelayConfig::default()))
        .merge(Toml::file("/etc/pkgrelay/pkgrelay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("pkgrelay/pkgrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("pkgrelay.toml"))
        .merge(env_provider())
}

/// Map `PKGRELAY_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the leading section prefix is split, so keys that themselves contain
/// underscores or another section's name (`PKGRELAY_FORWARD_QUEUE_NAME`)
/// keep their shape.
fn env_provider() -> Env {
    Env::prefixed("PKGRELAY_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let lower = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = lower
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    lower
}
