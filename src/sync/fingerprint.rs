// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deterministic content tokens for configuration data.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use clap::ValueEnum;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// How the canonical `key=value;...` text is turned into a token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FingerprintMode {
    /// SHA-256 of the canonical text, URL-safe base64 encoded
    #[default]
    Compact,
    /// The canonical text itself, readable but unbounded and leaks values
    Diagnostic,
}

/// Compute the fingerprint of `data`.
///
/// Entries are rendered as `key=value`, sorted, and joined with `;`, so the
/// result never depends on map iteration order.
pub fn fingerprint(data: &BTreeMap<String, String>, mode: FingerprintMode) -> String {
    let text = canonical_text(data);
    match mode {
        FingerprintMode::Diagnostic => text,
        FingerprintMode::Compact => URL_SAFE.encode(Sha256::digest(text.as_bytes())),
    }
}

fn canonical_text(data: &BTreeMap<String, String>) -> String {
    let mut entries: Vec<String> = data.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    entries.sort();
    entries.join(";")
}
