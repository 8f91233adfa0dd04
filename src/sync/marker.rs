// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Marker derivation and synchronization on pod templates.
//!
//! A marker is an env var (one per container) or a pod template label whose
//! value is the fingerprint of a configuration object. Changing it changes the
//! pod template, which makes the workload controller roll the pods.

use clap::ValueEnum;
use k8s_openapi::api::core::v1::{Container, EnvVar, PodTemplateSpec};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::constants::marker::{LABEL_KEY_HASH_LEN, MAX_LABEL_VALUE_LEN, PREFIX};
use crate::types::{ConfigSource, SourceKind, Workload};

/// Convert text into a usable env var name.
///
/// Upper cases ASCII letters and collapses every run of other characters into
/// a single `_`, never at the start or the end.
pub fn env_var_name(text: &str) -> String {
    let mut name = String::with_capacity(text.len());
    let mut pending_separator = false;
    for ch in text.chars() {
        let ch = ch.to_ascii_uppercase();
        if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
            if pending_separator && !name.is_empty() {
                name.push('_');
            }
            pending_separator = false;
            name.push(ch);
        } else {
            pending_separator = true;
        }
    }
    name
}

/// Marker key for a configuration object of `kind` named `name`
pub fn marker_key_for(kind: SourceKind, name: &str) -> String {
    format!("{}{}{}", PREFIX, env_var_name(name), kind.marker_suffix())
}

/// Marker key for a configuration object, e.g. `FABRIC8_APP_CONFIG_CONFIGMAP`
pub fn marker_key(source: &ConfigSource) -> String {
    marker_key_for(source.kind(), &source.name())
}

/// Set env var `key` to `value` in every container.
///
/// The first env var named `key` is authoritative. Returns whether any
/// container was modified.
pub fn sync_env(containers: &mut [Container], key: &str, value: &str) -> bool {
    let mut changed = false;
    for container in containers.iter_mut() {
        let envs = container.env.get_or_insert_with(Vec::new);
        match envs.iter_mut().find(|e| e.name == key) {
            Some(env) if env.value.as_deref() == Some(value) && env.value_from.is_none() => {}
            Some(env) => {
                debug!(container = %container.name, "Updating {} to {}", key, value);
                env.value = Some(value.to_string());
                env.value_from = None;
                changed = true;
            }
            None => {
                debug!(container = %container.name, "Adding {}={}", key, value);
                envs.push(EnvVar {
                    name: key.to_string(),
                    value: Some(value.to_string()),
                    value_from: None,
                });
                changed = true;
            }
        }
    }
    changed
}

/// Set label `key` to `value` on the pod template. Returns whether it changed.
///
/// `key` is passed through [`label_key`] first.
pub fn sync_label(template: &mut PodTemplateSpec, key: &str, value: &str) -> bool {
    let key = label_key(key);
    let labels = template
        .metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(Default::default);
    if labels.get(&key).map(String::as_str) == Some(value) {
        return false;
    }
    debug!("Setting template label {}={}", key, value);
    labels.insert(key, value.to_string());
    true
}

/// Render a marker key as a valid label key.
///
/// Keys that fit pass through. Longer keys keep a readable prefix and end in
/// the first 8 hex chars of their SHA-256, so distinct keys stay distinct.
pub fn label_key(key: &str) -> String {
    if !key.is_empty() && is_valid_label_value(key) {
        return key.to_string();
    }
    let mut hash = sha256_hex(key);
    hash.truncate(LABEL_KEY_HASH_LEN);

    let keep = MAX_LABEL_VALUE_LEN - LABEL_KEY_HASH_LEN - 1;
    let prefix: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(keep)
        .collect();
    let prefix = prefix.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if prefix.is_empty() {
        hash
    } else {
        format!("{}_{}", prefix, hash)
    }
}

fn sha256_hex(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Render a fingerprint as a valid label value.
///
/// Tokens that already are valid label values pass through, anything else is
/// replaced by a truncated hex SHA-256 of the token.
pub fn label_value(token: &str) -> String {
    if is_valid_label_value(token) {
        return token.to_string();
    }
    let mut hex = sha256_hex(token);
    hex.truncate(MAX_LABEL_VALUE_LEN);
    hex
}

fn is_valid_label_value(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    let bytes = value.as_bytes();
    value.len() <= MAX_LABEL_VALUE_LEN
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Patch flavors understood by the API server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchType {
    /// Lists merged by their key field, e.g. containers and env by name
    Strategic,
    /// RFC 7386 JSON merge patch
    Merge,
}

impl PatchType {
    /// Value for `kubectl patch --type`
    pub fn as_kubectl_arg(&self) -> &'static str {
        match self {
            PatchType::Strategic => "strategic",
            PatchType::Merge => "merge",
        }
    }
}

/// A minimal patch touching only the marker
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDocument {
    pub patch_type: PatchType,
    pub body: Value,
}

/// Where the marker lives on the pod template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MarkerStrategy {
    /// One env var per container
    #[default]
    Env,
    /// One pod template label per dependency
    Label,
}

impl MarkerStrategy {
    /// The value stored in the marker for a fingerprint
    pub fn marker_value(&self, token: &str) -> String {
        match self {
            MarkerStrategy::Env => token.to_string(),
            MarkerStrategy::Label => label_value(token),
        }
    }

    /// Synchronize the marker in place. Returns whether the workload changed.
    pub fn apply(&self, workload: &mut Workload, key: &str, token: &str) -> bool {
        let value = self.marker_value(token);
        let Some(template) = workload.pod_template_mut() else {
            return false;
        };
        match self {
            MarkerStrategy::Env => template
                .spec
                .as_mut()
                .is_some_and(|spec| sync_env(&mut spec.containers, key, &value)),
            MarkerStrategy::Label => sync_label(template, key, &value),
        }
    }

    /// Patch document setting the marker without touching anything else
    pub fn patch_document(&self, workload: &Workload, key: &str, token: &str) -> PatchDocument {
        let value = self.marker_value(token);
        match self {
            MarkerStrategy::Env => {
                let containers: Vec<Value> = workload
                    .container_names()
                    .into_iter()
                    .map(|name| {
                        json!({
                            "name": name,
                            "env": [{ "name": key, "value": value, "valueFrom": null }]
                        })
                    })
                    .collect();
                PatchDocument {
                    patch_type: PatchType::Strategic,
                    body: json!({
                        "spec": { "template": { "spec": { "containers": containers } } }
                    }),
                }
            }
            MarkerStrategy::Label => {
                let label = label_key(key);
                PatchDocument {
                    patch_type: PatchType::Merge,
                    body: json!({
                        "spec": { "template": { "metadata": { "labels": { label: value } } } }
                    }),
                }
            }
        }
    }
}
