// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Configuration objects observed by the controller.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::marker;

/// The kind of a configuration object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    ConfigMap,
    Secret,
}

impl SourceKind {
    /// Upper case label encoded into the marker key
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::ConfigMap => "CONFIGMAP",
            SourceKind::Secret => "SECRET",
        }
    }

    pub fn marker_suffix(&self) -> &'static str {
        match self {
            SourceKind::ConfigMap => marker::CONFIGMAP_SUFFIX,
            SourceKind::Secret => marker::SECRET_SUFFIX,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::ConfigMap => write!(f, "ConfigMap"),
            SourceKind::Secret => write!(f, "Secret"),
        }
    }
}

/// Identity of a configuration object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    pub kind: SourceKind,
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A ConfigMap or Secret snapshot, as delivered by the watch
#[derive(Debug, Clone)]
pub enum ConfigSource {
    ConfigMap(ConfigMap),
    Secret(Secret),
}

impl ConfigSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ConfigSource::ConfigMap(_) => SourceKind::ConfigMap,
            ConfigSource::Secret(_) => SourceKind::Secret,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        self.kind().label()
    }

    pub fn name(&self) -> String {
        match self {
            ConfigSource::ConfigMap(cm) => cm.name_any(),
            ConfigSource::Secret(s) => s.name_any(),
        }
    }

    pub fn namespace(&self) -> Option<String> {
        match self {
            ConfigSource::ConfigMap(cm) => cm.namespace(),
            ConfigSource::Secret(s) => s.namespace(),
        }
    }

    /// Opaque version token assigned by the API server
    pub fn resource_version(&self) -> Option<String> {
        match self {
            ConfigSource::ConfigMap(cm) => cm.resource_version(),
            ConfigSource::Secret(s) => s.resource_version(),
        }
    }

    pub fn key(&self) -> SourceKey {
        SourceKey {
            kind: self.kind(),
            namespace: self.namespace().unwrap_or_default(),
            name: self.name(),
        }
    }

    /// Key/value content of the object.
    ///
    /// Binary values (ConfigMap `binaryData`, every Secret value) are rendered
    /// as standard base64, which is also their wire form.
    pub fn data(&self) -> BTreeMap<String, String> {
        match self {
            ConfigSource::ConfigMap(cm) => {
                let mut data = cm.data.clone().unwrap_or_default();
                if let Some(binary) = &cm.binary_data {
                    for (k, v) in binary {
                        data.insert(k.clone(), STANDARD.encode(&v.0));
                    }
                }
                data
            }
            ConfigSource::Secret(s) => s
                .data
                .as_ref()
                .map(|d| {
                    d.iter()
                        .map(|(k, v)| (k.clone(), STANDARD.encode(&v.0)))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

impl From<ConfigMap> for ConfigSource {
    fn from(cm: ConfigMap) -> Self {
        ConfigSource::ConfigMap(cm)
    }
}

impl From<Secret> for ConfigSource {
    fn from(s: Secret) -> Self {
        ConfigSource::Secret(s)
    }
}

/// A normalized watch notification
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// First observation of an object
    Added(ConfigSource),
    /// A later observation; `previous == current` on resync
    Updated {
        previous: ConfigSource,
        current: ConfigSource,
    },
}

impl SourceEvent {
    pub fn current(&self) -> &ConfigSource {
        match self {
            SourceEvent::Added(current) => current,
            SourceEvent::Updated { current, .. } => current,
        }
    }
}
