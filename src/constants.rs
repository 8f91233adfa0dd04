// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys read by the controller
pub mod annotations {
    /// Comma separated list of ConfigMap/Secret names a workload depends on
    pub const UPDATE_ON_CHANGE: &str = "configmap.fabric8.io/update-on-change";
    /// Separator between names in [`UPDATE_ON_CHANGE`]
    pub const SEPARATOR: char = ',';
}

/// Naming scheme of the marker injected into pod templates.
///
/// Workload authors rely on these exact values, changing them restarts every
/// dependent workload once and orphans the previous markers.
pub mod marker {
    pub const PREFIX: &str = "FABRIC8_";
    pub const CONFIGMAP_SUFFIX: &str = "_CONFIGMAP";
    pub const SECRET_SUFFIX: &str = "_SECRET";
    /// Kubernetes label values are capped at 63 characters
    pub const MAX_LABEL_VALUE_LEN: usize = 63;
    /// Hex chars of SHA-256 appended to label keys that had to be shortened
    pub const LABEL_KEY_HASH_LEN: usize = 8;
}

/// The component name, used as field manager and in log spans
pub const OPERATOR_NAME: &str = "configmap-controller";

/// Flavor discovery
pub mod openshift {
    pub const APPS_GROUP: &str = "apps.openshift.io";
    pub const DEPLOYMENT_CONFIG_KIND: &str = "DeploymentConfig";
    pub const VERSION: &str = "v1";
}

/// Patch retry defaults
pub mod retry {
    /// First attempt plus two retries
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BASE_DELAY_SECS: u64 = 30;
    pub const MULTIPLIER: u32 = 2;
}

/// Capacity of the channel between the event source and the controller
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
