// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pod-template owning workloads that may depend on configuration objects.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// OpenShift `apps.openshift.io/v1` DeploymentConfig.
///
/// Only the pod template is modelled, every other spec field is carried
/// through `extra` so a full replace does not drop it.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default)]
#[kube(
    group = "apps.openshift.io",
    version = "v1",
    kind = "DeploymentConfig",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
    StatefulSet,
    DeploymentConfig,
}

impl WorkloadKind {
    /// Kinds every cluster serves
    pub const PLAIN: [WorkloadKind; 3] = [
        WorkloadKind::Deployment,
        WorkloadKind::DaemonSet,
        WorkloadKind::StatefulSet,
    ];

    /// Resource name as understood by kubectl
    pub fn resource(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployments",
            WorkloadKind::DaemonSet => "daemonsets",
            WorkloadKind::StatefulSet => "statefulsets",
            WorkloadKind::DeploymentConfig => "deploymentconfigs",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DeploymentConfig => "DeploymentConfig",
        };
        f.write_str(kind)
    }
}

/// Identity of a workload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A workload snapshot
#[derive(Debug, Clone)]
pub enum Workload {
    Deployment(Deployment),
    DaemonSet(DaemonSet),
    StatefulSet(StatefulSet),
    DeploymentConfig(DeploymentConfig),
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Deployment(_) => WorkloadKind::Deployment,
            Workload::DaemonSet(_) => WorkloadKind::DaemonSet,
            Workload::StatefulSet(_) => WorkloadKind::StatefulSet,
            Workload::DeploymentConfig(_) => WorkloadKind::DeploymentConfig,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Workload::Deployment(w) => w.name_any(),
            Workload::DaemonSet(w) => w.name_any(),
            Workload::StatefulSet(w) => w.name_any(),
            Workload::DeploymentConfig(w) => w.name_any(),
        }
    }

    pub fn namespace(&self) -> Option<String> {
        match self {
            Workload::Deployment(w) => w.namespace(),
            Workload::DaemonSet(w) => w.namespace(),
            Workload::StatefulSet(w) => w.namespace(),
            Workload::DeploymentConfig(w) => w.namespace(),
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        let annotations = match self {
            Workload::Deployment(w) => w.annotations(),
            Workload::DaemonSet(w) => w.annotations(),
            Workload::StatefulSet(w) => w.annotations(),
            Workload::DeploymentConfig(w) => w.annotations(),
        };
        annotations.get(key).map(String::as_str)
    }

    pub fn reference(&self) -> WorkloadRef {
        WorkloadRef {
            kind: self.kind(),
            namespace: self.namespace().unwrap_or_default(),
            name: self.name(),
        }
    }

    pub fn pod_template(&self) -> Option<&PodTemplateSpec> {
        match self {
            Workload::Deployment(w) => w.spec.as_ref().map(|s| &s.template),
            Workload::DaemonSet(w) => w.spec.as_ref().map(|s| &s.template),
            Workload::StatefulSet(w) => w.spec.as_ref().map(|s| &s.template),
            Workload::DeploymentConfig(w) => w.spec.template.as_ref(),
        }
    }

    pub fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        match self {
            Workload::Deployment(w) => w.spec.as_mut().map(|s| &mut s.template),
            Workload::DaemonSet(w) => w.spec.as_mut().map(|s| &mut s.template),
            Workload::StatefulSet(w) => w.spec.as_mut().map(|s| &mut s.template),
            Workload::DeploymentConfig(w) => w.spec.template.as_mut(),
        }
    }

    /// Names of the containers in the pod template, in order
    pub fn container_names(&self) -> Vec<String> {
        self.pod_template()
            .and_then(|t| t.spec.as_ref())
            .map(|s| s.containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }
}

impl From<Deployment> for Workload {
    fn from(w: Deployment) -> Self {
        Workload::Deployment(w)
    }
}

impl From<DaemonSet> for Workload {
    fn from(w: DaemonSet) -> Self {
        Workload::DaemonSet(w)
    }
}

impl From<StatefulSet> for Workload {
    fn from(w: StatefulSet) -> Self {
        Workload::StatefulSet(w)
    }
}

impl From<DeploymentConfig> for Workload {
    fn from(w: DeploymentConfig) -> Self {
        Workload::DeploymentConfig(w)
    }
}
