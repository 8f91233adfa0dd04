// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Orchestrator flavor detection, run once at startup.

use crate::constants::openshift::{APPS_GROUP, DEPLOYMENT_CONFIG_KIND, VERSION};
use crate::error::Result;
use crate::types::WorkloadKind;
use kube::{discovery::Discovery, Client};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Kubernetes,
    /// Serves `apps.openshift.io/v1` DeploymentConfigs
    OpenShift,
}

impl Flavor {
    /// Workload kinds that can be targeted on this flavor
    pub fn workload_kinds(&self) -> Vec<WorkloadKind> {
        let mut kinds = WorkloadKind::PLAIN.to_vec();
        if *self == Flavor::OpenShift {
            kinds.push(WorkloadKind::DeploymentConfig);
        }
        kinds
    }
}

/// Detect the flavor by discovering the DeploymentConfig resource.
pub async fn detect_flavor(client: &Client) -> Result<Flavor> {
    let flavor = if deployment_configs_served(client).await? {
        Flavor::OpenShift
    } else {
        Flavor::Kubernetes
    };
    info!("Detected orchestrator flavor: {:?}", flavor);
    Ok(flavor)
}

async fn deployment_configs_served(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[APPS_GROUP])
        .run()
        .await?;

    for group in discovery.groups() {
        if group.name() == APPS_GROUP {
            for (ar, _) in group.recommended_resources() {
                if ar.kind == DEPLOYMENT_CONFIG_KIND && ar.version == VERSION {
                    return Ok(true);
                }
            }
        }
    }

    Ok(false)
}
