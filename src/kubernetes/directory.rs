// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Workload enumeration and mutation against the API server.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{ListParams, Patch, PatchParams, PostParams},
    Api, Client, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, instrument};

use crate::constants::OPERATOR_NAME;
use crate::error::{ControllerError, Result};
use crate::sync::marker::{PatchDocument, PatchType};
use crate::types::{DeploymentConfig, Workload, WorkloadKind, WorkloadRef};

/// Read and write access to workloads.
///
/// Implementations must be cheap to share between concurrent tasks.
#[async_trait]
pub trait WorkloadDirectory: Send + Sync {
    /// List workloads of `kind` in `namespace`, or in all namespaces for `None`
    async fn list(&self, kind: WorkloadKind, namespace: Option<&str>) -> Result<Vec<Workload>>;

    /// Fetch the current version of a workload
    async fn get(&self, target: &WorkloadRef) -> Result<Workload>;

    /// Replace a workload; the embedded resourceVersion guards against conflicts
    async fn update(&self, workload: &Workload) -> Result<()>;

    /// Patch a workload without fetching it first
    async fn patch(&self, target: &WorkloadRef, document: &PatchDocument) -> Result<()>;
}

/// Directory backed by the typed kube client
#[derive(Clone)]
pub struct ApiDirectory {
    client: Client,
}

impl ApiDirectory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

trait NamespacedWorkload:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
}

impl<K> NamespacedWorkload for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static
{
}

async fn list_typed<K: NamespacedWorkload>(
    client: &Client,
    namespace: Option<&str>,
) -> Result<Vec<K>> {
    let api: Api<K> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    Ok(api.list(&ListParams::default()).await?.items)
}

async fn get_typed<K: NamespacedWorkload>(client: &Client, target: &WorkloadRef) -> Result<K> {
    let api: Api<K> = Api::namespaced(client.clone(), &target.namespace);
    Ok(api.get(&target.name).await?)
}

async fn replace_typed<K: NamespacedWorkload>(
    client: &Client,
    namespace: &str,
    name: &str,
    obj: &K,
) -> Result<()> {
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let pp = PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    };
    api.replace(name, &pp, obj).await?;
    Ok(())
}

async fn patch_typed<K: NamespacedWorkload>(
    client: &Client,
    target: &WorkloadRef,
    document: &PatchDocument,
) -> Result<()> {
    let api: Api<K> = Api::namespaced(client.clone(), &target.namespace);
    let patch = match document.patch_type {
        PatchType::Strategic => Patch::Strategic(&document.body),
        PatchType::Merge => Patch::Merge(&document.body),
    };
    let pp = PatchParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    };
    api.patch(&target.name, &pp, &patch).await?;
    Ok(())
}

#[async_trait]
impl WorkloadDirectory for ApiDirectory {
    #[instrument(skip(self))]
    async fn list(&self, kind: WorkloadKind, namespace: Option<&str>) -> Result<Vec<Workload>> {
        let client = &self.client;
        let workloads: Vec<Workload> = match kind {
            WorkloadKind::Deployment => list_typed::<Deployment>(client, namespace)
                .await?
                .into_iter()
                .map(Workload::from)
                .collect(),
            WorkloadKind::DaemonSet => list_typed::<DaemonSet>(client, namespace)
                .await?
                .into_iter()
                .map(Workload::from)
                .collect(),
            WorkloadKind::StatefulSet => list_typed::<StatefulSet>(client, namespace)
                .await?
                .into_iter()
                .map(Workload::from)
                .collect(),
            WorkloadKind::DeploymentConfig => list_typed::<DeploymentConfig>(client, namespace)
                .await?
                .into_iter()
                .map(Workload::from)
                .collect(),
        };
        debug!("Found {} {} items", workloads.len(), kind);
        Ok(workloads)
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn get(&self, target: &WorkloadRef) -> Result<Workload> {
        let client = &self.client;
        Ok(match target.kind {
            WorkloadKind::Deployment => get_typed::<Deployment>(client, target).await?.into(),
            WorkloadKind::DaemonSet => get_typed::<DaemonSet>(client, target).await?.into(),
            WorkloadKind::StatefulSet => get_typed::<StatefulSet>(client, target).await?.into(),
            WorkloadKind::DeploymentConfig => {
                get_typed::<DeploymentConfig>(client, target).await?.into()
            }
        })
    }

    #[instrument(skip(self, workload), fields(target = %workload.reference()))]
    async fn update(&self, workload: &Workload) -> Result<()> {
        let name = workload.name();
        let namespace = workload
            .namespace()
            .ok_or_else(|| ControllerError::MissingNamespace(workload.reference().to_string()))?;
        let client = &self.client;
        match workload {
            Workload::Deployment(w) => replace_typed(client, &namespace, &name, w).await,
            Workload::DaemonSet(w) => replace_typed(client, &namespace, &name, w).await,
            Workload::StatefulSet(w) => replace_typed(client, &namespace, &name, w).await,
            Workload::DeploymentConfig(w) => replace_typed(client, &namespace, &name, w).await,
        }
    }

    #[instrument(skip(self, document), fields(target = %target))]
    async fn patch(&self, target: &WorkloadRef, document: &PatchDocument) -> Result<()> {
        let client = &self.client;
        match target.kind {
            WorkloadKind::Deployment => patch_typed::<Deployment>(client, target, document).await,
            WorkloadKind::DaemonSet => patch_typed::<DaemonSet>(client, target, document).await,
            WorkloadKind::StatefulSet => patch_typed::<StatefulSet>(client, target, document).await,
            WorkloadKind::DeploymentConfig => {
                patch_typed::<DeploymentConfig>(client, target, document).await
            }
        }
    }
}
