// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Workload directory backed by the `kubectl` (or `oc`) command line tool.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{ControllerError, Result};
use crate::kubernetes::directory::WorkloadDirectory;
use crate::sync::marker::PatchDocument;
use crate::types::{DeploymentConfig, Workload, WorkloadKind, WorkloadRef};

#[derive(Deserialize)]
struct ItemList<K> {
    #[serde(default = "Vec::new")]
    items: Vec<K>,
}

/// Directory that shells out to kubectl and parses its JSON output
#[derive(Debug, Clone)]
pub struct KubectlDirectory {
    binary: String,
}

impl KubectlDirectory {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[String], stdin: Option<Vec<u8>>) -> Result<Vec<u8>> {
        debug!("Running {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(&input).await?;
            // Close stdin so the command sees EOF
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ControllerError::KubectlError(format!(
                "{} exited with {}: {}",
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

pub(crate) fn list_args(kind: WorkloadKind, namespace: Option<&str>) -> Vec<String> {
    let mut args = vec!["get".to_string(), kind.resource().to_string()];
    match namespace {
        Some(ns) => args.extend(["-n".to_string(), ns.to_string()]),
        None => args.push("--all-namespaces".to_string()),
    }
    args.extend(["-o".to_string(), "json".to_string()]);
    args
}

pub(crate) fn get_args(target: &WorkloadRef) -> Vec<String> {
    vec![
        "get".to_string(),
        target.kind.resource().to_string(),
        target.name.clone(),
        "-n".to_string(),
        target.namespace.clone(),
        "-o".to_string(),
        "json".to_string(),
    ]
}

pub(crate) fn patch_args(target: &WorkloadRef, document: &PatchDocument) -> Vec<String> {
    vec![
        "patch".to_string(),
        target.kind.resource().to_string(),
        target.name.clone(),
        "-n".to_string(),
        target.namespace.clone(),
        "--type".to_string(),
        document.patch_type.as_kubectl_arg().to_string(),
        "-p".to_string(),
        document.body.to_string(),
    ]
}

fn parse_items<K: DeserializeOwned + Into<Workload>>(output: &[u8]) -> Result<Vec<Workload>> {
    let list: ItemList<K> = serde_json::from_slice(output)?;
    Ok(list.items.into_iter().map(Into::into).collect())
}

/// Parse the output of `kubectl get <kind> -o json`
pub(crate) fn parse_list(kind: WorkloadKind, output: &[u8]) -> Result<Vec<Workload>> {
    match kind {
        WorkloadKind::Deployment => parse_items::<Deployment>(output),
        WorkloadKind::DaemonSet => parse_items::<DaemonSet>(output),
        WorkloadKind::StatefulSet => parse_items::<StatefulSet>(output),
        WorkloadKind::DeploymentConfig => parse_items::<DeploymentConfig>(output),
    }
}

fn parse_object(kind: WorkloadKind, output: &[u8]) -> Result<Workload> {
    Ok(match kind {
        WorkloadKind::Deployment => serde_json::from_slice::<Deployment>(output)?.into(),
        WorkloadKind::DaemonSet => serde_json::from_slice::<DaemonSet>(output)?.into(),
        WorkloadKind::StatefulSet => serde_json::from_slice::<StatefulSet>(output)?.into(),
        WorkloadKind::DeploymentConfig => {
            serde_json::from_slice::<DeploymentConfig>(output)?.into()
        }
    })
}

fn to_json(workload: &Workload) -> Result<Vec<u8>> {
    Ok(match workload {
        Workload::Deployment(w) => serde_json::to_vec(w)?,
        Workload::DaemonSet(w) => serde_json::to_vec(w)?,
        Workload::StatefulSet(w) => serde_json::to_vec(w)?,
        Workload::DeploymentConfig(w) => serde_json::to_vec(w)?,
    })
}

#[async_trait]
impl WorkloadDirectory for KubectlDirectory {
    #[instrument(skip(self))]
    async fn list(&self, kind: WorkloadKind, namespace: Option<&str>) -> Result<Vec<Workload>> {
        let output = self.run(&list_args(kind, namespace), None).await?;
        let workloads = parse_list(kind, &output)?;
        debug!("Found {} {} items", workloads.len(), kind);
        Ok(workloads)
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn get(&self, target: &WorkloadRef) -> Result<Workload> {
        let output = self.run(&get_args(target), None).await?;
        parse_object(target.kind, &output)
    }

    #[instrument(skip(self, workload), fields(target = %workload.reference()))]
    async fn update(&self, workload: &Workload) -> Result<()> {
        let reference = workload.reference();
        if workload.namespace().is_none() {
            return Err(ControllerError::MissingNamespace(reference.to_string()));
        }
        let args = vec![
            "replace".to_string(),
            "-n".to_string(),
            reference.namespace.clone(),
            "-f".to_string(),
            "-".to_string(),
        ];
        self.run(&args, Some(to_json(workload)?)).await?;
        Ok(())
    }

    #[instrument(skip(self, document), fields(target = %target))]
    async fn patch(&self, target: &WorkloadRef, document: &PatchDocument) -> Result<()> {
        self.run(&patch_args(target, document), None).await?;
        Ok(())
    }
}
