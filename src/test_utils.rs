// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking the API server and the workload directory.

use async_trait::async_trait;
use http::{Request, Response};
use http_body_util::BodyExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::Client;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

use crate::constants::annotations;
use crate::error::{ControllerError, Result};
use crate::kubernetes::WorkloadDirectory;
use crate::sync::marker::PatchDocument;
use crate::types::{ConfigSource, Workload, WorkloadKind, WorkloadRef};

/// A request seen by [`MockService`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for PUT requests matching the path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    /// Add a response for PATCH requests matching the path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Requests received so far
    pub fn requests(&self) -> Arc<Mutex<Vec<RecordedRequest>>> {
        self.requests.clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /apis/apps/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<
            dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>>
                + Send,
        >,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                content_type,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });

            match response {
                Some((status, body)) => Ok(Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(Body::from(body.into_bytes()))
                    .unwrap()),
                None => {
                    // Default 404 for unmatched requests
                    let body = r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#;
                    Ok(Response::builder()
                        .status(404)
                        .header("content-type", "application/json")
                        .body(Body::from(body.as_bytes().to_vec()))
                        .unwrap())
                }
            }
        })
    }
}

/// A Deployment JSON object with one container named `app`
pub fn deployment_json(name: &str, namespace: &str, depends_on: Option<&str>) -> Value {
    let mut workload_annotations = serde_json::Map::new();
    if let Some(v) = depends_on {
        workload_annotations.insert(annotations::UPDATE_ON_CHANGE.to_string(), json!(v));
    }
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "resourceVersion": "1",
            "annotations": workload_annotations
        },
        "spec": {
            "selector": { "matchLabels": { "app": name } },
            "template": {
                "metadata": { "labels": { "app": name } },
                "spec": { "containers": [{ "name": "app", "image": "nginx" }] }
            }
        }
    })
}

/// A typed Deployment, see [`deployment_json`]
pub fn make_deployment(name: &str, namespace: &str, depends_on: Option<&str>) -> Workload {
    Workload::from(
        serde_json::from_value::<Deployment>(deployment_json(name, namespace, depends_on)).unwrap(),
    )
}

/// A list response wrapping `items`
pub fn list_json(kind: &str, api_version: &str, items: Vec<Value>) -> String {
    json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": { "resourceVersion": "1" },
        "items": items
    })
    .to_string()
}

pub fn make_configmap(
    name: &str,
    namespace: &str,
    version: &str,
    data: &[(&str, &str)],
) -> ConfigSource {
    ConfigSource::from(ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some(version.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        ..Default::default()
    })
}

pub fn make_secret(
    name: &str,
    namespace: &str,
    version: &str,
    data: &[(&str, &str)],
) -> ConfigSource {
    ConfigSource::from(Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some(version.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    })
}

/// Calls recorded by [`FakeDirectory`]
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryCall {
    List(WorkloadKind, Option<String>),
    Get(WorkloadRef),
    Update(WorkloadRef),
    Patch(WorkloadRef, PatchDocument),
}

#[derive(Default)]
struct FakeState {
    workloads: Vec<Workload>,
    calls: Vec<DirectoryCall>,
    failing_lists: Vec<WorkloadKind>,
    write_failures: u32,
}

/// In-memory workload directory; writes land back in the store.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDirectory {
    pub fn new(workloads: Vec<Workload>) -> Self {
        let directory = Self::default();
        directory.state.lock().unwrap().workloads = workloads;
        directory
    }

    /// Make listing `kind` fail
    pub fn fail_list(&self, kind: WorkloadKind) {
        self.state.lock().unwrap().failing_lists.push(kind);
    }

    /// Make the next `n` update/patch calls fail
    pub fn fail_writes(&self, n: u32) {
        self.state.lock().unwrap().write_failures = n;
    }

    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Update and patch calls only
    pub fn writes(&self) -> Vec<DirectoryCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, DirectoryCall::Update(_) | DirectoryCall::Patch(..)))
            .collect()
    }

    pub fn workload(&self, target: &WorkloadRef) -> Option<Workload> {
        self.state
            .lock()
            .unwrap()
            .workloads
            .iter()
            .find(|w| &w.reference() == target)
            .cloned()
    }

    /// Replace a stored workload, e.g. to simulate a concurrent writer
    pub fn put(&self, workload: Workload) {
        let mut state = self.state.lock().unwrap();
        let target = workload.reference();
        state.workloads.retain(|w| w.reference() != target);
        state.workloads.push(workload);
    }

    fn take_write_failure(state: &mut FakeState) -> bool {
        if state.write_failures > 0 {
            state.write_failures -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl WorkloadDirectory for FakeDirectory {
    async fn list(&self, kind: WorkloadKind, namespace: Option<&str>) -> Result<Vec<Workload>> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(DirectoryCall::List(kind, namespace.map(str::to_string)));
        if state.failing_lists.contains(&kind) {
            return Err(ControllerError::KubectlError(format!("listing {} failed", kind)));
        }
        Ok(state
            .workloads
            .iter()
            .filter(|w| w.kind() == kind)
            .filter(|w| namespace.map_or(true, |ns| w.namespace().as_deref() == Some(ns)))
            .cloned()
            .collect())
    }

    async fn get(&self, target: &WorkloadRef) -> Result<Workload> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DirectoryCall::Get(target.clone()));
        state
            .workloads
            .iter()
            .find(|w| &w.reference() == target)
            .cloned()
            .ok_or_else(|| ControllerError::KubectlError(format!("{} not found", target)))
    }

    async fn update(&self, workload: &Workload) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let target = workload.reference();
        state.calls.push(DirectoryCall::Update(target.clone()));
        if Self::take_write_failure(&mut state) {
            return Err(ControllerError::KubectlError("conflict".to_string()));
        }
        state.workloads.retain(|w| w.reference() != target);
        state.workloads.push(workload.clone());
        Ok(())
    }

    async fn patch(&self, target: &WorkloadRef, document: &PatchDocument) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(DirectoryCall::Patch(target.clone(), document.clone()));
        if Self::take_write_failure(&mut state) {
            return Err(ControllerError::KubectlError("server unavailable".to_string()));
        }
        Ok(())
    }
}
