// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turns configuration change events into marker updates on dependent workloads.

use clap::ValueEnum;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::kubernetes::WorkloadDirectory;
use crate::sync::dependency::depends_on;
use crate::sync::executor::{Mutation, PatchExecutor};
use crate::sync::fingerprint::{fingerprint, FingerprintMode};
use crate::sync::marker::{marker_key, MarkerStrategy};
use crate::types::{ConfigSource, SourceEvent, SourceKey, WorkloadKind};

/// How a changed workload is written back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Replace the enumerated object, guarded by its resourceVersion
    #[default]
    Update,
    /// Send a minimal patch touching only the marker
    Patch,
}

/// What handling one event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Same resourceVersion or same content as the previous observation
    Unchanged,
    Reconciled {
        /// Workloads declaring a dependency on the source
        matched: usize,
        /// Workloads whose marker was written
        patched: usize,
        /// Workloads whose write exhausted its retries
        failed: usize,
    },
}

#[derive(Debug, Default, Clone, Copy)]
struct KindTally {
    matched: usize,
    patched: usize,
    failed: usize,
}

/// The change being propagated
struct Change {
    key: SourceKey,
    marker_key: String,
    token: String,
}

pub struct Reconciler {
    directory: Arc<dyn WorkloadDirectory>,
    executor: PatchExecutor,
    kinds: Vec<WorkloadKind>,
    fingerprint_mode: FingerprintMode,
    strategy: MarkerStrategy,
    transport: Transport,
}

impl Reconciler {
    pub fn new(
        directory: Arc<dyn WorkloadDirectory>,
        executor: PatchExecutor,
        kinds: Vec<WorkloadKind>,
    ) -> Self {
        Self {
            directory,
            executor,
            kinds,
            fingerprint_mode: FingerprintMode::default(),
            strategy: MarkerStrategy::default(),
            transport: Transport::default(),
        }
    }

    pub fn with_fingerprint_mode(mut self, mode: FingerprintMode) -> Self {
        self.fingerprint_mode = mode;
        self
    }

    pub fn with_strategy(mut self, strategy: MarkerStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Handle one configuration event.
    ///
    /// Every workload kind is processed in its own task; the call returns once
    /// all of them are done. Failures are logged and counted, never returned.
    #[instrument(skip(self, event), fields(source = %event.current().key()))]
    pub async fn handle_event(self: Arc<Self>, event: SourceEvent) -> EventOutcome {
        let current = match &event {
            SourceEvent::Added(current) => current,
            SourceEvent::Updated { previous, current } => {
                if self.is_unchanged(previous, current) {
                    debug!("No content change, skipping");
                    return EventOutcome::Unchanged;
                }
                current
            }
        };

        let change = Arc::new(Change {
            key: current.key(),
            marker_key: marker_key(current),
            token: fingerprint(&current.data(), self.fingerprint_mode),
        });
        debug!("Propagating {}={}", change.marker_key, change.token);

        let mut tasks = JoinSet::new();
        for kind in self.kinds.iter().copied() {
            let reconciler = self.clone();
            let change = change.clone();
            tasks.spawn(async move { reconciler.reconcile_kind(kind, &change).await });
        }

        let mut total = KindTally::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(tally) => {
                    total.matched += tally.matched;
                    total.patched += tally.patched;
                    total.failed += tally.failed;
                }
                Err(e) => error!("Workload task failed: {}", e),
            }
        }

        EventOutcome::Reconciled {
            matched: total.matched,
            patched: total.patched,
            failed: total.failed,
        }
    }

    /// Equal resourceVersions mean a resync; equal fingerprints mean a
    /// metadata-only write. Neither should restart anything.
    fn is_unchanged(&self, previous: &ConfigSource, current: &ConfigSource) -> bool {
        let previous_version = previous.resource_version();
        if previous_version.is_some() && previous_version == current.resource_version() {
            return true;
        }
        fingerprint(&previous.data(), self.fingerprint_mode)
            == fingerprint(&current.data(), self.fingerprint_mode)
    }

    #[instrument(skip(self, change), fields(kind = %kind))]
    async fn reconcile_kind(&self, kind: WorkloadKind, change: &Change) -> KindTally {
        let mut tally = KindTally::default();

        let workloads = match self.directory.list(kind, Some(&change.key.namespace)).await {
            Ok(w) => w,
            Err(e) => {
                error!("Failed to list {} in {}: {}", kind, change.key.namespace, e);
                return tally;
            }
        };

        for mut workload in workloads {
            if !depends_on(&workload, &change.key.name) {
                continue;
            }
            tally.matched += 1;

            if workload.pod_template().is_none() {
                warn!("{} has no pod template, skipping", workload.reference());
                continue;
            }

            let document = match self.transport {
                Transport::Patch => Some(self.strategy.patch_document(
                    &workload,
                    &change.marker_key,
                    &change.token,
                )),
                Transport::Update => None,
            };

            if !self
                .strategy
                .apply(&mut workload, &change.marker_key, &change.token)
            {
                debug!("{} already up to date", workload.reference());
                continue;
            }

            info!("Rolling {} for {}", workload.reference(), change.key);
            let mutation = match document {
                Some(document) => Mutation::Patch {
                    target: workload.reference(),
                    document,
                },
                None => Mutation::Update {
                    workload,
                    key: change.marker_key.clone(),
                    token: change.token.clone(),
                    strategy: self.strategy,
                },
            };

            if self.executor.apply(mutation).await.is_failure() {
                tally.failed += 1;
            } else {
                tally.patched += 1;
            }
        }

        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::annotations;
    use crate::sync::retry::RetryPolicy;
    use crate::test_utils::{
        make_configmap, make_deployment, make_secret, DirectoryCall, FakeDirectory,
    };
    use crate::types::{DeploymentConfig, Workload};
    use k8s_openapi::api::apps::v1::DaemonSet;
    use serde_json::json;

    fn reconciler(directory: &FakeDirectory) -> Arc<Reconciler> {
        let shared: Arc<dyn WorkloadDirectory> = Arc::new(directory.clone());
        let executor = PatchExecutor::new(shared.clone(), RetryPolicy::default());
        Arc::new(Reconciler::new(shared, executor, WorkloadKind::PLAIN.to_vec()))
    }

    fn marker_env(workload: &Workload, key: &str) -> Option<String> {
        workload.pod_template()?.spec.as_ref()?.containers[0]
            .env
            .as_ref()?
            .iter()
            .find(|e| e.name == key)
            .and_then(|e| e.value.clone())
    }

    fn updated(previous: ConfigSource, current: ConfigSource) -> SourceEvent {
        SourceEvent::Updated { previous, current }
    }

    #[tokio::test]
    async fn test_content_change_patches_only_dependents() {
        let dependent = make_deployment("web", "shop", Some("app-config,other"));
        let unrelated = make_deployment("batch", "shop", Some("unrelated"));
        let directory = FakeDirectory::new(vec![dependent.clone(), unrelated.clone()]);

        let outcome = reconciler(&directory)
            .handle_event(updated(
                make_configmap("app-config", "shop", "1", &[("x", "1")]),
                make_configmap("app-config", "shop", "2", &[("x", "2")]),
            ))
            .await;

        assert_eq!(
            outcome,
            EventOutcome::Reconciled {
                matched: 1,
                patched: 1,
                failed: 0
            }
        );
        assert_eq!(
            directory.writes(),
            vec![DirectoryCall::Update(dependent.reference())]
        );

        let stored = directory.workload(&dependent.reference()).unwrap();
        let expected = fingerprint(
            &make_configmap("app-config", "shop", "2", &[("x", "2")]).data(),
            FingerprintMode::Compact,
        );
        assert_eq!(
            marker_env(&stored, "FABRIC8_APP_CONFIG_CONFIGMAP"),
            Some(expected)
        );
        let untouched = directory.workload(&unrelated.reference()).unwrap();
        assert_eq!(marker_env(&untouched, "FABRIC8_APP_CONFIG_CONFIGMAP"), None);
    }

    #[tokio::test]
    async fn test_same_resource_version_is_noop() {
        let directory =
            FakeDirectory::new(vec![make_deployment("web", "shop", Some("app-config"))]);
        let source = make_configmap("app-config", "shop", "7", &[("x", "1")]);

        let outcome = reconciler(&directory)
            .handle_event(updated(source.clone(), source))
            .await;

        assert_eq!(outcome, EventOutcome::Unchanged);
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_only_change_is_noop() {
        let directory =
            FakeDirectory::new(vec![make_deployment("web", "shop", Some("app-config"))]);

        let outcome = reconciler(&directory)
            .handle_event(updated(
                make_configmap("app-config", "shop", "1", &[("x", "1")]),
                make_configmap("app-config", "shop", "2", &[("x", "1")]),
            ))
            .await;

        assert_eq!(outcome, EventOutcome::Unchanged);
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_same_content_twice_patches_once() {
        let workload = make_deployment("web", "shop", Some("app-config"));
        let directory = FakeDirectory::new(vec![workload.clone()]);
        let reconciler = reconciler(&directory);
        let source = make_configmap("app-config", "shop", "3", &[("x", "2")]);

        reconciler
            .clone()
            .handle_event(SourceEvent::Added(source.clone()))
            .await;
        let second = reconciler.handle_event(SourceEvent::Added(source)).await;

        assert_eq!(
            second,
            EventOutcome::Reconciled {
                matched: 1,
                patched: 0,
                failed: 0
            }
        );
        assert_eq!(directory.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_lists_every_kind_in_source_namespace() {
        let directory = FakeDirectory::new(vec![]);

        reconciler(&directory)
            .handle_event(SourceEvent::Added(make_configmap("app-config", "shop", "1", &[])))
            .await;

        let mut listed: Vec<String> = directory
            .calls()
            .into_iter()
            .map(|c| match c {
                DirectoryCall::List(kind, ns) => format!("{} {}", kind, ns.unwrap_or_default()),
                other => panic!("unexpected call {:?}", other),
            })
            .collect();
        listed.sort();
        assert_eq!(
            listed,
            vec!["DaemonSet shop", "Deployment shop", "StatefulSet shop"]
        );
    }

    #[tokio::test]
    async fn test_list_failure_only_affects_that_kind() {
        let deployment = make_deployment("web", "shop", Some("app-config"));
        let daemonset = Workload::from(
            serde_json::from_value::<DaemonSet>(json!({
                "apiVersion": "apps/v1",
                "kind": "DaemonSet",
                "metadata": {
                    "name": "agent",
                    "namespace": "shop",
                    "annotations": { (annotations::UPDATE_ON_CHANGE): "app-config" }
                },
                "spec": {
                    "selector": {},
                    "template": { "spec": { "containers": [{ "name": "agent" }] } }
                }
            }))
            .unwrap(),
        );
        let directory = FakeDirectory::new(vec![deployment, daemonset.clone()]);
        directory.fail_list(WorkloadKind::Deployment);

        let outcome = reconciler(&directory)
            .handle_event(SourceEvent::Added(make_configmap(
                "app-config",
                "shop",
                "1",
                &[("x", "1")],
            )))
            .await;

        assert_eq!(
            outcome,
            EventOutcome::Reconciled {
                matched: 1,
                patched: 1,
                failed: 0
            }
        );
        assert_eq!(
            directory.writes(),
            vec![DirectoryCall::Update(daemonset.reference())]
        );
    }

    #[tokio::test]
    async fn test_secret_uses_secret_marker() {
        let workload = make_deployment("web", "shop", Some("db-creds"));
        let directory = FakeDirectory::new(vec![workload.clone()]);

        reconciler(&directory)
            .handle_event(SourceEvent::Added(make_secret(
                "db-creds",
                "shop",
                "1",
                &[("password", "s3cret")],
            )))
            .await;

        let stored = directory.workload(&workload.reference()).unwrap();
        assert!(marker_env(&stored, "FABRIC8_DB_CREDS_SECRET").is_some());
    }

    #[tokio::test]
    async fn test_other_namespace_is_not_touched() {
        let directory =
            FakeDirectory::new(vec![make_deployment("web", "other", Some("app-config"))]);

        let outcome = reconciler(&directory)
            .handle_event(SourceEvent::Added(make_configmap(
                "app-config",
                "shop",
                "1",
                &[("x", "1")],
            )))
            .await;

        assert_eq!(
            outcome,
            EventOutcome::Reconciled {
                matched: 0,
                patched: 0,
                failed: 0
            }
        );
        assert!(directory.writes().is_empty());
    }

    #[tokio::test]
    async fn test_patch_transport_with_labels() {
        let workload = make_deployment("web", "shop", Some("app-config"));
        let directory = FakeDirectory::new(vec![workload.clone()]);
        let shared: Arc<dyn WorkloadDirectory> = Arc::new(directory.clone());
        let executor = PatchExecutor::new(shared.clone(), RetryPolicy::default());
        let reconciler = Arc::new(
            Reconciler::new(shared, executor, WorkloadKind::PLAIN.to_vec())
                .with_transport(Transport::Patch)
                .with_strategy(MarkerStrategy::Label)
                .with_fingerprint_mode(FingerprintMode::Diagnostic),
        );

        reconciler
            .handle_event(SourceEvent::Added(make_configmap(
                "app-config",
                "shop",
                "1",
                &[("x", "1")],
            )))
            .await;

        let writes = directory.writes();
        assert_eq!(writes.len(), 1);
        let DirectoryCall::Patch(target, document) = &writes[0] else {
            panic!("expected a patch, got {:?}", writes[0]);
        };
        assert_eq!(target, &workload.reference());
        assert_eq!(
            document.body["spec"]["template"]["metadata"]["labels"]["FABRIC8_APP_CONFIG_CONFIGMAP"],
            json!(crate::sync::marker::label_value("x=1"))
        );
    }

    #[tokio::test]
    async fn test_workload_without_template_is_skipped() {
        let config = Workload::from(
            serde_json::from_value::<DeploymentConfig>(json!({
                "apiVersion": "apps.openshift.io/v1",
                "kind": "DeploymentConfig",
                "metadata": {
                    "name": "legacy",
                    "namespace": "shop",
                    "annotations": { (annotations::UPDATE_ON_CHANGE): "app-config" }
                },
                "spec": { "replicas": 1 }
            }))
            .unwrap(),
        );
        let directory = FakeDirectory::new(vec![config]);
        let shared: Arc<dyn WorkloadDirectory> = Arc::new(directory.clone());
        let executor = PatchExecutor::new(shared.clone(), RetryPolicy::default());
        let reconciler = Arc::new(Reconciler::new(
            shared,
            executor,
            vec![WorkloadKind::DeploymentConfig],
        ));

        let outcome = reconciler
            .handle_event(SourceEvent::Added(make_configmap(
                "app-config",
                "shop",
                "1",
                &[("x", "1")],
            )))
            .await;

        assert_eq!(
            outcome,
            EventOutcome::Reconciled {
                matched: 1,
                patched: 0,
                failed: 0
            }
        );
        assert!(directory.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_patch_is_counted_not_raised() {
        let first = make_deployment("web", "shop", Some("app-config"));
        let second = make_deployment("api", "shop", Some("app-config"));
        let directory = FakeDirectory::new(vec![first, second]);
        directory.fail_writes(3);

        let outcome = reconciler(&directory)
            .handle_event(SourceEvent::Added(make_configmap(
                "app-config",
                "shop",
                "1",
                &[("x", "1")],
            )))
            .await;

        assert_eq!(
            outcome,
            EventOutcome::Reconciled {
                matched: 2,
                patched: 1,
                failed: 1
            }
        );
    }
}
