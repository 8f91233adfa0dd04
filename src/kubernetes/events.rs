// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Event source: watches ConfigMaps and Secrets and emits normalized change events.

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use kube_runtime::{watcher, WatchStreamExt};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::types::{ConfigSource, SourceEvent, SourceKey, SourceKind};

/// Remembers the last observation of every object and turns raw watch
/// events into `Added` / `Updated` notifications.
#[derive(Debug, Default)]
pub struct SourceTracker {
    known: HashMap<SourceKey, ConfigSource>,
    /// Keys seen per kind while a re-list is in progress
    relisting: HashMap<SourceKind, HashSet<SourceKey>>,
}

impl SourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn handle<K: Into<ConfigSource>>(
        &mut self,
        kind: SourceKind,
        event: watcher::Event<K>,
    ) -> Option<SourceEvent> {
        match event {
            watcher::Event::Init => {
                debug!("Re-listing {}s", kind);
                self.relisting.insert(kind, HashSet::new());
                None
            }
            watcher::Event::InitApply(obj) => {
                let source: ConfigSource = obj.into();
                if let Some(seen) = self.relisting.get_mut(&kind) {
                    seen.insert(source.key());
                }
                Some(self.observe(source))
            }
            watcher::Event::InitDone => {
                let seen = self.relisting.remove(&kind).unwrap_or_default();
                let before = self.known.len();
                self.known
                    .retain(|key, _| key.kind != kind || seen.contains(key));
                debug!(
                    "Re-list of {}s done, forgot {} vanished objects",
                    kind,
                    before - self.known.len()
                );
                None
            }
            watcher::Event::Apply(obj) => Some(self.observe(obj.into())),
            watcher::Event::Delete(obj) => {
                let source: ConfigSource = obj.into();
                let key = source.key();
                debug!("{} deleted", key);
                self.known.remove(&key);
                None
            }
        }
    }

    /// Re-emit every known object unchanged
    pub fn resync(&self) -> Vec<SourceEvent> {
        self.known
            .values()
            .map(|source| SourceEvent::Updated {
                previous: source.clone(),
                current: source.clone(),
            })
            .collect()
    }

    fn observe(&mut self, source: ConfigSource) -> SourceEvent {
        match self.known.insert(source.key(), source.clone()) {
            None => SourceEvent::Added(source),
            Some(previous) => SourceEvent::Updated {
                previous,
                current: source,
            },
        }
    }
}

/// Watches ConfigMaps and Secrets and forwards change events to the controller.
pub struct EventSource {
    client: Client,
    namespace: Option<String>,
    resync_period: Duration,
}

impl EventSource {
    /// `namespace: None` watches the whole cluster
    pub fn new(client: Client, namespace: Option<String>, resync_period: Duration) -> Self {
        Self {
            client,
            namespace,
            resync_period,
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    /// Run until `shutdown` resolves or the receiving side goes away.
    pub async fn run(
        self,
        events: mpsc::Sender<SourceEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<()> {
        info!(
            "Watching ConfigMaps and Secrets in {}",
            self.namespace.as_deref().unwrap_or("all namespaces")
        );

        let config_maps =
            watcher(self.api::<ConfigMap>(), watcher::Config::default()).default_backoff();
        let secrets = watcher(self.api::<Secret>(), watcher::Config::default()).default_backoff();

        pump(config_maps, secrets, self.resync_period, events, shutdown).await;
        info!("Event source stopped");
        Ok(())
    }
}

fn next_events<K>(
    tracker: &mut SourceTracker,
    kind: SourceKind,
    item: Result<watcher::Event<K>, watcher::Error>,
) -> Vec<SourceEvent>
where
    K: Into<ConfigSource>,
{
    match item {
        Ok(event) => tracker.handle(kind, event).into_iter().collect(),
        Err(e) => {
            warn!("{} watch error: {}", kind, e);
            Vec::new()
        }
    }
}

/// Drive both watch streams and the resync timer into `events`.
async fn pump<C, S>(
    config_maps: C,
    secrets: S,
    resync_period: Duration,
    events: mpsc::Sender<SourceEvent>,
    shutdown: impl Future<Output = ()>,
) where
    C: Stream<Item = Result<watcher::Event<ConfigMap>, watcher::Error>>,
    S: Stream<Item = Result<watcher::Event<Secret>, watcher::Error>>,
{
    tokio::pin!(config_maps, secrets, shutdown);

    let mut tracker = SourceTracker::new();
    let mut resync = interval_at(Instant::now() + resync_period, resync_period);
    resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let emitted = tokio::select! {
            biased;

            _ = &mut shutdown => break,
            Some(item) = config_maps.next() => {
                next_events(&mut tracker, SourceKind::ConfigMap, item)
            }
            Some(item) = secrets.next() => next_events(&mut tracker, SourceKind::Secret, item),
            _ = resync.tick() => {
                debug!("Resyncing {} objects", tracker.len());
                tracker.resync()
            }
        };

        for event in emitted {
            if events.send(event).await.is_err() {
                debug!("Controller is gone, stopping event source");
                return;
            }
        }
    }
}
