// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Event loop handing every change event to the reconciler in its own task.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::reconcilers::reconciler::{EventOutcome, Reconciler};
use crate::types::SourceEvent;

pub struct Controller {
    reconciler: Arc<Reconciler>,
}

impl Controller {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
        }
    }

    /// Consume events until `shutdown` resolves or the channel closes.
    ///
    /// Events already being handled are allowed to finish, including any
    /// pending patch retries.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<SourceEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        let mut tasks = JoinSet::new();

        info!("Controller started, waiting for events...");
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Stop requested, no longer accepting events");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_outcome(joined),
                event = events.recv() => match event {
                    Some(event) => {
                        let reconciler = self.reconciler.clone();
                        tasks.spawn(async move { reconciler.handle_event(event).await });
                    }
                    None => {
                        info!("Event source closed");
                        break;
                    }
                },
            }
        }

        if !tasks.is_empty() {
            info!("Waiting for {} in-flight events to finish", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            log_outcome(joined);
        }

        info!("Controller stopped");
        Ok(())
    }
}

fn log_outcome(joined: Result<EventOutcome, JoinError>) {
    match joined {
        Ok(EventOutcome::Unchanged) => {}
        Ok(EventOutcome::Reconciled {
            matched,
            patched,
            failed,
        }) => {
            if patched > 0 || failed > 0 {
                info!(
                    "Event handled: {} dependents, {} updated, {} failed",
                    matched, patched, failed
                );
            } else {
                debug!("Event handled: {} dependents, all up to date", matched);
            }
        }
        Err(e) => error!("Event task failed: {}", e),
    }
}
