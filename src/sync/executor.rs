// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Applies marker mutations to workloads, retrying with backoff.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::kubernetes::WorkloadDirectory;
use crate::sync::marker::{MarkerStrategy, PatchDocument};
use crate::sync::retry::{retry_with_backoff, RetryPolicy};
use crate::types::{Workload, WorkloadRef};

/// A write to submit for one workload
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Replace the workload, which already carries the new marker.
    ///
    /// Retries re-fetch the workload and re-apply the marker so a conflict
    /// with a concurrent writer does not fail every attempt.
    Update {
        workload: Workload,
        key: String,
        token: String,
        strategy: MarkerStrategy,
    },
    /// Submit a patch without reading the workload
    Patch {
        target: WorkloadRef,
        document: PatchDocument,
    },
}

impl Mutation {
    pub fn target(&self) -> WorkloadRef {
        match self {
            Mutation::Update { workload, .. } => workload.reference(),
            Mutation::Patch { target, .. } => target.clone(),
        }
    }
}

/// Result of applying a mutation. Failures are logged, not returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied { attempts: u32 },
    /// A re-fetched workload already carried the marker
    AlreadyInSync,
    Exhausted { attempts: u32 },
}

impl PatchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PatchOutcome::Exhausted { .. })
    }
}

pub struct PatchExecutor {
    directory: Arc<dyn WorkloadDirectory>,
    policy: RetryPolicy,
}

impl PatchExecutor {
    pub fn new(directory: Arc<dyn WorkloadDirectory>, policy: RetryPolicy) -> Self {
        Self { directory, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[instrument(skip(self, mutation), fields(target = %mutation.target()))]
    pub async fn apply(&self, mutation: Mutation) -> PatchOutcome {
        let target = mutation.target();
        let operation = format!("update {}", target);
        let directory = self.directory.as_ref();

        let (result, attempts) = match &mutation {
            Mutation::Patch { target, document } => {
                retry_with_backoff(&self.policy, &operation, |_| async move {
                    directory.patch(target, document).await.map(|_| true)
                })
                .await
            }
            Mutation::Update {
                workload,
                key,
                token,
                strategy,
            } => {
                retry_with_backoff(&self.policy, &operation, |attempt| async move {
                    if attempt == 1 {
                        return directory.update(workload).await.map(|_| true);
                    }
                    let mut fresh = directory.get(&workload.reference()).await?;
                    if !strategy.apply(&mut fresh, key, token) {
                        return Ok(false);
                    }
                    directory.update(&fresh).await.map(|_| true)
                })
                .await
            }
        };

        match result {
            Ok(true) => {
                info!("Updated {}", target);
                PatchOutcome::Applied { attempts }
            }
            Ok(false) => {
                info!("{} already up to date", target);
                PatchOutcome::AlreadyInSync
            }
            Err(e) => {
                debug!("Giving up on {} after {} attempts: {}", target, attempts, e);
                PatchOutcome::Exhausted { attempts }
            }
        }
    }
}
