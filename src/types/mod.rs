// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Domain types: watched configuration objects and dependent workloads.

pub mod source;
pub mod workload;

pub use source::{ConfigSource, SourceEvent, SourceKey, SourceKind};
pub use workload::{DeploymentConfig, DeploymentConfigSpec, Workload, WorkloadKind, WorkloadRef};
