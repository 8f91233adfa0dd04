// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes access: workload directories, flavor discovery and the event source.

pub mod directory;
pub mod events;
pub mod flavor;
pub mod kubectl;

pub use directory::{ApiDirectory, WorkloadDirectory};
pub use events::{EventSource, SourceTracker};
pub use flavor::{detect_flavor, Flavor};
pub use kubectl::KubectlDirectory;
