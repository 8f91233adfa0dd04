// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fingerprinting, dependency matching and marker synchronization.

pub mod dependency;
pub mod executor;
pub mod fingerprint;
pub mod marker;
pub mod retry;

pub use executor::{Mutation, PatchExecutor, PatchOutcome};
pub use fingerprint::{fingerprint, FingerprintMode};
pub use marker::{MarkerStrategy, PatchDocument, PatchType};
pub use retry::RetryPolicy;
