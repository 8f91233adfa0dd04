// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation of configuration changes into workload rollouts.

pub mod controller;
pub mod reconciler;

pub use controller::Controller;
pub use reconciler::{EventOutcome, Reconciler, Transport};
