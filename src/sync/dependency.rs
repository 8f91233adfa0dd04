// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Matching workloads to the configuration objects they declare.

use crate::constants::annotations;
use crate::types::Workload;

/// Check whether `name` is one of the comma separated tokens in `annotation`.
///
/// Tokens are compared verbatim, surrounding whitespace is significant.
pub fn matches(annotation: &str, name: &str) -> bool {
    !annotation.is_empty() && annotation.split(annotations::SEPARATOR).any(|v| v == name)
}

/// Check whether the workload's update-on-change annotation lists `name`
pub fn depends_on(workload: &Workload, name: &str) -> bool {
    workload
        .annotation(annotations::UPDATE_ON_CHANGE)
        .is_some_and(|v| matches(v, name))
}
