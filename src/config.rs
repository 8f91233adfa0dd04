// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Controller configuration from command line flags and environment variables.

use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::constants::retry;
use crate::reconcilers::Transport;
use crate::sync::{FingerprintMode, MarkerStrategy, RetryPolicy};

/// Where workloads are listed and written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Typed Kubernetes API client
    #[default]
    Api,
    /// The kubectl (or oc) command line tool
    Kubectl,
}

/// Restarts workloads when the ConfigMaps or Secrets they depend on change
#[derive(Parser, Debug, Clone)]
#[command(name = "configmap-controller", version, about, long_about = None)]
pub struct Config {
    /// How often every known ConfigMap and Secret is redelivered
    #[arg(long, env = "SYNC_PERIOD", default_value = "30s", value_parser = parse_duration)]
    pub sync_period: Duration,

    /// Port of the /healthz endpoint
    #[arg(long, env = "HEALTHZ_PORT", default_value_t = 10254)]
    pub healthz_port: u16,

    /// Only watch this namespace (default: all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Where the change marker is written in the pod template
    #[arg(long, env = "MARKER_STRATEGY", value_enum, default_value_t)]
    pub marker: MarkerStrategy,

    /// Replace the workload object or send a minimal patch
    #[arg(long, env = "PATCH_TRANSPORT", value_enum, default_value_t)]
    pub transport: Transport,

    #[arg(long, env = "DIRECTORY_BACKEND", value_enum, default_value_t)]
    pub backend: Backend,

    /// Binary used by the kubectl backend
    #[arg(long, env = "KUBECTL_PATH", default_value = "kubectl")]
    pub kubectl_path: String,

    /// Hash the content (compact) or use it verbatim (diagnostic)
    #[arg(long, env = "FINGERPRINT_MODE", value_enum, default_value_t)]
    pub fingerprint: FingerprintMode,

    /// Attempts per workload write, including the first
    #[arg(
        long,
        env = "PATCH_ATTEMPTS",
        default_value_t = retry::MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub patch_attempts: u32,

    /// Delay before the first retry, doubled for each following one
    #[arg(long, env = "PATCH_BACKOFF", default_value = "30s", value_parser = parse_duration)]
    pub patch_backoff: Duration,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.patch_attempts, self.patch_backoff)
    }
}

/// Parse `<n>`, `<n>ms`, `<n>s`, `<n>m` or `<n>h`; plain numbers are seconds
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{}'", value))?;
    let duration = match unit {
        "" | "s" => Duration::from_secs(amount),
        "ms" => Duration::from_millis(amount),
        "m" => Duration::from_secs(amount * 60),
        "h" => Duration::from_secs(amount * 3600),
        other => return Err(format!("unknown duration unit '{}' in '{}'", other, value)),
    };

    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}
