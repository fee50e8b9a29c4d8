/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/settings.rs
*
* Process settings. Every flag can also be supplied through the environment
* variable named next to it, which is how the operator is configured when it
* runs as a Deployment.
*
* SPDX-License-Identifier: Apache-2.0
*/

use crate::controllers::dispatcher::DispatchConfig;
use crate::nodes::{GpuSelector, DEFAULT_GPU_LABEL, DEFAULT_GPU_RESOURCE};
use crate::retry::RetryPolicy;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "aigen-operator", version, about)]
pub struct Settings {
    /// Namespace holding the AIGen object.
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = "whiz-operator")]
    pub namespace: String,

    /// Name of the AIGen object to reconcile.
    #[arg(long, env = "CR_NAME", default_value = "aigen")]
    pub cr_name: String,

    /// Seconds between periodic reconciliation passes.
    #[arg(
        long,
        env = "RECONCILE_INTERVAL",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub reconcile_interval: u64,

    /// Filter used when RUST_LOG is not set.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    #[arg(long, env = "GPU_LABEL", default_value = DEFAULT_GPU_LABEL)]
    pub gpu_label: String,

    #[arg(long, env = "GPU_RESOURCE", default_value = DEFAULT_GPU_RESOURCE)]
    pub gpu_resource: String,

    /// Attempts per cluster API call, including the first.
    #[arg(
        long,
        env = "RETRY_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub retry_attempts: u32,

    /// Seconds before the first retry.
    #[arg(long, env = "RETRY_BASE_DELAY", default_value_t = 2)]
    pub retry_base_delay: u64,

    /// Upper bound in seconds for any single retry delay.
    #[arg(long, env = "RETRY_MAX_DELAY", default_value_t = 10)]
    pub retry_max_delay: u64,

    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9090")]
    pub metrics_addr: SocketAddr,

    /// Export spans to a Jaeger agent.
    #[arg(long, env = "JAEGER_ENABLED", default_value_t = false)]
    pub jaeger_enabled: bool,
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_secs(self.retry_base_delay),
            max_delay: Duration::from_secs(self.retry_max_delay),
            ..RetryPolicy::default()
        }
    }

    pub fn gpu_selector(&self) -> GpuSelector {
        GpuSelector {
            label: self.gpu_label.clone(),
            resource: self.gpu_resource.clone(),
        }
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval)
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            namespace: self.namespace.clone(),
            cr_name: self.cr_name.clone(),
            interval: self.reconcile_interval(),
        }
    }
}
