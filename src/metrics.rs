/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/metrics.rs
*
* This module defines and registers the custom Prometheus metrics that the
* aigen-operator exposes, and the small warp server that serves them.
*
* Using `lazy_static`, the metrics are created only once and are available
* globally and safely across concurrently spawned triggers and the HTTP
* server.
*
* SPDX-License-Identifier: Apache-2.0
*/

use lazy_static::lazy_static;
use prometheus::{
    opts, register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use warp::{http::StatusCode, Filter};

// --- Metric Definitions ---

lazy_static! {
    /// Triggers received, labeled by source (node-event, resource-event, timer).
    pub static ref AIGEN_TRIGGERS_TOTAL: IntCounterVec =
        register_int_counter_vec!(
            "aigen_triggers_total",
            "Total number of reconciliation triggers received.",
            &["source"]
        ).unwrap();

    /// Triggers dropped because a pass was already running.
    pub static ref AIGEN_TRIGGERS_DROPPED_TOTAL: IntCounterVec =
        register_int_counter_vec!(
            "aigen_triggers_dropped_total",
            "Total number of triggers dropped while a reconciliation was in flight.",
            &["source"]
        ).unwrap();

    /// Completed passes, labeled by outcome (converged, degraded, failed).
    pub static ref AIGEN_RECONCILE_PASSES_TOTAL: IntCounterVec =
        register_int_counter_vec!(
            "aigen_reconcile_passes_total",
            "Total number of completed reconciliation passes.",
            &["outcome"]
        ).unwrap();

    pub static ref AIGEN_RECONCILE_DURATION_SECONDS: Histogram =
        register_histogram!(
            "aigen_reconcile_duration_seconds",
            "Wall-clock duration of a reconciliation pass.",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        ).unwrap();

    pub static ref AIGEN_SCALE_MUTATIONS_TOTAL: IntCounterVec =
        register_int_counter_vec!(
            "aigen_scale_mutations_total",
            "Total number of deployment scale patches issued.",
            &["workload"]
        ).unwrap();

    pub static ref AIGEN_STATUS_WRITES_TOTAL: IntCounter =
        register_int_counter!(opts!(
            "aigen_status_writes_total",
            "Total number of AIGen status writes."
        )).unwrap();

    pub static ref AIGEN_RETRIES_TOTAL: IntCounterVec =
        register_int_counter_vec!(
            "aigen_retries_total",
            "Total number of retried cluster API calls.",
            &["operation"]
        ).unwrap();

    pub static ref AIGEN_ELIGIBLE_NODES: IntGauge =
        register_int_gauge!(opts!(
            "aigen_eligible_nodes",
            "GPU-capable, schedulable nodes seen by the last pass."
        )).unwrap();

    pub static ref AIGEN_INELIGIBLE_NODES: IntGauge =
        register_int_gauge!(opts!(
            "aigen_ineligible_nodes",
            "Nodes not eligible for the GPU deployment in the last pass."
        )).unwrap();
}

/// Creates a new Prometheus registry and registers all custom metrics.
///
/// This function is intended to be called once at operator startup.
pub fn create_and_register_metrics() -> Result<Registry, prometheus::Error> {
    let r = Registry::new();
    r.register(Box::new(AIGEN_TRIGGERS_TOTAL.clone()))?;
    r.register(Box::new(AIGEN_TRIGGERS_DROPPED_TOTAL.clone()))?;
    r.register(Box::new(AIGEN_RECONCILE_PASSES_TOTAL.clone()))?;
    r.register(Box::new(AIGEN_RECONCILE_DURATION_SECONDS.clone()))?;
    r.register(Box::new(AIGEN_SCALE_MUTATIONS_TOTAL.clone()))?;
    r.register(Box::new(AIGEN_STATUS_WRITES_TOTAL.clone()))?;
    r.register(Box::new(AIGEN_RETRIES_TOTAL.clone()))?;
    r.register(Box::new(AIGEN_ELIGIBLE_NODES.clone()))?;
    r.register(Box::new(AIGEN_INELIGIBLE_NODES.clone()))?;
    Ok(r)
}

/// Renders the registry in the Prometheus text format.
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

async fn metrics_handler(registry: Arc<Registry>) -> Result<Box<dyn warp::Reply>, warp::Rejection> {
    match render(&registry) {
        Ok(body) => Ok(Box::new(warp::reply::with_header(
            body,
            "Content-Type",
            TextEncoder::new().format_type(),
        ))),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            Ok(Box::new(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

/// Runs the HTTP server exposing `/metrics` and `/healthz`.
pub async fn run_metrics_server(registry: Arc<Registry>, addr: SocketAddr) {
    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .and(warp::any().map(move || Arc::clone(&registry)))
        .and_then(metrics_handler);
    let health_route = warp::path("healthz")
        .and(warp::get())
        .map(|| StatusCode::OK);

    info!(%addr, "Starting metrics server");
    warp::serve(metrics_route.or(health_route)).run(addr).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_renders_registered_metrics() {
        let registry = Registry::new();
        registry
            .register(Box::new(AIGEN_STATUS_WRITES_TOTAL.clone()))
            .unwrap();
        AIGEN_STATUS_WRITES_TOTAL.inc();

        let body = render(&registry).unwrap();
        assert!(body.contains("aigen_status_writes_total"));
    }
}
