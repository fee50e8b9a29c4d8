/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/main.rs
*
* Main entry point of the aigen-operator.
*
* Architecture:
* 1.  **Settings**: flags and environment variables are parsed by `clap`.
* 2.  **Telemetry**: `tracing` is initialized with an `EnvFilter`, a JSON or
*     text formatter, and an optional OpenTelemetry layer exporting to Jaeger.
* 3.  **Wiring**: a `kube::Client` is inferred from the environment and wrapped
*     in a `KubeGateway`; the `Orchestrator` owns the gateway, the retry policy
*     and the single-flight guard.
* 4.  **Concurrent Execution**: the metrics server and the trigger dispatcher
*     run side by side. The process exits on Ctrl-C or when either of them
*     stops.
*
* SPDX-License-Identifier: Apache-2.0
*/

use aigen_operator::controllers::{dispatcher, orchestrator::Orchestrator};
use aigen_operator::gateway::KubeGateway;
use aigen_operator::metrics;
use aigen_operator::settings::{LogFormat, Settings};
use anyhow::Context;
use clap::Parser;
use kube::Client;
use opentelemetry::global;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Sets up logging and, when enabled, the Jaeger trace exporter.
fn init_telemetry(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .context("invalid log filter")?;

    let fmt_layer = match settings.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
    };

    let telemetry = if settings.jaeger_enabled {
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name("aigen-operator")
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install the Jaeger pipeline")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .with(telemetry)
        .try_init()
        .context("failed to install the tracing subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();

    // 1. Initialize Telemetry and Logging
    init_telemetry(&settings)?;
    info!(
        namespace = %settings.namespace,
        name = %settings.cr_name,
        jaeger = settings.jaeger_enabled,
        "Telemetry initialized."
    );

    // 2. Initialize Kubernetes Client
    let client = Client::try_default()
        .await
        .context("failed to infer Kubernetes client configuration")?;

    // 3. Initialize metrics registry
    let registry = Arc::new(
        metrics::create_and_register_metrics().context("failed to register metrics")?,
    );
    info!("Custom metrics registered.");

    // 4. Build the reconciliation core
    let gateway = Arc::new(KubeGateway::new(
        client.clone(),
        &settings.namespace,
        &settings.cr_name,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        gateway,
        settings.retry_policy(),
        settings.gpu_selector(),
    ));

    info!("aigen-operator starting...");

    // 5. Run the metrics server and the dispatcher until one stops
    tokio::select! {
        _ = metrics::run_metrics_server(registry, settings.metrics_addr) => {
            warn!("Metrics server has unexpectedly stopped.")
        }
        _ = dispatcher::run(orchestrator, client, settings.dispatch_config()) => {
            warn!("Dispatcher has unexpectedly stopped.")
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for the shutdown signal");
            }
        }
    }

    info!("aigen-operator shutting down.");

    // Shutdown the tracer provider.
    global::shutdown_tracer_provider();

    Ok(())
}
