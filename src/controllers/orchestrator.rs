/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/controllers/orchestrator.rs
*
* This file implements the reconciliation orchestrator, the single entry point
* every trigger goes through.
*
* Architecture:
* - The orchestrator is a two-state machine, Idle and Reconciling. The state
*   is a `tokio::sync::Mutex<()>` acquired with `try_lock`: a trigger that
*   finds a pass in flight is dropped, never queued, and the guard is released
*   on every exit path because it is a scoped `MutexGuard`.
* - A pass runs: load and validate config, confirm both deployments exist,
*   list and classify nodes, decide, scale the GPU deployment then the CPU
*   deployment, publish status.
* - `on_trigger` never returns an error. Failures are classified, logged and,
*   where the AIGen object still exists, published as a degraded status with
*   `activeDeployment = "none"`.
*
* SPDX-License-Identifier: Apache-2.0
*/

use crate::config::ClusterConfig;
use crate::controllers::scale_actuator::ScaleActuator;
use crate::controllers::status_reconciler::{StatusOutcome, StatusReconciler};
use crate::error::{GatewayError, ReconcileError};
use crate::gateway::ClusterGateway;
use crate::metrics;
use crate::nodes::{ClusterState, GpuSelector};
use crate::policy::{decide, ActiveWorkload, DesiredAllocation};
use crate::retry::RetryPolicy;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// What woke the orchestrator up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    NodeEvent,
    ResourceEvent,
    Timer,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::NodeEvent => "node-event",
            TriggerSource::ResourceEvent => "resource-event",
            TriggerSource::Timer => "timer",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass held the guard; this trigger was dropped.
    Skipped,
    Converged(DesiredAllocation),
    /// The failure was published as a degraded status.
    Degraded(String),
    /// The failure could not be published.
    Failed(String),
}

impl PassOutcome {
    fn label(&self) -> &'static str {
        match self {
            PassOutcome::Skipped => "skipped",
            PassOutcome::Converged(_) => "converged",
            PassOutcome::Degraded(_) => "degraded",
            PassOutcome::Failed(_) => "failed",
        }
    }
}

pub struct Orchestrator<G: ?Sized> {
    gateway: Arc<G>,
    retry: RetryPolicy,
    selector: GpuSelector,
    guard: Mutex<()>,
}

impl<G: ClusterGateway + ?Sized> Orchestrator<G> {
    pub fn new(gateway: Arc<G>, retry: RetryPolicy, selector: GpuSelector) -> Self {
        Orchestrator {
            gateway,
            retry,
            selector,
            guard: Mutex::new(()),
        }
    }

    /// Runs one reconciliation pass unless one is already in flight.
    #[instrument(skip_all, fields(source = %source))]
    pub async fn on_trigger(&self, source: TriggerSource) -> PassOutcome {
        metrics::AIGEN_TRIGGERS_TOTAL
            .with_label_values(&[source.as_str()])
            .inc();

        let _guard = match self.guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Reconciliation already in progress; dropping trigger");
                metrics::AIGEN_TRIGGERS_DROPPED_TOTAL
                    .with_label_values(&[source.as_str()])
                    .inc();
                return PassOutcome::Skipped;
            }
        };

        let started = Instant::now();
        let outcome = self.reconcile().await;
        metrics::AIGEN_RECONCILE_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        metrics::AIGEN_RECONCILE_PASSES_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();
        outcome
    }

    async fn reconcile(&self) -> PassOutcome {
        let config = match self.load_config().await {
            Ok(config) => config,
            Err(err) => return self.degrade(err, None).await,
        };

        let allocation = match self.converge(&config).await {
            Ok(allocation) => allocation,
            Err(err) => return self.degrade(err, Some(&config)).await,
        };

        let active_name = match allocation.active {
            ActiveWorkload::Gpu => config.gpu_workload_name.as_str(),
            ActiveWorkload::Cpu => config.cpu_workload_name.as_str(),
            ActiveWorkload::None => "none",
        };

        let status = StatusReconciler::new(self.gateway.as_ref(), &self.retry);
        match status
            .publish_status(
                active_name,
                &config.target_namespace,
                &allocation.reason,
                allocation.active_replicas(),
            )
            .await
        {
            Ok(StatusOutcome::ResourceMissing) => {
                PassOutcome::Failed("AIGen resource disappeared during reconciliation".to_string())
            }
            Ok(_) => {
                info!(
                    active = %allocation.active,
                    cpu_target = allocation.cpu_target,
                    gpu_target = allocation.gpu_target,
                    reason = %allocation.reason,
                    "Reconciliation complete"
                );
                PassOutcome::Converged(allocation)
            }
            Err(err) => {
                error!(error = %err, "Scaled deployments but could not publish status");
                PassOutcome::Failed(err.to_string())
            }
        }
    }

    async fn load_config(&self) -> Result<ClusterConfig, ReconcileError> {
        let spec = self
            .retry
            .run("get_config", || self.gateway.get_config())
            .await
            .map_err(|e| match e {
                GatewayError::NotFound { .. } => ReconcileError::ResourceNotFound(e),
                other => ReconcileError::gateway("get_config", other),
            })?;
        Ok(ClusterConfig::from_spec(&spec)?)
    }

    async fn converge(&self, config: &ClusterConfig) -> Result<DesiredAllocation, ReconcileError> {
        let namespace = config.target_namespace.as_str();
        let actuator = ScaleActuator::new(self.gateway.as_ref(), &self.retry);

        let mut missing = Vec::new();
        for name in [&config.gpu_workload_name, &config.cpu_workload_name] {
            if actuator.current_replicas(name, namespace).await?.is_none() {
                missing.push(name.clone());
            }
        }
        if !missing.is_empty() {
            return Err(ReconcileError::WorkloadsMissing {
                namespace: namespace.to_string(),
                names: missing,
            });
        }

        let nodes = self
            .retry
            .run("list_nodes", || self.gateway.list_nodes())
            .await
            .map_err(|e| ReconcileError::gateway("list_nodes", e))?;
        let state = ClusterState::from_nodes(&nodes, &self.selector);
        metrics::AIGEN_ELIGIBLE_NODES.set(state.eligible as i64);
        metrics::AIGEN_INELIGIBLE_NODES.set(state.ineligible as i64);
        debug!(eligible = state.eligible, ineligible = state.ineligible, "Classified nodes");

        let allocation = decide(state.eligible, state.ineligible, config);
        info!(active = %allocation.active, reason = %allocation.reason, "Selected active deployment");

        actuator
            .apply_scale(&config.gpu_workload_name, namespace, allocation.gpu_target)
            .await?;
        actuator
            .apply_scale(&config.cpu_workload_name, namespace, allocation.cpu_target)
            .await?;

        Ok(allocation)
    }

    /// Reports a failed pass through the status, when the resource still exists.
    async fn degrade(&self, err: ReconcileError, config: Option<&ClusterConfig>) -> PassOutcome {
        let reason = err.to_string();

        if let ReconcileError::ResourceNotFound(_) = err {
            warn!(error = %err, "AIGen resource not found; nothing to reconcile");
            return PassOutcome::Failed(reason);
        }

        match &err {
            ReconcileError::Configuration(_) | ReconcileError::WorkloadsMissing { .. } => {
                warn!(error = %err, "Reconciliation degraded")
            }
            _ => error!(error = %err, "Reconciliation failed"),
        }

        let namespace = config.map(|c| c.target_namespace.as_str()).unwrap_or("");
        let status = StatusReconciler::new(self.gateway.as_ref(), &self.retry);
        match status
            .publish_status(&ActiveWorkload::None.to_string(), namespace, &reason, 0)
            .await
        {
            Ok(StatusOutcome::ResourceMissing) => PassOutcome::Failed(reason),
            Ok(_) => PassOutcome::Degraded(reason),
            Err(publish_err) => {
                error!(error = %publish_err, "Could not publish degraded status");
                PassOutcome::Failed(reason)
            }
        }
    }
}
