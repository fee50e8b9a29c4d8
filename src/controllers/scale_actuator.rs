/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/controllers/scale_actuator.rs
*
* Applies a replica target to one managed deployment.
*
* The current scale is read first and the patch is skipped when it already
* matches, so repeated passes over a converged cluster produce no writes and
* no rollout events. Both the read and the patch go through the retry policy;
* a missing deployment is reported as such and never retried.
*
* SPDX-License-Identifier: Apache-2.0
*/

use crate::error::{GatewayError, ReconcileError};
use crate::gateway::ClusterGateway;
use crate::metrics;
use crate::retry::RetryPolicy;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    Unchanged,
    Scaled { from: i32, to: i32 },
}

pub struct ScaleActuator<'a, G: ?Sized> {
    gateway: &'a G,
    retry: &'a RetryPolicy,
}

impl<'a, G: ClusterGateway + ?Sized> ScaleActuator<'a, G> {
    pub fn new(gateway: &'a G, retry: &'a RetryPolicy) -> Self {
        ScaleActuator { gateway, retry }
    }

    /// Current replica count of `name`, or `None` if the deployment is absent.
    pub async fn current_replicas(&self, name: &str, namespace: &str) -> Result<Option<i32>, ReconcileError> {
        match self
            .retry
            .run("read_scale", || self.gateway.read_workload_replicas(name, namespace))
            .await
        {
            Ok(replicas) => Ok(Some(replicas)),
            Err(GatewayError::NotFound { .. }) => Ok(None),
            Err(e) => Err(ReconcileError::gateway("read_scale", e)),
        }
    }

    pub async fn apply_scale(
        &self,
        name: &str,
        namespace: &str,
        target: i32,
    ) -> Result<ScaleOutcome, ReconcileError> {
        let current = self
            .current_replicas(name, namespace)
            .await?
            .ok_or_else(|| missing(name, namespace))?;

        if current == target {
            debug!(deployment = %name, namespace = %namespace, replicas = target, "Deployment already at target scale");
            return Ok(ScaleOutcome::Unchanged);
        }

        self.retry
            .run("patch_scale", || {
                self.gateway.patch_workload_replicas(name, namespace, target)
            })
            .await
            .map_err(|e| match e {
                GatewayError::NotFound { .. } => missing(name, namespace),
                other => ReconcileError::gateway("patch_scale", other),
            })?;

        metrics::AIGEN_SCALE_MUTATIONS_TOTAL
            .with_label_values(&[name])
            .inc();
        info!(deployment = %name, namespace = %namespace, from = current, to = target, "Scaled deployment");
        Ok(ScaleOutcome::Scaled {
            from: current,
            to: target,
        })
    }
}

fn missing(name: &str, namespace: &str) -> ReconcileError {
    ReconcileError::WorkloadsMissing {
        namespace: namespace.to_string(),
        names: vec![name.to_string()],
    }
}
