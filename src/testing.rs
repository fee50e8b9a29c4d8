/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/testing.rs
*
* In-memory `ClusterGateway` used by the unit tests of the actuator, the
* status reconciler and the orchestrator. It records every mutation, can be
* scripted to fail with queued errors, and can hold `list_nodes` open so a
* test can observe a pass in flight.
*
* SPDX-License-Identifier: Apache-2.0
*/

use crate::error::GatewayError;
use crate::gateway::{ClusterGateway, StatusDocument};
use crate::nodes::NodeRecord;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub const NAMESPACE: &str = "ml";
pub const CPU: &str = "infer-cpu";
pub const GPU: &str = "infer-gpu";

/// Retries without sleeping.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub nodes: Mutex<Vec<NodeRecord>>,
    /// `None` means the AIGen object does not exist.
    pub spec: Mutex<Option<Value>>,
    pub status: Mutex<Option<StatusDocument>>,
    /// Keyed by `(namespace, name)`.
    pub workloads: Mutex<BTreeMap<(String, String), i32>>,
    pub scale_patches: Mutex<Vec<(String, i32)>>,
    pub status_patches: Mutex<Vec<StatusDocument>>,
    pub scale_failures: Mutex<VecDeque<GatewayError>>,
    pub status_failures: Mutex<VecDeque<GatewayError>>,
    /// Number of `list_nodes` calls, one per pass that got past validation.
    pub listings: AtomicUsize,
    pub hold_listing: AtomicBool,
    pub listing_entered: Notify,
    pub listing_released: Notify,
}

impl FakeGateway {
    /// An AIGen for `infer-cpu`/`infer-gpu` in `ml`, both deployments at 0.
    pub fn healthy(nodes: Vec<NodeRecord>) -> Self {
        let gateway = FakeGateway::default();
        *gateway.nodes.lock().unwrap() = nodes;
        *gateway.spec.lock().unwrap() = Some(json!({
            "targetNamespace": NAMESPACE,
            "cpuDeployment": CPU,
            "gpuDeployment": GPU
        }));
        *gateway.status.lock().unwrap() = Some(StatusDocument::new());
        gateway.set_replicas(CPU, 0);
        gateway.set_replicas(GPU, 0);
        gateway
    }

    pub fn set_replicas(&self, name: &str, replicas: i32) {
        self.workloads
            .lock()
            .unwrap()
            .insert((NAMESPACE.to_string(), name.to_string()), replicas);
    }

    pub fn remove_workload(&self, name: &str) {
        self.workloads
            .lock()
            .unwrap()
            .remove(&(NAMESPACE.to_string(), name.to_string()));
    }

    pub fn replicas(&self, name: &str) -> Option<i32> {
        self.workloads
            .lock()
            .unwrap()
            .get(&(NAMESPACE.to_string(), name.to_string()))
            .copied()
    }

    pub fn scale_patch_count(&self) -> usize {
        self.scale_patches.lock().unwrap().len()
    }

    pub fn status_patch_count(&self) -> usize {
        self.status_patches.lock().unwrap().len()
    }

    pub fn current_status(&self) -> StatusDocument {
        self.status.lock().unwrap().clone().unwrap_or_default()
    }

    fn aigen_missing() -> GatewayError {
        GatewayError::not_found("AIGen", "whiz-operator/aigen")
    }
}

#[async_trait]
impl ClusterGateway for FakeGateway {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, GatewayError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.hold_listing.load(Ordering::SeqCst) {
            self.listing_entered.notify_one();
            self.listing_released.notified().await;
        }
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn get_config(&self) -> Result<Value, GatewayError> {
        self.spec
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(Self::aigen_missing)
    }

    async fn read_workload_replicas(&self, name: &str, namespace: &str) -> Result<i32, GatewayError> {
        self.workloads
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
            .ok_or_else(|| GatewayError::not_found("Deployment", format!("{}/{}", namespace, name)))
    }

    async fn patch_workload_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), GatewayError> {
        if let Some(err) = self.scale_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut workloads = self.workloads.lock().unwrap();
        let current = workloads
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| GatewayError::not_found("Deployment", format!("{}/{}", namespace, name)))?;
        *current = replicas;
        self.scale_patches
            .lock()
            .unwrap()
            .push((name.to_string(), replicas));
        Ok(())
    }

    async fn read_status(&self) -> Result<StatusDocument, GatewayError> {
        self.status
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(Self::aigen_missing)
    }

    async fn patch_status(&self, merged: StatusDocument) -> Result<(), GatewayError> {
        if let Some(err) = self.status_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut status = self.status.lock().unwrap();
        match status.as_mut() {
            Some(current) => {
                *current = merged.clone();
                self.status_patches.lock().unwrap().push(merged);
                Ok(())
            }
            None => Err(Self::aigen_missing()),
        }
    }
}
