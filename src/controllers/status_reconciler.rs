/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/controllers/status_reconciler.rs
*
* Publishes the outcome of a pass into the AIGen status.
*
* The status object is shared with other writers, so the existing document is
* read, our fields are merged into it and the merged document is written back.
* When every field except `lastSyncTime` already holds the new value the write
* is skipped entirely; otherwise each periodic pass would bump the resource
* version and wake every watcher of the object.
*
* SPDX-License-Identifier: Apache-2.0
*/

use crate::crds::AIGenStatus;
use crate::error::{GatewayError, ReconcileError};
use crate::gateway::{ClusterGateway, StatusDocument};
use crate::metrics;
use crate::retry::RetryPolicy;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

const TIMESTAMP_FIELD: &str = "lastSyncTime";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Written,
    Unchanged,
    /// The AIGen object disappeared; nothing was written.
    ResourceMissing,
}

pub struct StatusReconciler<'a, G: ?Sized> {
    gateway: &'a G,
    retry: &'a RetryPolicy,
}

impl<'a, G: ClusterGateway + ?Sized> StatusReconciler<'a, G> {
    pub fn new(gateway: &'a G, retry: &'a RetryPolicy) -> Self {
        StatusReconciler { gateway, retry }
    }

    pub async fn publish_status(
        &self,
        active_deployment: &str,
        namespace: &str,
        reason: &str,
        replicas: i32,
    ) -> Result<StatusOutcome, ReconcileError> {
        let existing = match self
            .retry
            .run("read_status", || self.gateway.read_status())
            .await
        {
            Ok(existing) => existing,
            Err(err @ GatewayError::NotFound { .. }) => return Ok(resource_missing(&err)),
            Err(err) => return Err(ReconcileError::gateway("read_status", err)),
        };

        let desired = status_fields(&AIGenStatus {
            last_sync_time: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            active_deployment: active_deployment.to_string(),
            active_namespace: namespace.to_string(),
            reason: reason.to_string(),
            active_replicas: replicas,
        });

        if !differs(&existing, &desired) {
            debug!(active_deployment, reason, "Status already up to date; skipping write");
            return Ok(StatusOutcome::Unchanged);
        }

        let mut merged = existing;
        merged.extend(desired);

        match self
            .retry
            .run("patch_status", || self.gateway.patch_status(merged.clone()))
            .await
        {
            Ok(()) => {
                metrics::AIGEN_STATUS_WRITES_TOTAL.inc();
                info!(active_deployment, namespace, reason, replicas, "Updated AIGen status");
                Ok(StatusOutcome::Written)
            }
            Err(err @ GatewayError::NotFound { .. }) => Ok(resource_missing(&err)),
            Err(err) => Err(ReconcileError::gateway("patch_status", err)),
        }
    }
}

fn status_fields(status: &AIGenStatus) -> StatusDocument {
    match serde_json::to_value(status) {
        Ok(Value::Object(fields)) => fields,
        _ => StatusDocument::new(),
    }
}

/// True when any field other than the sync timestamp would change.
fn differs(existing: &StatusDocument, desired: &StatusDocument) -> bool {
    desired
        .iter()
        .filter(|(key, _)| key.as_str() != TIMESTAMP_FIELD)
        .any(|(key, value)| existing.get(key) != Some(value))
}

fn resource_missing(err: &GatewayError) -> StatusOutcome {
    warn!(error = %err, "AIGen resource not found; dropping status update");
    StatusOutcome::ResourceMissing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_retry, FakeGateway, GPU, NAMESPACE};
    use serde_json::json;

    #[tokio::test]
    async fn test_first_publication_writes_all_fields() {
        let gateway = FakeGateway::healthy(vec![]);
        let retry = fast_retry();
        let reconciler = StatusReconciler::new(&gateway, &retry);

        let outcome = reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 1", 1)
            .await
            .unwrap();

        assert_eq!(outcome, StatusOutcome::Written);
        let status = gateway.current_status();
        assert_eq!(status["activeDeployment"], GPU);
        assert_eq!(status["activeNamespace"], NAMESPACE);
        assert_eq!(status["reason"], "GPU nodes detected: 1");
        assert_eq!(status["activeReplicas"], 1);
        assert!(status["lastSyncTime"].is_string());
    }

    #[tokio::test]
    async fn test_identical_content_is_written_once() {
        let gateway = FakeGateway::healthy(vec![]);
        let retry = fast_retry();
        let reconciler = StatusReconciler::new(&gateway, &retry);

        reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 1", 1)
            .await
            .unwrap();
        let second = reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 1", 1)
            .await
            .unwrap();

        assert_eq!(second, StatusOutcome::Unchanged);
        assert_eq!(gateway.status_patch_count(), 1);
    }

    #[tokio::test]
    async fn test_changed_reason_is_written() {
        let gateway = FakeGateway::healthy(vec![]);
        let retry = fast_retry();
        let reconciler = StatusReconciler::new(&gateway, &retry);

        reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 1", 1)
            .await
            .unwrap();
        let second = reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 2", 1)
            .await
            .unwrap();

        assert_eq!(second, StatusOutcome::Written);
        assert_eq!(gateway.status_patch_count(), 2);
    }

    #[tokio::test]
    async fn test_fields_owned_by_others_are_preserved() {
        let gateway = FakeGateway::healthy(vec![]);
        *gateway.status.lock().unwrap() = Some(
            json!({ "conditions": [{ "type": "Ready" }], "reason": "stale" })
                .as_object()
                .cloned()
                .unwrap(),
        );
        let retry = fast_retry();
        let reconciler = StatusReconciler::new(&gateway, &retry);

        reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 1", 1)
            .await
            .unwrap();

        let status = gateway.current_status();
        assert_eq!(status["conditions"], json!([{ "type": "Ready" }]));
        assert_eq!(status["reason"], "GPU nodes detected: 1");
    }

    #[tokio::test]
    async fn test_missing_resource_is_swallowed() {
        let gateway = FakeGateway::healthy(vec![]);
        *gateway.status.lock().unwrap() = None;
        let retry = fast_retry();
        let reconciler = StatusReconciler::new(&gateway, &retry);

        let outcome = reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 1", 1)
            .await
            .unwrap();

        assert_eq!(outcome, StatusOutcome::ResourceMissing);
        assert_eq!(gateway.status_patch_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_write_failure_is_retried() {
        let gateway = FakeGateway::healthy(vec![]);
        gateway
            .status_failures
            .lock()
            .unwrap()
            .push_back(GatewayError::Transient("timeout".to_string()));
        let retry = fast_retry();
        let reconciler = StatusReconciler::new(&gateway, &retry);

        let outcome = reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 1", 1)
            .await
            .unwrap();

        assert_eq!(outcome, StatusOutcome::Written);
        assert_eq!(gateway.status_patch_count(), 1);
    }

    #[tokio::test]
    async fn test_resource_deleted_between_read_and_write_is_swallowed() {
        let gateway = FakeGateway::healthy(vec![]);
        gateway
            .status_failures
            .lock()
            .unwrap()
            .push_back(GatewayError::not_found("AIGen", "whiz-operator/aigen"));
        let retry = fast_retry();
        let reconciler = StatusReconciler::new(&gateway, &retry);

        let outcome = reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 1", 1)
            .await
            .unwrap();

        assert_eq!(outcome, StatusOutcome::ResourceMissing);
        assert_eq!(gateway.status_patch_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_write_retries_surface_the_error() {
        let gateway = FakeGateway::healthy(vec![]);
        gateway
            .status_failures
            .lock()
            .unwrap()
            .extend((0..3).map(|_| GatewayError::Transient("503".to_string())));
        let retry = fast_retry();
        let reconciler = StatusReconciler::new(&gateway, &retry);

        let err = reconciler
            .publish_status(GPU, NAMESPACE, "GPU nodes detected: 1", 1)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Gateway {
                operation: "patch_status",
                source: GatewayError::Transient(_)
            }
        ));
        assert_eq!(gateway.status_patch_count(), 0);
        assert!(gateway.status_failures.lock().unwrap().is_empty());
    }

    #[test]
    fn test_timestamp_alone_does_not_count_as_a_change() {
        let existing = json!({
            "lastSyncTime": "2025-01-01T00:00:00Z",
            "activeDeployment": GPU,
            "activeNamespace": NAMESPACE,
            "reason": "GPU nodes detected: 1",
            "activeReplicas": 1
        });
        let desired = json!({
            "lastSyncTime": "2025-06-01T00:00:00Z",
            "activeDeployment": GPU,
            "activeNamespace": NAMESPACE,
            "reason": "GPU nodes detected: 1",
            "activeReplicas": 1
        });
        assert!(!differs(
            existing.as_object().unwrap(),
            desired.as_object().unwrap()
        ));
    }
}
