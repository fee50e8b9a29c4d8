/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/gateway.rs
*
* The Cluster Gateway: everything the reconciliation core needs from the
* Kubernetes API, behind one trait.
*
* Architecture:
* - `ClusterGateway` is the seam between the core and the platform. The
*   orchestrator receives an instance at construction, so tests substitute an
*   in-memory implementation and the binary passes `KubeGateway`.
* - `KubeGateway` talks to the API server through `kube`. The AIGen object is
*   read as a `DynamicObject` so the spec reaches `ClusterConfig::from_spec`
*   untouched. Replica counts go through the Deployment `scale` subresource.
* - Every `kube::Error` is classified into a `GatewayError` right here; nothing
*   above this module looks at HTTP status codes.
*
* SPDX-License-Identifier: Apache-2.0
*/

use crate::crds::AIGen;
use crate::error::GatewayError;
use crate::nodes::NodeRecord;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Node;
use kube::{
    api::{Api, ApiResource, DynamicObject, ListParams, Patch, PatchParams},
    Client,
};
use serde_json::{json, Map, Value};
use tracing::debug;

pub const FIELD_MANAGER: &str = "aigen-operator";

pub type StatusDocument = Map<String, Value>;

#[async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, GatewayError>;

    /// The raw `spec` of the managed AIGen resource.
    async fn get_config(&self) -> Result<Value, GatewayError>;

    async fn read_workload_replicas(&self, name: &str, namespace: &str) -> Result<i32, GatewayError>;

    async fn patch_workload_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), GatewayError>;

    /// The current `status` of the AIGen resource; empty when it has none yet.
    async fn read_status(&self) -> Result<StatusDocument, GatewayError>;

    /// Writes `merged` as the complete status document.
    async fn patch_status(&self, merged: StatusDocument) -> Result<(), GatewayError>;
}

/// `ClusterGateway` backed by a live API server.
pub struct KubeGateway {
    client: Client,
    namespace: String,
    name: String,
    resource: ApiResource,
}

impl KubeGateway {
    pub fn new(client: Client, namespace: &str, name: &str) -> Self {
        KubeGateway {
            client,
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource: ApiResource::erase::<AIGen>(&()),
        }
    }

    fn aigen_api(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &self.resource)
    }

    fn aigen_error(&self, err: kube::Error) -> GatewayError {
        GatewayError::from_kube(err, "AIGen", &format!("{}/{}", self.namespace, self.name))
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, GatewayError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| GatewayError::from_kube(e, "NodeList", "*"))?;
        Ok(list.items.iter().map(NodeRecord::from).collect())
    }

    async fn get_config(&self) -> Result<Value, GatewayError> {
        let obj = self
            .aigen_api()
            .get(&self.name)
            .await
            .map_err(|e| self.aigen_error(e))?;
        Ok(obj.data.get("spec").cloned().unwrap_or(Value::Null))
    }

    async fn read_workload_replicas(&self, name: &str, namespace: &str) -> Result<i32, GatewayError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let scale = deployments
            .get_scale(name)
            .await
            .map_err(|e| GatewayError::from_kube(e, "Deployment", &format!("{}/{}", namespace, name)))?;
        Ok(scale.spec.and_then(|s| s.replicas).unwrap_or(0))
    }

    async fn patch_workload_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), GatewayError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "spec": { "replicas": replicas } });
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        deployments
            .patch_scale(name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| GatewayError::from_kube(e, "Deployment", &format!("{}/{}", namespace, name)))?;
        debug!(deployment = %name, namespace = %namespace, replicas, "Patched deployment scale");
        Ok(())
    }

    async fn read_status(&self) -> Result<StatusDocument, GatewayError> {
        let obj = self
            .aigen_api()
            .get_status(&self.name)
            .await
            .map_err(|e| self.aigen_error(e))?;
        match obj.data.get("status") {
            Some(Value::Object(status)) => Ok(status.clone()),
            _ => Ok(StatusDocument::new()),
        }
    }

    async fn patch_status(&self, merged: StatusDocument) -> Result<(), GatewayError> {
        let patch = json!({ "status": merged });
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.aigen_api()
            .patch_status(&self.name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| self.aigen_error(e))?;
        Ok(())
    }
}
