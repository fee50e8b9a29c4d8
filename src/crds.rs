/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/crds.rs
*
* This file defines the Rust data structures that correspond to the AIGen
* Custom Resource Definition. The `kube::CustomResource` derive macro gives a
* strongly-typed representation of the API, which is used to generate the CRD
* manifest (see `bin/crdgen.rs`) and to address the object through
* `ApiResource` in the gateway.
*
* Architecture:
* - The `#[kube(...)]` attribute maps the struct to the `infra.whiz.ai/v1`
*   `AIGen` kind. This metadata MUST match the deployed CRD.
* - The reconciliation core never deserializes the spec through these types:
*   it reads the raw document and validates it in `config.rs`, so a malformed
*   spec surfaces as a configuration error instead of a decode failure.
* - `AIGenStatus` is the status record the controller owns. Other writers may
*   add fields next to it; the status reconciler merges, it never replaces.
*
* SPDX-License-Identifier: Apache-2.0
*/

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "infra.whiz.ai",
    version = "v1",
    kind = "AIGen",
    plural = "aigens",
    namespaced,
    status = "AIGenStatus",
    printcolumn = r#"{"name":"Active", "type":"string", "jsonPath":".status.activeDeployment"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".status.activeReplicas"}"#,
    printcolumn = r#"{"name":"Reason", "type":"string", "jsonPath":".status.reason"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    shortname = "aig"
)]
#[serde(rename_all = "camelCase")]
pub struct AIGenSpec {
    /// Namespace holding both managed deployments.
    pub target_namespace: String,
    /// Deployment run when no schedulable GPU node exists.
    pub cpu_deployment: String,
    /// Deployment run when at least one schedulable GPU node exists.
    pub gpu_deployment: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizing: Option<SizingPolicy>,
}

fn default_replicas() -> u32 {
    1
}

/// How the active deployment's replica count is derived.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SizingPolicy {
    /// Always `replicas`.
    #[default]
    Fixed,
    /// `replicas` for every node on the active side.
    PerEligibleNode,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AIGenStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,
    #[serde(default)]
    pub active_deployment: String,
    #[serde(default)]
    pub active_namespace: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub active_replicas: i32,
}
