/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/config.rs
*
* Validation of the AIGen spec into a `ClusterConfig`.
*
* The gateway hands over the spec as an untyped JSON document. Parsing it here,
* field by field, lets every problem be reported with the exact key that is
* wrong, which is what ends up in the resource status for the operator to read.
*
* SPDX-License-Identifier: Apache-2.0
*/

use crate::crds::SizingPolicy;
use crate::error::ConfigError;
use serde_json::{Map, Value};

pub const DEFAULT_REPLICAS: i32 = 1;

/// The validated desired configuration of one AIGen resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub target_namespace: String,
    pub cpu_workload_name: String,
    pub gpu_workload_name: String,
    pub replicas: i32,
    pub sizing: SizingPolicy,
}

impl ClusterConfig {
    /// Builds a config from the raw `spec` document of the custom resource.
    pub fn from_spec(spec: &Value) -> Result<Self, ConfigError> {
        let fields = match spec {
            Value::Object(fields) => fields,
            Value::Null => return Err(ConfigError::MissingField("spec")),
            _ => {
                return Err(ConfigError::InvalidField {
                    field: "spec",
                    reason: "expected an object".to_string(),
                })
            }
        };

        Ok(ClusterConfig {
            target_namespace: required_string(fields, "targetNamespace")?,
            cpu_workload_name: required_string(fields, "cpuDeployment")?,
            gpu_workload_name: required_string(fields, "gpuDeployment")?,
            replicas: replicas(fields)?,
            sizing: sizing(fields)?,
        })
    }
}

fn required_string(fields: &Map<String, Value>, key: &'static str) -> Result<String, ConfigError> {
    match fields.get(key) {
        None | Some(Value::Null) => Err(ConfigError::MissingField(key)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ConfigError::InvalidField {
            field: key,
            reason: "must not be empty".to_string(),
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ConfigError::InvalidField {
            field: key,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

fn replicas(fields: &Map<String, Value>) -> Result<i32, ConfigError> {
    let value = match fields.get("replicas") {
        None | Some(Value::Null) => return Ok(DEFAULT_REPLICAS),
        Some(value) => value,
    };

    value
        .as_i64()
        .filter(|n| *n >= 0)
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| ConfigError::InvalidField {
            field: "replicas",
            reason: format!("expected a non-negative integer, got {}", value),
        })
}

fn sizing(fields: &Map<String, Value>) -> Result<SizingPolicy, ConfigError> {
    match fields.get("sizing") {
        None | Some(Value::Null) => Ok(SizingPolicy::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|_| ConfigError::InvalidField {
            field: "sizing",
            reason: format!("expected \"fixed\" or \"perEligibleNode\", got {}", value),
        }),
    }
}
