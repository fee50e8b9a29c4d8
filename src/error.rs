/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/error.rs
*
* This file defines the error taxonomy shared by the reconciliation core.
*
* - `GatewayError` is what the Cluster Gateway reports for a single call. It
*   separates "the object is absent" from "try again later" from "the API
*   refused the request", which is all the retry policy needs to know.
* - `ConfigError` describes a malformed or incomplete AIGen spec. It is fatal
*   to the pass and only an operator editing the resource can fix it.
* - `ReconcileError` is the orchestrator-internal classification. It never
*   escapes `Orchestrator::on_trigger`; every variant is turned into a log
*   event and, where possible, a degraded status.
*
* SPDX-License-Identifier: Apache-2.0
*/

use thiserror::Error;

/// Failure of a single Cluster Gateway call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("transient cluster API failure: {0}")]
    Transient(String),

    #[error("cluster API rejected the request: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        GatewayError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Only transient failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }

    /// Classifies a `kube` client error for the object `kind`/`name`.
    pub fn from_kube(err: kube::Error, kind: &'static str, name: &str) -> Self {
        match &err {
            kube::Error::Api(ae) if ae.code == 404 => GatewayError::not_found(kind, name),
            kube::Error::Api(ae) if ae.code == 409 || ae.code == 429 || ae.code >= 500 => {
                GatewayError::Transient(err.to_string())
            }
            kube::Error::HyperError(_) | kube::Error::Service(_) => {
                GatewayError::Transient(err.to_string())
            }
            _ => GatewayError::Rejected(err.to_string()),
        }
    }
}

/// A problem with the AIGen spec itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Missing deployment(s) in namespace '{namespace}': {}", names.join(", "))]
    WorkloadsMissing { namespace: String, names: Vec<String> },

    /// The managed AIGen object itself is gone; nothing can be published.
    #[error("{0}")]
    ResourceNotFound(GatewayError),

    #[error("Cluster API failure during {operation}: {source}")]
    Gateway {
        operation: &'static str,
        #[source]
        source: GatewayError,
    },
}

impl ReconcileError {
    pub fn gateway(operation: &'static str, source: GatewayError) -> Self {
        ReconcileError::Gateway { operation, source }
    }
}
