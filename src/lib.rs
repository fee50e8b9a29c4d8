/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/lib.rs
*
* Library root of the aigen-operator. The binaries in `src/main.rs` and
* `src/bin/crdgen.rs` are thin wrappers around the modules declared here.
*
* SPDX-License-Identifier: Apache-2.0
*/

pub mod config;
pub mod crds;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod nodes;
pub mod policy;
pub mod retry;
pub mod settings;

pub mod controllers {
    pub mod dispatcher;
    pub mod orchestrator;
    pub mod scale_actuator;
    pub mod status_reconciler;
}

#[cfg(test)]
mod testing;
