/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/policy.rs
*
* The desired-state policy: node eligibility counts plus the validated config
* in, one target per managed deployment out.
*
* The switch is binary. A single eligible node is enough to move the whole
* workload to the GPU deployment, no matter how many CPU-only nodes exist, and
* exactly one of the two targets is ever nonzero.
*
* SPDX-License-Identifier: Apache-2.0
*/

use crate::config::ClusterConfig;
use crate::crds::SizingPolicy;
use std::fmt;

/// Which managed deployment a status record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveWorkload {
    Cpu,
    Gpu,
    None,
}

impl fmt::Display for ActiveWorkload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveWorkload::Cpu => write!(f, "cpu"),
            ActiveWorkload::Gpu => write!(f, "gpu"),
            ActiveWorkload::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredAllocation {
    pub active: ActiveWorkload,
    pub cpu_target: i32,
    pub gpu_target: i32,
    pub reason: String,
}

impl DesiredAllocation {
    /// Replica count of whichever deployment is active.
    pub fn active_replicas(&self) -> i32 {
        match self.active {
            ActiveWorkload::Cpu => self.cpu_target,
            ActiveWorkload::Gpu => self.gpu_target,
            ActiveWorkload::None => 0,
        }
    }
}

pub fn decide(eligible: usize, ineligible: usize, config: &ClusterConfig) -> DesiredAllocation {
    if eligible > 0 {
        DesiredAllocation {
            active: ActiveWorkload::Gpu,
            cpu_target: 0,
            gpu_target: target(config, eligible),
            reason: format!("GPU nodes detected: {}", eligible),
        }
    } else {
        DesiredAllocation {
            active: ActiveWorkload::Cpu,
            cpu_target: target(config, ineligible),
            gpu_target: 0,
            reason: format!("CPU nodes detected: {}", ineligible),
        }
    }
}

fn target(config: &ClusterConfig, nodes: usize) -> i32 {
    match config.sizing {
        SizingPolicy::Fixed => config.replicas,
        SizingPolicy::PerEligibleNode => {
            let nodes = i32::try_from(nodes.max(1)).unwrap_or(i32::MAX);
            config.replicas.saturating_mul(nodes)
        }
    }
}
