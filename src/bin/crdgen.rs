/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/bin/crdgen.rs
*
* Prints the AIGen CustomResourceDefinition as YAML, ready for
* `kubectl apply -f -`.
*
* SPDX-License-Identifier: Apache-2.0
*/

use aigen_operator::crds::AIGen;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&AIGen::crd())?);
    Ok(())
}
