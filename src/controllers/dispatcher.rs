/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/controllers/dispatcher.rs
*
* Owns the three trigger sources and forwards each event to
* `Orchestrator::on_trigger`.
*
* - Node watcher: every add, change or removal of a Node, plus the end of the
*   initial listing.
* - AIGen watcher: the single managed object, selected by name.
* - Ticker: a periodic pass that repairs anything the watches missed.
*
* Both watch streams back off exponentially after an error, so an unreachable
* API server produces a reconnect every few seconds rather than a busy loop.
*
* Each trigger is spawned as its own task. Overlapping triggers are resolved
* by the orchestrator's single-flight guard, so nothing here needs to queue
* or coalesce events.
*
* SPDX-License-Identifier: Apache-2.0
*/

use crate::controllers::orchestrator::{Orchestrator, TriggerSource};
use crate::crds::AIGen;
use crate::gateway::ClusterGateway;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::{
    api::{Api, ApiResource, DynamicObject},
    Client,
};
use kube_runtime::{watcher, WatchStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Where the dispatcher watches and how often it ticks.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub namespace: String,
    pub cr_name: String,
    pub interval: Duration,
}

/// Runs all trigger sources until one of them stops.
pub async fn run<G>(orchestrator: Arc<Orchestrator<G>>, client: Client, config: DispatchConfig)
where
    G: ClusterGateway + 'static,
{
    let nodes: Api<Node> = Api::all(client.clone());
    let node_events = paced(watcher(nodes, watcher::Config::default()));

    let resource = ApiResource::erase::<AIGen>(&());
    let aigens: Api<DynamicObject> = Api::namespaced_with(client, &config.namespace, &resource);
    let aigen_events = paced(watcher(
        aigens,
        watcher::Config::default().fields(&format!("metadata.name={}", config.cr_name)),
    ));

    info!(
        namespace = %config.namespace,
        name = %config.cr_name,
        interval_secs = config.interval.as_secs(),
        "Starting trigger sources"
    );

    tokio::select! {
        _ = forward(node_events, TriggerSource::NodeEvent, orchestrator.clone()) => {
            warn!("Node watch stream has unexpectedly ended.")
        }
        _ = forward(aigen_events, TriggerSource::ResourceEvent, orchestrator.clone()) => {
            warn!("AIGen watch stream has unexpectedly ended.")
        }
        _ = tick(config.interval, orchestrator) => {
            warn!("Reconcile ticker has unexpectedly stopped.")
        }
    }
}

/// Delays the next poll after each watch error.
fn paced<K, S>(events: S) -> impl Stream<Item = Result<watcher::Event<K>, watcher::Error>>
where
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
{
    events.default_backoff()
}

async fn forward<K, S, G>(events: S, source: TriggerSource, orchestrator: Arc<Orchestrator<G>>)
where
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
    G: ClusterGateway + 'static,
{
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(watcher::Event::Apply(_)) | Ok(watcher::Event::Delete(_)) | Ok(watcher::Event::InitDone) => {
                debug!(%source, "Watch event received; triggering reconciliation");
                spawn_trigger(&orchestrator, source);
            }
            Ok(_) => {}
            Err(e) => warn!(%source, error = %e, "Watch stream error; the watcher will retry"),
        }
    }
}

async fn tick<G>(interval: Duration, orchestrator: Arc<Orchestrator<G>>)
where
    G: ClusterGateway + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        debug!(interval_secs = interval.as_secs(), "Periodic reconciliation triggered");
        spawn_trigger(&orchestrator, TriggerSource::Timer);
    }
}

fn spawn_trigger<G>(orchestrator: &Arc<Orchestrator<G>>, source: TriggerSource)
where
    G: ClusterGateway + 'static,
{
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        orchestrator.on_trigger(source).await;
    });
}
