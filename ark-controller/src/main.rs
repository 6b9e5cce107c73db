//! `ark-controller`: the Query Reconciler process.
//!
//! Wires a periodic resync over `Query` objects into the scheduler's work
//! queue and worker pool; each worker drains the queue and
//! calls [`reconciler::reconcile`] for whatever key it pops.

mod backends;
mod backoff;
mod duration;
mod error;
mod executor;
mod reconciler;
mod status;

use crate::backends::{DnsServiceAddressBook, K8sConfigBackend, K8sQueryReader, K8sSecretBackend};
use crate::executor::K8sTargetExecutor;
use crate::reconciler::ReconcileContext;
use ark_core::Query;
use ark_resolver::Resolver;
use ark_scheduler::{pool, SchedulerOutcome, WorkQueue};
use ark_tools::{BuiltinRegistry, ToolExecutor};
use clap::Parser;
use kube::api::{Api, ListParams};
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// A Query identified by namespace and name; the unit of work the
/// scheduler dedups, delays, and rate-limits.
type QueryKey = (String, String);

#[derive(Parser, Debug)]
#[command(name = "ark-controller", about = "Query Reconciler for the ARK query execution engine")]
struct Args {
    /// Restrict reconciliation to a single namespace; unset watches the whole cluster.
    #[arg(long, env = "ARK_NAMESPACE")]
    namespace: Option<String>,

    /// Number of concurrent reconcile workers.
    #[arg(long, env = "ARK_WORKERS", default_value_t = pool::DEFAULT_WORKERS)]
    workers: usize,

    /// How often to re-list every Query and re-enqueue it, as a safety net
    /// against missed triggers.
    #[arg(long, env = "ARK_RESYNC_SECONDS", default_value_t = 30)]
    resync_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let client = kube::Client::try_default().await?;

    let tools = Arc::new(ToolExecutor::new(BuiltinRegistry::new())?);
    let resolver = Arc::new(Resolver::new(
        Arc::new(K8sSecretBackend::new(client.clone())),
        Arc::new(K8sConfigBackend::new(client.clone())),
        Arc::new(DnsServiceAddressBook),
        Arc::new(K8sQueryReader::new(client.clone())),
    ));
    let executor = Arc::new(K8sTargetExecutor::new(client.clone(), Arc::clone(&resolver), tools));

    let ctx = Arc::new(ReconcileContext { client: client.clone(), executor, resolver });
    let queue: Arc<WorkQueue<QueryKey>> = Arc::new(WorkQueue::new());

    info!(workers = args.workers, namespace = ?args.namespace, "starting ark-controller");

    let worker_handles = pool::spawn(Arc::clone(&queue), args.workers, {
        let ctx = Arc::clone(&ctx);
        move |key: QueryKey| {
            let ctx = Arc::clone(&ctx);
            async move {
                match reconciler::reconcile(&key.0, &key.1, &ctx).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error!(namespace = %key.0, query = %key.1, error = %err, "reconcile failed");
                        SchedulerOutcome::RequeueAfter(Duration::from_secs(5))
                    }
                }
            }
        }
    });

    let resync_queue = Arc::clone(&queue);
    let resync_client = client.clone();
    let resync_namespace = args.namespace.clone();
    let resync_handle = tokio::spawn(async move {
        loop {
            if let Err(err) = resync_once(&resync_client, resync_namespace.as_deref(), &resync_queue).await {
                warn!(error = %err, "resync list failed, will retry next tick");
            }
            tokio::time::sleep(Duration::from_secs(args.resync_seconds)).await;
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    resync_handle.abort();
    for handle in worker_handles {
        handle.abort();
    }
    Ok(())
}

/// List every `Query` in scope and enqueue its key, so a missed or dropped
/// trigger is never fatal.
async fn resync_once(client: &kube::Client, namespace: Option<&str>, queue: &WorkQueue<QueryKey>) -> kube::Result<()> {
    let api: Api<Query> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    let queries = api.list(&ListParams::default()).await?;
    for query in queries.items {
        let ns = query.namespace().unwrap_or_default();
        let name = query.name_any();
        queue.enqueue((ns, name)).await;
    }
    Ok(())
}
