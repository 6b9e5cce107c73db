//! The Query Reconciler: the top-level state machine driving a
//! `Query` from `pending` through `running` to a terminal phase.
//!
//! Split into one function per phase so each step's status write is durable
//! before the next step runs — a crash between `pending` and `running`
//! leaves `resolved_targets` already persisted, and the next reconcile picks
//! up in `running` rather than re-expanding selectors.

use crate::backoff;
use crate::duration::parse_duration;
use crate::error::ReconcileError;
use crate::executor::TargetExecutor;
use crate::status::patch_status_with_retry;
use ark_core::{
    Agent, EngineError, ErrorKind, Message, Phase, Query, QueryEvent, QueryStatus, Response, StatusError, Target,
    TargetType,
};
use ark_memory::{MemoryClient, MemoryGateway, MessageFilter};
use ark_resolver::Resolver;
use ark_scheduler::SchedulerOutcome;
use ark_telemetry::Telemetry;
use chrono::{DateTime, Utc};
use kube::api::{Api, ListParams};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Query-level deadline when `spec.timeout` is unset.
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// How many times a recoverable target failure may requeue before the
/// Query gives up.
const MAX_TARGET_RETRIES: u32 = 5;

/// Everything a reconcile pass needs, shared across every Query it runs
pub struct ReconcileContext {
    pub client: kube::Client,
    pub executor: Arc<dyn TargetExecutor>,
    pub resolver: Arc<Resolver>,
}

/// Drive one reconciliation pass for `(namespace, name)`. Errors that reach
/// the caller are infrastructure failures (API server unreachable, status
/// conflict budget exhausted); everything about the Query's own execution
/// is captured in `status.error` and reported back as `SchedulerOutcome`.
pub async fn reconcile(namespace: &str, name: &str, ctx: &ReconcileContext) -> Result<SchedulerOutcome, ReconcileError> {
    let api: Api<Query> = Api::namespaced(ctx.client.clone(), namespace);

    let query = match api.get(name).await {
        Ok(query) => query,
        Err(kube::Error::Api(e)) if e.code == 404 => return Ok(SchedulerOutcome::Done),
        Err(e) => return Err(e.into()),
    };

    let status = query.status.clone().unwrap_or_default();

    // Re-reconciling a terminal Query is a no-op: no status diff, no side
    // effects.
    if status.phase.is_terminal() {
        return Ok(SchedulerOutcome::Done);
    }

    if query.meta().deletion_timestamp.is_some() {
        info!(query = name, namespace, "query deleted, canceling");
        patch_status_with_retry(&api, name, |s| {
            s.phase = Phase::Canceled;
            s.cancellation_reason = Some("query deleted".to_string());
            s.completed_at = Some(Utc::now());
        })
        .await?;
        return Ok(SchedulerOutcome::Done);
    }

    match status.phase {
        Phase::Pending | Phase::Unknown => reconcile_pending(&api, name, namespace, &query, ctx).await,
        Phase::Running => reconcile_running(&api, name, namespace, &query, ctx).await,
        // The evaluators pipeline is a consumer of Query results, not part
        // of this engine; nothing left for us to drive.
        Phase::Evaluating => Ok(SchedulerOutcome::Done),
        Phase::Done | Phase::Error | Phase::Canceled => Ok(SchedulerOutcome::Done),
    }
}

/// `pending`: record `startedAt`, expand selectors, transition to `running`
async fn reconcile_pending(
    api: &Api<Query>,
    name: &str,
    namespace: &str,
    query: &Query,
    ctx: &ReconcileContext,
) -> Result<SchedulerOutcome, ReconcileError> {
    let resolved_targets = expand_targets(ctx, namespace, query).await?;

    patch_status_with_retry(api, name, |s| {
        if s.started_at.is_none() {
            s.started_at = Some(Utc::now());
        }
        s.resolved_targets = resolved_targets.clone();
        s.phase = Phase::Running;
        s.events.push(QueryEvent {
            reason: "ReconcileStarted".to_string(),
            message: format!("resolved {} target(s)", resolved_targets.len()),
            timestamp: Utc::now(),
        });
    })
    .await?;

    // Requeue immediately rather than falling through to `running` inline:
    // the status write above is already durable, so a crash here just
    // repeats this (idempotent) phase-check on restart.
    Ok(SchedulerOutcome::RequeueAfter(Duration::ZERO))
}

/// If `spec.selector` names a label selector, replace the symbolic target
/// with every matching `Agent`. Otherwise the declared targets are
/// used as-is.
async fn expand_targets(ctx: &ReconcileContext, namespace: &str, query: &Query) -> Result<Vec<Target>, ReconcileError> {
    let Some(selector) = &query.spec.selector else {
        return Ok(query.spec.targets.clone());
    };

    let api: Api<Agent> = Api::namespaced(ctx.client.clone(), namespace);
    let agents = api.list(&ListParams::default().labels(selector)).await?;
    Ok(agents
        .items
        .into_iter()
        .map(|agent| Target {
            kind: TargetType::Agent,
            name: agent.name_any(),
            namespace: Some(namespace.to_string()),
        })
        .collect())
}

/// `running`: invoke each resolved target in order, persisting partial
/// responses as they complete, until all targets finish, the query times
/// out, or a target fails unrecoverably.
async fn reconcile_running(
    api: &Api<Query>,
    name: &str,
    namespace: &str,
    query: &Query,
    ctx: &ReconcileContext,
) -> Result<SchedulerOutcome, ReconcileError> {
    let status = query.status.clone().unwrap_or_default();
    let started_at = status.started_at.unwrap_or_else(Utc::now);

    let timeout = match &query.spec.timeout {
        Some(raw) => parse_duration(raw)?,
        None => DEFAULT_QUERY_TIMEOUT,
    };

    let Some(remaining) = time_remaining(started_at, timeout, Utc::now()) else {
        return timeout_out(api, name).await;
    };

    match run_targets(api, name, namespace, query, &status, ctx, remaining).await {
        Ok(()) => {
            patch_status_with_retry(api, name, |s| {
                s.phase = Phase::Done;
                s.completed_at = Some(Utc::now());
            })
            .await?;
            Ok(SchedulerOutcome::Done)
        }
        Err(TargetPassError::TimedOut) => timeout_out(api, name).await,
        Err(TargetPassError::Failed(err)) => handle_target_failure(api, name, err, status.retry_count).await,
        Err(TargetPassError::Reconcile(err)) => Err(err),
    }
}

/// How much of the query-level deadline is left, or `None` if it has
/// already elapsed.
fn time_remaining(started_at: DateTime<Utc>, timeout: Duration, now: DateTime<Utc>) -> Option<Duration> {
    let elapsed = (now - started_at).to_std().unwrap_or(Duration::ZERO);
    timeout.checked_sub(elapsed).filter(|d| !d.is_zero())
}

/// Whether `target` already has a recorded response, used to skip work already completed in
/// a prior reconcile pass after a crash or partial failure.
fn target_already_done(responses: &[Response], target: &Target) -> bool {
    responses.iter().any(|r| r.target.same_identity(target))
}

/// What the Query Reconciler should do with a surfaced [`EngineError`]: requeue with backoff while the retry budget holds, otherwise
/// transition the Query straight to `error`.
enum FailureDecision {
    Retry(Duration),
    Terminal,
}

fn decide_failure(kind: ErrorKind, retry_count: u32) -> FailureDecision {
    if kind.retryable() && retry_count < MAX_TARGET_RETRIES {
        FailureDecision::Retry(backoff::next_delay(retry_count))
    } else {
        FailureDecision::Terminal
    }
}

enum TargetPassError {
    TimedOut,
    Failed(EngineError),
    Reconcile(ReconcileError),
}

impl From<ReconcileError> for TargetPassError {
    fn from(e: ReconcileError) -> Self {
        TargetPassError::Reconcile(e)
    }
}

/// Resolve parameters/input, load session history, then dispatch every
/// not-yet-completed target . Returns once every target in
/// `status.resolved_targets` has a response recorded.
async fn run_targets(
    api: &Api<Query>,
    name: &str,
    namespace: &str,
    query: &Query,
    status: &QueryStatus,
    ctx: &ReconcileContext,
    remaining: Duration,
) -> Result<(), TargetPassError> {
    let telemetry = Telemetry::new(name, namespace);
    if let Some(session_id) = &query.spec.session_id {
        telemetry.set_session_id(session_id.clone());
    }

    let resolved_params = resolve_parameters(ctx, namespace, query).await.map_err(TargetPassError::Failed)?;
    let input = ark_core::template::render(&query.spec.input, &resolved_params).map_err(TargetPassError::Failed)?;

    let (memory, history, session_id) = load_history(query).await.map_err(TargetPassError::Failed)?;

    let cancel = CancellationToken::new();
    let cancel_for_timer = cancel.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(remaining).await;
        cancel_for_timer.cancel();
    });

    let mut responses = status.responses.clone();
    let mut token_usage = status.token_usage.clone();

    for target in &status.resolved_targets {
        if target_already_done(&responses, target) {
            continue;
        }

        let outcome = run_one_target(
            ctx,
            target,
            namespace,
            &input,
            &resolved_params,
            &history,
            &telemetry,
            &cancel,
            &memory,
            &session_id,
            name,
        )
        .await;

        match outcome {
            Ok(response) => {
                token_usage.add(&response.token_usage);
                responses.push(response);
                patch_status_with_retry(api, name, |s| {
                    s.responses = responses.clone();
                    s.token_usage = token_usage.clone();
                })
                .await?;
            }
            Err(err) => {
                timer.abort();
                if cancel.is_cancelled() {
                    return Err(TargetPassError::TimedOut);
                }
                return Err(TargetPassError::Failed(err));
            }
        }
    }

    timer.abort();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_one_target(
    ctx: &ReconcileContext,
    target: &Target,
    namespace: &str,
    input: &str,
    params: &BTreeMap<String, String>,
    history: &[Message],
    telemetry: &Telemetry,
    cancel: &CancellationToken,
    memory: &Option<Arc<MemoryGateway>>,
    session_id: &Option<String>,
    query_name: &str,
) -> Result<Response, EngineError> {
    let (response, new_messages) = ctx.executor.execute(target, namespace, input, params, history, telemetry, cancel).await?;

    if let (Some(gateway), Some(session_id)) = (memory, session_id) {
        if !new_messages.is_empty() {
            gateway
                .put_messages(session_id, query_name, new_messages)
                .await
                .map_err(|e| EngineError::new(ErrorKind::Memory, e.to_string()))?;
        }
    }

    Ok(response)
}

/// Parameter templating substitutes `{{name}}` in `input` with
/// `parameters[name].value`, resolving `valueFrom` chains first . Pure given already-resolved inputs; the I/O is confined to this
/// function, the substitution itself (`template::render`) has none.
async fn resolve_parameters(
    ctx: &ReconcileContext,
    namespace: &str,
    query: &Query,
) -> Result<BTreeMap<String, String>, EngineError> {
    let mut resolved = BTreeMap::new();
    for param in &query.spec.parameters {
        let value = if let Some(value) = &param.value {
            value.clone()
        } else if let Some(value_from) = &param.value_from {
            ctx.resolver.resolve(value_from, namespace).await?
        } else {
            String::new()
        };
        resolved.insert(param.name.clone(), value);
    }
    Ok(resolved)
}

/// Build a Memory Gateway and load prior session history, if the Query
/// names a memory handle.
async fn load_history(query: &Query) -> Result<(Option<Arc<MemoryGateway>>, Vec<Message>, Option<String>), EngineError> {
    let Some(memory_ref) = &query.spec.memory_ref else {
        return Ok((None, Vec::new(), None));
    };

    let client =
        MemoryClient::new(memory_ref.service.clone()).map_err(|e| EngineError::new(ErrorKind::Memory, e.to_string()))?;
    let gateway = Arc::new(MemoryGateway::new(client));
    let history = gateway
        .get_messages(&memory_ref.session_id, &MessageFilter::default())
        .await
        .map_err(|e| EngineError::new(ErrorKind::Memory, e.to_string()))?;
    Ok((Some(gateway), history, Some(memory_ref.session_id.clone())))
}

async fn timeout_out(api: &Api<Query>, name: &str) -> Result<SchedulerOutcome, ReconcileError> {
    warn!(query = name, "query exceeded its deadline");
    patch_status_with_retry(api, name, |s| {
        s.phase = Phase::Error;
        s.error = Some(StatusError::new(ErrorKind::Timeout, "query exceeded its deadline"));
        s.completed_at = Some(Utc::now());
    })
    .await?;
    Ok(SchedulerOutcome::Done)
}

/// Retryable failures requeue with backoff until the budget is exhausted;
/// everything else (or a budget exhausted) transitions the Query straight
/// to `error`.
async fn handle_target_failure(
    api: &Api<Query>,
    name: &str,
    err: EngineError,
    retry_count: u32,
) -> Result<SchedulerOutcome, ReconcileError> {
    match decide_failure(err.kind(), retry_count) {
        FailureDecision::Retry(delay) => {
            patch_status_with_retry(api, name, |s| {
                s.retry_count = retry_count + 1;
            })
            .await?;
            Ok(SchedulerOutcome::RequeueAfter(delay))
        }
        FailureDecision::Terminal => {
            let status_error = err.into_status();
            patch_status_with_retry(api, name, |s| {
                s.phase = Phase::Error;
                s.error = Some(status_error.clone());
                s.completed_at = Some(Utc::now());
            })
            .await?;
            Ok(SchedulerOutcome::Done)
        }
    }
}
