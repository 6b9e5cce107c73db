//! Status subresource writes with optimistic-concurrency retry, grounded in
//! `kube-runtime`'s `finalizer.rs` patch-then-retry style.

use crate::error::ReconcileError;
use ark_core::{Query, QueryStatus};
use kube::api::{Patch, PatchParams};
use kube::Api;

/// Status writes never contend with another controller instance for the
/// same Query, but a concurrent `kubectl patch` or a previous reconcile's
/// slow response can still race us.
const MAX_CONFLICT_RETRIES: u32 = 5;

const FIELD_MANAGER: &str = "ark-controller";

/// Re-fetch-mutate-patch `name` until the patch lands or the conflict
/// budget is exhausted. `mutate` receives the freshest known status and
/// mutates it in place; callers should make `mutate` idempotent since it
/// may run more than once.
pub async fn patch_status_with_retry(
    api: &Api<Query>,
    name: &str,
    mutate: impl Fn(&mut QueryStatus),
) -> Result<Query, ReconcileError> {
    let mut attempt = 0;
    loop {
        let current = api.get_status(name).await?;
        let mut status = current.status.clone().unwrap_or_default();
        mutate(&mut status);

        let patch = Patch::Merge(serde_json::json!({ "status": status }));
        match api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &patch).await {
            Ok(updated) => return Ok(updated),
            Err(kube::Error::Api(err)) if err.code == 409 => {
                attempt += 1;
                if attempt >= MAX_CONFLICT_RETRIES {
                    return Err(ReconcileError::StatusConflictRetriesExhausted(name.to_string()));
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}
