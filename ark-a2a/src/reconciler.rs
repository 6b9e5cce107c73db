//! The A2A Task Reconciler: creates a remote task on first
//! reconciliation, then polls it every 3s until a terminal phase, merging
//! each response into the local mirror.

use crate::client::A2aClient;
use crate::error::A2aError;
use crate::merge::merge_task;
use crate::wire::into_remote_task;
use ark_core::{A2ATaskMirrorStatus, MirrorPhase, RemoteState};
use ark_telemetry::Telemetry;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Poll cadence while a task is non-terminal.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

pub struct A2aReconciler {
    client: A2aClient,
    /// `input-required`/`auth-required` dwell cap.
    max_dwell: Option<Duration>,
}

impl A2aReconciler {
    pub fn new() -> Self {
        A2aReconciler { client: A2aClient::new(), max_dwell: None }
    }

    pub fn with_max_dwell(mut self, max_dwell: Duration) -> Self {
        self.max_dwell = Some(max_dwell);
        self
    }

    /// `message/send` to start a new remote task.
    /// Returns the `taskId`/`contextId` to record in the mirror's
    /// annotations and the first merged status.
    pub async fn create_task(
        &self,
        agent_address: &str,
        message_id: impl Into<String>,
        input: &str,
        callback_url: Option<String>,
        headers: &[(String, String)],
    ) -> Result<(String, Option<String>, A2ATaskMirrorStatus), A2aError> {
        let wire_task = self.client.send_message(agent_address, message_id, input, callback_url, headers).await?;
        let task_id = wire_task.id.clone();
        let context_id = wire_task.context_id.clone();

        let mut status = A2ATaskMirrorStatus::default();
        let mut next_sequence = 0u64;
        merge_task(&mut status, into_remote_task(wire_task), &mut next_sequence);
        Ok((task_id, context_id, status))
    }

    /// Poll once and merge into `status`, returning whether the mapped
    /// phase is now terminal.
    pub async fn poll_once(
        &self,
        agent_address: &str,
        task_id: &str,
        status: &mut A2ATaskMirrorStatus,
        next_sequence: &mut u64,
        headers: &[(String, String)],
        telemetry: &Telemetry,
    ) -> Result<bool, A2aError> {
        let span = telemetry.a2a_poll_span(task_id);
        let wire_task = self.client.task_status(agent_address, task_id, headers).instrument(span).await?;
        merge_task(status, into_remote_task(wire_task), next_sequence);
        Ok(status.phase.map(MirrorPhase::is_terminal).unwrap_or(false))
    }

    /// Drive `status` to a terminal phase, sleeping [`POLL_INTERVAL`]
    /// between polls (cancellable — no single sleep runs longer than 3s
    /// uncancellable). Returns once terminal, on cancellation, or if a
    /// configured `max_dwell` in `input-required`/`auth-required` is
    /// exceeded.
    pub async fn run_to_terminal(
        &self,
        agent_address: &str,
        task_id: &str,
        status: &mut A2ATaskMirrorStatus,
        next_sequence: &mut u64,
        headers: &[(String, String)],
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<(), A2aError> {
        let mut dwell = Duration::ZERO;

        loop {
            if status.phase.map(MirrorPhase::is_terminal).unwrap_or(false) {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(A2aError::Canceled),
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }

            let terminal = self.poll_once(agent_address, task_id, status, next_sequence, headers, telemetry).await?;
            if terminal {
                return Ok(());
            }

            if is_dwelling(status.remote_state) {
                dwell += POLL_INTERVAL;
                if let Some(max_dwell) = self.max_dwell {
                    if dwell >= max_dwell {
                        return Err(A2aError::Protocol(format!(
                            "task '{task_id}' stalled in {:?} past max_dwell {:?}",
                            status.remote_state, max_dwell
                        )));
                    }
                }
            } else {
                dwell = Duration::ZERO;
            }
        }
    }
}

impl Default for A2aReconciler {
    fn default() -> Self {
        A2aReconciler::new()
    }
}

fn is_dwelling(state: Option<RemoteState>) -> bool {
    matches!(state, Some(RemoteState::InputRequired) | Some(RemoteState::AuthRequired))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn task_body(state: &str, artifact_ids: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "id": "task-1",
                "contextId": "ctx-1",
                "status": {"state": state, "timestamp": "2026-01-01T00:00:00Z"},
                "artifacts": artifact_ids.iter().map(|id| serde_json::json!({"artifactId": id, "parts": []})).collect::<Vec<_>>(),
                "history": []
            }
        })
    }

    #[tokio::test]
    async fn create_task_records_ids_and_merges_first_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_body("working", &["a1"])))
            .mount(&server)
            .await;

        let reconciler = A2aReconciler::new();
        let (task_id, context_id, status) =
            reconciler.create_task(&server.uri(), "m1", "hello", None, &[]).await.unwrap();
        assert_eq!(task_id, "task-1");
        assert_eq!(context_id.as_deref(), Some("ctx-1"));
        assert_eq!(status.artifacts.len(), 1);
        assert_eq!(status.phase, Some(MirrorPhase::Running));
    }

    #[tokio::test(start_paused = true)]
    async fn run_to_terminal_polls_until_completed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_body("working", &["a1"])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_body("completed", &["a1", "a2"])))
            .mount(&server)
            .await;

        let reconciler = A2aReconciler::new();
        let (task_id, _, mut status) = reconciler.create_task(&server.uri(), "m1", "hi", None, &[]).await.unwrap();
        let mut next_sequence = 1u64;
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();

        reconciler
            .run_to_terminal(&server.uri(), &task_id, &mut status, &mut next_sequence, &[], &telemetry, &cancel)
            .await
            .unwrap();

        assert_eq!(status.phase, Some(MirrorPhase::Completed));
        assert_eq!(status.artifacts.len(), 2);
        assert!(status.completion_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_poll_loop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_body("working", &[])))
            .mount(&server)
            .await;

        let reconciler = A2aReconciler::new();
        let (task_id, _, mut status) = reconciler.create_task(&server.uri(), "m1", "hi", None, &[]).await.unwrap();
        let mut next_sequence = 0u64;
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = reconciler
            .run_to_terminal(&server.uri(), &task_id, &mut status, &mut next_sequence, &[], &telemetry, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, A2aError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn input_required_stalls_past_max_dwell() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_body("input-required", &[])))
            .mount(&server)
            .await;

        let reconciler = A2aReconciler::new().with_max_dwell(Duration::from_secs(6));
        let (task_id, _, mut status) = reconciler.create_task(&server.uri(), "m1", "hi", None, &[]).await.unwrap();
        let mut next_sequence = 0u64;
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();

        let err = reconciler
            .run_to_terminal(&server.uri(), &task_id, &mut status, &mut next_sequence, &[], &telemetry, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, A2aError::Protocol(_)));
    }
}
