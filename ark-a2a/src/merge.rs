//! Merging a freshly-polled [`RemoteTask`] into the local mirror: artifacts append by `artifactId`,
//! history appends by content hash, both first-seen order, and nothing is
//! ever removed.

use ark_core::a2a::map_remote_state;
use ark_core::{A2ATaskMirrorStatus, Message, Part, RemoteTask};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// SHA-256 over `role|kind:content||kind:content...`.
/// Used to detect a history message the mirror has already recorded even
/// when the remote server doesn't expose a stable message id.
pub fn content_hash(message: &Message) -> String {
    let role = format!("{:?}", message.role).to_ascii_lowercase();
    let parts: Vec<String> = message.parts.iter().map(render_part).collect();
    let joined = format!("{role}|{}", parts.join("||"));
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn render_part(part: &Part) -> String {
    match part {
        Part::Text { text } => format!("text:{text}"),
        Part::Data { data } => format!("data:{data}"),
        Part::File { uri, mime_type } => format!("uri:{uri}+{}", mime_type.as_deref().unwrap_or("")),
    }
}

/// Fold `remote` into `status` in place. `next_sequence` is the mirror's
/// running sequence counter, threaded across polls so history stays
/// strictly increasing.
pub fn merge_task(status: &mut A2ATaskMirrorStatus, remote: RemoteTask, next_sequence: &mut u64) {
    for artifact in remote.artifacts {
        if !status.artifacts.iter().any(|a| a.artifact_id == artifact.artifact_id) {
            status.artifacts.push(artifact);
        }
    }

    let mut seen: HashSet<String> = status.history.iter().map(content_hash).collect();
    for mut message in remote.history {
        let hash = content_hash(&message);
        if seen.insert(hash) {
            message.sequence = *next_sequence;
            *next_sequence += 1;
            status.history.push(message);
        }
    }

    let phase = map_remote_state(remote.status.state);
    status.remote_state = Some(remote.status.state);
    status.phase = Some(phase);
    status.metadata = remote.metadata;
    if phase.is_terminal() {
        status.completion_time.get_or_insert(remote.status.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_core::{MessageMetadata, MirrorPhase, RemoteState, RemoteTaskStatus, Role};
    use chrono::{TimeZone, Utc};

    fn message(role: Role, text: &str) -> Message {
        Message {
            role,
            parts: vec![Part::Text { text: text.to_string() }],
            metadata: MessageMetadata::default(),
            sequence: 0,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn remote(state: RemoteState, artifact_ids: &[&str], messages: Vec<Message>) -> RemoteTask {
        RemoteTask {
            id: "t1".to_string(),
            context_id: None,
            status: RemoteTaskStatus { state, message: None, timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() },
            artifacts: artifact_ids
                .iter()
                .map(|id| ark_core::Artifact { artifact_id: id.to_string(), name: None, description: None, parts: vec![] })
                .collect(),
            history: messages,
            metadata: None,
        }
    }

    #[test]
    fn content_hash_is_stable_and_distinguishes_role() {
        let a = message(Role::User, "hi");
        let b = message(Role::Agent, "hi");
        assert_eq!(content_hash(&a), content_hash(&a));
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn merges_two_sequential_polls_accumulating_artifacts_and_history() {
        let mut status = A2ATaskMirrorStatus::default();
        let mut next_sequence = 0u64;

        let msg_a = message(Role::User, "x");
        merge_task(&mut status, remote(RemoteState::Working, &["a1"], vec![msg_a.clone()]), &mut next_sequence);
        assert_eq!(status.phase, Some(MirrorPhase::Running));
        assert_eq!(status.artifacts.len(), 1);
        assert_eq!(status.history.len(), 1);

        let msg_b = message(Role::Agent, "y");
        merge_task(
            &mut status,
            remote(RemoteState::Completed, &["a1", "a2"], vec![msg_a.clone(), msg_b.clone()]),
            &mut next_sequence,
        );

        assert_eq!(status.phase, Some(MirrorPhase::Completed));
        assert_eq!(status.artifacts.iter().map(|a| a.artifact_id.clone()).collect::<Vec<_>>(), vec!["a1", "a2"]);
        assert_eq!(status.history.len(), 2);
        assert_eq!(status.history[0].sequence, 0);
        assert_eq!(status.history[1].sequence, 1);
        assert!(status.completion_time.is_some());
    }

    #[test]
    fn repolling_with_no_changes_is_byte_identical() {
        let mut status = A2ATaskMirrorStatus::default();
        let mut next_sequence = 0u64;
        let msg = message(Role::User, "only");
        merge_task(&mut status, remote(RemoteState::Working, &["a1"], vec![msg.clone()]), &mut next_sequence);
        let before = status.clone();
        merge_task(&mut status, remote(RemoteState::Working, &["a1"], vec![msg]), &mut next_sequence);
        assert_eq!(status, before);
    }

    #[test]
    fn artifacts_and_history_never_shrink() {
        let mut status = A2ATaskMirrorStatus::default();
        let mut next_sequence = 0u64;
        merge_task(
            &mut status,
            remote(RemoteState::Working, &["a1", "a2"], vec![message(Role::User, "one")]),
            &mut next_sequence,
        );
        merge_task(&mut status, remote(RemoteState::Working, &["a1"], vec![]), &mut next_sequence);
        assert_eq!(status.artifacts.len(), 2);
        assert_eq!(status.history.len(), 1);
    }
}
