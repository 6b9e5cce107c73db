//! The Team Strategist: drives one of the four team strategies
//! to a final message, given a [`MemberRunner`] that knows how to run one
//! member's turn.

use crate::member::MemberRunner;
use crate::selector::SelectorDecider;
use ark_core::{EngineError, ErrorKind, Message, Strategy, TeamSpec};
use ark_telemetry::Telemetry;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub struct TeamRunOutcome {
    pub final_message: Message,
    /// Every member turn in execution order, appended once and never
    /// mutated — the caller persists this the same way the Agent Runner's
    /// `new_messages` are persisted.
    pub transcript: Vec<Message>,
}

pub struct TeamStrategist;

impl TeamStrategist {
    /// Run `team` to completion. `selector` is required (and used) only for
    /// the `selector` strategy; passing `None` for any other strategy is
    /// fine.
    pub async fn run(
        team: &TeamSpec,
        team_name: &str,
        input: &str,
        runner: &dyn MemberRunner,
        selector: Option<&dyn SelectorDecider>,
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<TeamRunOutcome, EngineError> {
        if team.members.is_empty() {
            return Err(EngineError::new(ErrorKind::Resolve, "team has no members"));
        }

        match team.strategy {
            Strategy::Sequential => run_sequential(team, team_name, input, runner, telemetry, cancel).await,
            Strategy::RoundRobin => run_cycling(team, team_name, input, runner, None, telemetry, cancel).await,
            Strategy::Selector => {
                let selector = selector.ok_or_else(|| {
                    EngineError::new(ErrorKind::Resolve, "selector strategy requires a configured selector model")
                })?;
                run_cycling(team, team_name, input, runner, Some(selector), telemetry, cancel).await
            }
            Strategy::Graph => run_graph(team, team_name, input, runner, telemetry, cancel).await,
        }
    }
}

async fn run_sequential(
    team: &TeamSpec,
    team_name: &str,
    input: &str,
    runner: &dyn MemberRunner,
    telemetry: &Telemetry,
    cancel: &CancellationToken,
) -> Result<TeamRunOutcome, EngineError> {
    let mut transcript = Vec::new();
    let mut final_message = None;

    for member in &team.members {
        let span = telemetry.team_turn_span(team_name, &member.name);
        let result = runner.run_member(&member.name, input, &transcript, telemetry, cancel).instrument(span).await;
        match result {
            Ok(message) => {
                transcript.push(message.clone());
                final_message = Some(message);
            }
            Err(err) if err.kind() == ErrorKind::AgentAbort => break,
            Err(err) => return Err(err),
        }
    }

    let final_message =
        final_message.ok_or_else(|| EngineError::new(ErrorKind::AgentAbort, "first member aborted before producing a message"))?;
    Ok(TeamRunOutcome { final_message, transcript })
}

/// Shared loop for `round-robin` and `selector`: both cycle members for up
/// to `maxTurns` turns and stop early on the termination sentinel . `decider` is `None` for plain round-robin and `Some` for selector,
/// where an unparseable pick falls back to the same round-robin order.
async fn run_cycling(
    team: &TeamSpec,
    team_name: &str,
    input: &str,
    runner: &dyn MemberRunner,
    decider: Option<&dyn SelectorDecider>,
    telemetry: &Telemetry,
    cancel: &CancellationToken,
) -> Result<TeamRunOutcome, EngineError> {
    let mut transcript: Vec<Message> = Vec::new();
    let mut final_message = None;
    let mut round_robin_index = 0usize;

    for _ in 0..team.max_turns {
        let member_name = match decider {
            Some(decider) => {
                let candidates: Vec<String> = team.members.iter().map(|m| m.name.clone()).collect();
                match decider.select(&transcript, &candidates, telemetry, cancel).await? {
                    Some(name) => name,
                    None => {
                        let name = team.members[round_robin_index % team.members.len()].name.clone();
                        round_robin_index += 1;
                        name
                    }
                }
            }
            None => {
                let name = team.members[round_robin_index % team.members.len()].name.clone();
                round_robin_index += 1;
                name
            }
        };

        let span = telemetry.team_turn_span(team_name, &member_name);
        let message = runner.run_member(&member_name, input, &transcript, telemetry, cancel).instrument(span).await?;
        let terminated = message.text_content().contains(&team.termination_token);
        transcript.push(message.clone());
        final_message = Some(message);
        if terminated {
            break;
        }
    }

    let final_message = final_message.ok_or_else(|| EngineError::new(ErrorKind::Resolve, "team completed zero turns"))?;
    Ok(TeamRunOutcome { final_message, transcript })
}

async fn run_graph(
    team: &TeamSpec,
    team_name: &str,
    input: &str,
    runner: &dyn MemberRunner,
    telemetry: &Telemetry,
    cancel: &CancellationToken,
) -> Result<TeamRunOutcome, EngineError> {
    let graph = team
        .graph
        .as_ref()
        .ok_or_else(|| EngineError::new(ErrorKind::Resolve, "graph strategy requires team.graph"))?;

    let mut current = graph
        .edges
        .iter()
        .find(|edge| edge.from.is_none())
        .map(|edge| edge.to.clone())
        .unwrap_or_else(|| team.members[0].name.clone());

    let mut transcript = Vec::new();
    let mut final_message = None;

    for _ in 0..team.max_turns {
        let span = telemetry.team_turn_span(team_name, &current);
        let message = runner.run_member(&current, input, &transcript, telemetry, cancel).instrument(span).await?;
        transcript.push(message.clone());
        final_message = Some(message);

        // Lowest-index outgoing edge wins; `Vec` iteration order is the edges' declared order.
        match graph.edges.iter().find(|edge| edge.from.as_deref() == Some(current.as_str())) {
            Some(edge) => current = edge.to.clone(),
            None => break,
        }
    }

    let final_message = final_message.ok_or_else(|| EngineError::new(ErrorKind::Resolve, "graph team completed zero turns"))?;
    Ok(TeamRunOutcome { final_message, transcript })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::parse_selection;
    use ark_core::{GraphEdge, GraphSpec, MessageMetadata, NamedRef, Part, Role};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn member(name: &str) -> NamedRef {
        NamedRef { name: name.to_string(), namespace: None }
    }

    fn msg(text: &str) -> Message {
        Message {
            role: Role::Agent,
            parts: vec![Part::Text { text: text.to_string() }],
            metadata: MessageMetadata::default(),
            sequence: 0,
            timestamp: Utc::now(),
        }
    }

    fn team(strategy: Strategy, members: Vec<NamedRef>, max_turns: u32) -> TeamSpec {
        TeamSpec { members, strategy, max_turns, selector: None, graph: None, termination_token: "<<TERMINATE>>".to_string() }
    }

    /// Replies from a fixed script, keyed by call order; records every
    /// member name it was asked to run.
    struct ScriptedRunner {
        replies: Vec<&'static str>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(replies: Vec<&'static str>) -> Self {
            ScriptedRunner { replies, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl MemberRunner for ScriptedRunner {
        async fn run_member(
            &self,
            member: &str,
            _input: &str,
            _history: &[Message],
            _telemetry: &Telemetry,
            _cancel: &CancellationToken,
        ) -> Result<Message, EngineError> {
            self.seen.lock().unwrap().push(member.to_string());
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(msg(self.replies[i % self.replies.len()]))
        }
    }

    struct AbortingRunner;

    #[async_trait]
    impl MemberRunner for AbortingRunner {
        async fn run_member(
            &self,
            _member: &str,
            _input: &str,
            _history: &[Message],
            _telemetry: &Telemetry,
            _cancel: &CancellationToken,
        ) -> Result<Message, EngineError> {
            Err(EngineError::new(ErrorKind::AgentAbort, "member declined"))
        }
    }

    fn telemetry() -> Telemetry {
        Telemetry::new("q1", "default")
    }

    #[tokio::test]
    async fn sequential_returns_last_members_message_and_full_transcript() {
        let t = team(Strategy::Sequential, vec![member("alpha"), member("beta")], 10);
        let runner = ScriptedRunner::new(vec!["hi from alpha", "hi from beta"]);
        let outcome =
            TeamStrategist::run(&t, "t1", "do the thing", &runner, None, &telemetry(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.final_message.text_content(), "hi from beta");
        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(*runner.seen.lock().unwrap(), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn sequential_halts_on_agent_abort() {
        let t = team(Strategy::Sequential, vec![member("alpha"), member("beta")], 10);
        let runner = AbortingRunner;
        let err = TeamStrategist::run(&t, "t1", "x", &runner, None, &telemetry(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AgentAbort);
    }

    #[tokio::test]
    async fn round_robin_stops_on_termination_sentinel() {
        let t = team(Strategy::RoundRobin, vec![member("alpha"), member("beta")], 4);
        let runner = ScriptedRunner::new(vec!["hi", "<<TERMINATE>> done"]);
        let outcome =
            TeamStrategist::run(&t, "t1", "go", &runner, None, &telemetry(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.final_message.text_content(), "<<TERMINATE>> done");
        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(*runner.seen.lock().unwrap(), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn round_robin_exhausts_max_turns_without_sentinel() {
        let t = team(Strategy::RoundRobin, vec![member("alpha"), member("beta")], 3);
        let runner = ScriptedRunner::new(vec!["one", "two"]);
        let outcome =
            TeamStrategist::run(&t, "t1", "go", &runner, None, &telemetry(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.transcript.len(), 3);
        assert_eq!(*runner.seen.lock().unwrap(), vec!["alpha", "beta", "alpha"]);
    }

    struct AlwaysPicksBeta;

    #[async_trait]
    impl SelectorDecider for AlwaysPicksBeta {
        async fn select(
            &self,
            _transcript: &[Message],
            candidates: &[String],
            _telemetry: &Telemetry,
            _cancel: &CancellationToken,
        ) -> Result<Option<String>, EngineError> {
            Ok(parse_selection("beta", candidates))
        }
    }

    #[tokio::test]
    async fn selector_strategy_uses_the_deciders_pick() {
        let t = team(Strategy::Selector, vec![member("alpha"), member("beta")], 2);
        let runner = ScriptedRunner::new(vec!["reply"]);
        let decider = AlwaysPicksBeta;
        let outcome = TeamStrategist::run(&t, "t1", "go", &runner, Some(&decider), &telemetry(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(*runner.seen.lock().unwrap(), vec!["beta", "beta"]);
    }

    struct NeverParses;

    #[async_trait]
    impl SelectorDecider for NeverParses {
        async fn select(
            &self,
            _transcript: &[Message],
            _candidates: &[String],
            _telemetry: &Telemetry,
            _cancel: &CancellationToken,
        ) -> Result<Option<String>, EngineError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn selector_falls_back_to_round_robin_and_still_counts_the_turn() {
        let t = team(Strategy::Selector, vec![member("alpha"), member("beta")], 2);
        let runner = ScriptedRunner::new(vec!["reply"]);
        let decider = NeverParses;
        let outcome = TeamStrategist::run(&t, "t1", "go", &runner, Some(&decider), &telemetry(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(*runner.seen.lock().unwrap(), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn selector_strategy_without_a_decider_is_rejected() {
        let t = team(Strategy::Selector, vec![member("alpha")], 2);
        let runner = ScriptedRunner::new(vec!["reply"]);
        let err = TeamStrategist::run(&t, "t1", "go", &runner, None, &telemetry(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolve);
    }

    fn graph_team(edges: Vec<GraphEdge>, max_turns: u32) -> TeamSpec {
        let mut t = team(Strategy::Graph, vec![member("alpha"), member("beta"), member("gamma")], max_turns);
        t.graph = Some(GraphSpec { edges });
        t
    }

    #[tokio::test]
    async fn graph_follows_edges_in_declared_order() {
        let t = graph_team(
            vec![
                GraphEdge { from: None, to: "alpha".to_string() },
                GraphEdge { from: Some("alpha".to_string()), to: "beta".to_string() },
                GraphEdge { from: Some("beta".to_string()), to: "gamma".to_string() },
            ],
            10,
        );
        let runner = ScriptedRunner::new(vec!["a", "b", "c"]);
        let outcome =
            TeamStrategist::run(&t, "t1", "go", &runner, None, &telemetry(), &CancellationToken::new()).await.unwrap();
        assert_eq!(*runner.seen.lock().unwrap(), vec!["alpha", "beta", "gamma"]);
        assert_eq!(outcome.final_message.text_content(), "c");
    }

    #[tokio::test]
    async fn graph_terminates_when_no_outgoing_edge_matches() {
        let t = graph_team(vec![GraphEdge { from: None, to: "alpha".to_string() }], 10);
        let runner = ScriptedRunner::new(vec!["only turn"]);
        let outcome =
            TeamStrategist::run(&t, "t1", "go", &runner, None, &telemetry(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.transcript.len(), 1);
    }

    #[tokio::test]
    async fn graph_picks_lowest_index_edge_when_multiple_match() {
        let t = graph_team(
            vec![
                GraphEdge { from: None, to: "alpha".to_string() },
                GraphEdge { from: Some("alpha".to_string()), to: "gamma".to_string() },
                GraphEdge { from: Some("alpha".to_string()), to: "beta".to_string() },
            ],
            2,
        );
        let runner = ScriptedRunner::new(vec!["a", "b"]);
        TeamStrategist::run(&t, "t1", "go", &runner, None, &telemetry(), &CancellationToken::new()).await.unwrap();
        assert_eq!(*runner.seen.lock().unwrap(), vec!["alpha", "gamma"]);
    }

    #[tokio::test]
    async fn graph_cycle_is_bounded_by_max_turns() {
        let t = graph_team(
            vec![
                GraphEdge { from: None, to: "alpha".to_string() },
                GraphEdge { from: Some("alpha".to_string()), to: "beta".to_string() },
                GraphEdge { from: Some("beta".to_string()), to: "alpha".to_string() },
            ],
            5,
        );
        let runner = ScriptedRunner::new(vec!["x"]);
        let outcome =
            TeamStrategist::run(&t, "t1", "go", &runner, None, &telemetry(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.transcript.len(), 5);
    }
}
