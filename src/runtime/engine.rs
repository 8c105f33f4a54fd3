/// Flow engine: the per-run state machine
///
/// `FlowEngine` is synchronous and owns one run's `ExecutionState`. It never performs
/// I/O itself: when a node needs an executor it hands back a `Directive::Invoke`, and
/// the session driving it reports the outcome through `complete`. This keeps every
/// transition deterministic and testable without a runtime.
///
/// ```text
/// idle ──START──▶ running ──▶ completed ──RESET──▶ idle
///                    │
///                    └──STOP──▶ stopped ──RESET──▶ idle
/// ```

use crate::diagram::{AnswerReport, Answers, CompiledDiagram, Node, NodeKind, ResultDefinition};
use crate::runtime::executor::ExecutorFailure;
use crate::runtime::state::{ExecutionState, NodeStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// External events accepted by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowEvent {
    Start,
    Answer {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(default)]
        answer: Value,
    },
    Stop,
    Reset,
}

/// Top-level run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "value", content = "step", rename_all = "camelCase")]
pub enum RunState {
    Idle,
    Running(RunningState),
    Completed,
    Stopped,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped)
    }
}

/// Sub-states of a running flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunningState {
    Evaluating,
    WaitingInput,
    Executing,
    ProcessingHttp,
    ProcessingGemini,
    ProcessingPuter,
}

impl RunningState {
    fn processing(kind: NodeKind) -> Option<Self> {
        match kind {
            NodeKind::HttpRequest => Some(RunningState::ProcessingHttp),
            NodeKind::Gemini => Some(RunningState::ProcessingGemini),
            NodeKind::Puter => Some(RunningState::ProcessingPuter),
            _ => None,
        }
    }

    pub fn is_processing(self) -> bool {
        matches!(
            self,
            RunningState::ProcessingHttp | RunningState::ProcessingGemini | RunningState::ProcessingPuter
        )
    }
}

/// What STOP does to an executor call that is still in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopPolicy {
    /// Abort the call, discard its result and mark the node as failed
    #[default]
    Cancel,
    /// Let the call finish and record its result, then stop
    Drain,
}

impl FromStr for StopPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cancel" => Ok(StopPolicy::Cancel),
            "drain" => Ok(StopPolicy::Drain),
            other => Err(format!("unknown stop policy '{}' (expected cancel or drain)", other)),
        }
    }
}

/// Identifies one executor call so that late completions can be recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub u64);

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request to run a node's executor against a copy of the answers
#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: InvocationId,
    pub node: Node,
    pub answers: Answers,
}

/// Side effects the driver must perform after a transition
#[derive(Debug)]
pub enum Directive {
    /// Nothing to do until the next event
    Wait,
    Invoke(Invocation),
    /// Abort the in-flight call; its result must not be reported
    Cancel(InvocationId),
}

/// Serializable view of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub state: RunState,
    pub current_node_id: Option<String>,
    pub answers: Answers,
    pub node_statuses: BTreeMap<String, NodeStatus>,
    pub results: Vec<ResultDefinition>,
    pub answer_report: Vec<AnswerReport>,
}

#[derive(Debug)]
pub struct FlowEngine {
    diagram: Arc<CompiledDiagram>,
    policy: StopPolicy,
    run_state: RunState,
    state: ExecutionState,
    stop_requested: bool,
    in_flight: Option<InvocationId>,
    next_invocation: u64,
}

impl FlowEngine {
    pub fn new(diagram: Arc<CompiledDiagram>, policy: StopPolicy) -> Self {
        let state = ExecutionState::new(&diagram);
        Self {
            diagram,
            policy,
            run_state: RunState::Idle,
            state,
            stop_requested: false,
            in_flight: None,
            next_invocation: 0,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn diagram(&self) -> &Arc<CompiledDiagram> {
        &self.diagram
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            state: self.run_state,
            current_node_id: self.state.current_node_id.clone(),
            answers: self.state.answers.clone(),
            node_statuses: self.state.node_statuses.clone(),
            results: self.state.results.clone(),
            answer_report: self.state.answer_report.clone(),
        }
    }

    /// Apply an external event
    pub fn send(&mut self, event: FlowEvent) -> Directive {
        tracing::debug!("📨 Run of '{}' received {:?} in {:?}", self.diagram.id(), event, self.run_state);
        match (event, self.run_state) {
            (FlowEvent::Start, RunState::Idle) => {
                tracing::info!("🚀 Starting run of diagram '{}'", self.diagram.id());
                self.state = ExecutionState::new(&self.diagram);
                self.stop_requested = false;
                self.state.current_node_id = self.diagram.start_node_id().map(str::to_string);
                self.evaluate()
            }
            (
                FlowEvent::Answer { node_id, answer },
                RunState::Running(RunningState::WaitingInput),
            ) if self.state.current_node_id.as_deref() == Some(node_id.as_str()) => {
                tracing::debug!("✍️ Answer recorded for node '{}'", node_id);
                self.state.record_answer(&node_id, answer);
                self.state.set_status(&node_id, NodeStatus::Executed);
                self.advance(&node_id);
                self.evaluate()
            }
            (FlowEvent::Stop, RunState::Running(step)) if step.is_processing() => self.stop_processing(),
            (FlowEvent::Stop, RunState::Running(_)) => {
                self.finish(RunState::Stopped);
                Directive::Wait
            }
            (FlowEvent::Reset, state) if state.is_terminal() => {
                tracing::info!("🔁 Run of diagram '{}' reset", self.diagram.id());
                self.state = ExecutionState::new(&self.diagram);
                self.stop_requested = false;
                self.in_flight = None;
                self.run_state = RunState::Idle;
                Directive::Wait
            }
            (event, state) => {
                tracing::warn!("⚠️ Ignoring {:?} while {:?}", event, state);
                Directive::Wait
            }
        }
    }

    /// Report the outcome of an invocation handed out earlier
    pub fn complete(&mut self, id: InvocationId, outcome: Result<Value, ExecutorFailure>) -> Directive {
        if self.in_flight != Some(id) {
            tracing::warn!("⚠️ Ignoring stale completion of invocation {}", id);
            return Directive::Wait;
        }
        self.in_flight = None;

        let Some(node_id) = self.state.current_node_id.clone() else {
            return Directive::Wait;
        };
        match outcome {
            Ok(value) => {
                tracing::info!("✅ Node '{}' executed", node_id);
                self.state.record_answer(&node_id, value);
                self.state.set_status(&node_id, NodeStatus::Executed);
            }
            Err(failure) => self.fail(&node_id, &failure),
        }
        self.advance(&node_id);
        self.evaluate()
    }

    fn stop_processing(&mut self) -> Directive {
        match self.policy {
            StopPolicy::Drain => {
                tracing::info!("⏸️ Stop requested; waiting for the in-flight call to finish");
                self.stop_requested = true;
                Directive::Wait
            }
            StopPolicy::Cancel => {
                if let Some(node_id) = self.state.current_node_id.clone() {
                    tracing::info!("🛑 Cancelling in-flight call for node '{}'", node_id);
                    self.state.set_status(&node_id, NodeStatus::Error);
                }
                let cancelled = self.in_flight.take();
                self.finish(RunState::Stopped);
                cancelled.map_or(Directive::Wait, Directive::Cancel)
            }
        }
    }

    /// Follow the first eligible edge out of `from`
    fn advance(&mut self, from: &str) {
        self.state.current_node_id = self.diagram.next_node_id(from, &self.state.answers);
    }

    /// Run the evaluating step until the run suspends or ends
    fn evaluate(&mut self) -> Directive {
        let diagram = Arc::clone(&self.diagram);
        let mut visited = HashSet::new();

        loop {
            self.run_state = RunState::Running(RunningState::Evaluating);

            if self.stop_requested {
                self.finish(RunState::Stopped);
                return Directive::Wait;
            }

            let Some(node_id) = self.state.current_node_id.clone() else {
                self.finish(RunState::Completed);
                return Directive::Wait;
            };

            if !visited.insert(node_id.clone()) {
                self.fail(&node_id, &ExecutorFailure::Cycle(node_id.clone()));
                self.finish(RunState::Stopped);
                return Directive::Wait;
            }

            let Some(node) = diagram.node(&node_id) else {
                self.fail(&node_id, &ExecutorFailure::UnknownNode(node_id.clone()));
                self.advance(&node_id);
                continue;
            };

            self.state.set_status(&node_id, NodeStatus::Running);
            tracing::debug!("🎯 Evaluating node '{}' ({:?})", node_id, node.kind);

            match node.kind {
                NodeKind::Input | NodeKind::Output => {
                    self.run_state = RunState::Running(RunningState::Executing);
                    self.state.set_status(&node_id, NodeStatus::Executed);
                    self.advance(&node_id);
                }
                NodeKind::Question | NodeKind::GeminiInfo => {
                    self.run_state = RunState::Running(RunningState::WaitingInput);
                    return Directive::Wait;
                }
                NodeKind::HttpRequest | NodeKind::Gemini | NodeKind::Puter => {
                    if let Some(step) = RunningState::processing(node.kind) {
                        self.run_state = RunState::Running(step);
                    }
                    let id = InvocationId(self.next_invocation);
                    self.next_invocation += 1;
                    self.in_flight = Some(id);
                    tracing::debug!("⚙️ Invoking executor {} for node '{}'", id, node_id);
                    return Directive::Invoke(Invocation {
                        id,
                        node: node.clone(),
                        answers: self.state.answers.clone(),
                    });
                }
                NodeKind::Unknown => {
                    self.fail(&node_id, &ExecutorFailure::UnknownKind(node_id.clone()));
                    self.advance(&node_id);
                }
            }
        }
    }

    /// Record a node failure as `{ "error": message }` and mark it errored
    fn fail(&mut self, node_id: &str, failure: &ExecutorFailure) {
        tracing::warn!("❌ Node '{}' failed: {}", node_id, failure);
        self.state
            .answers
            .insert(node_id.to_string(), json!({ "error": failure.to_string() }));
        self.state.set_status(node_id, NodeStatus::Error);
    }

    fn finish(&mut self, terminal: RunState) {
        self.stop_requested = false;
        self.in_flight = None;
        self.state.finish(&self.diagram);
        self.run_state = terminal;
        tracing::info!(
            "🏁 Run of diagram '{}' {:?} with {} answers and {} results",
            self.diagram.id(),
            terminal,
            self.state.answers.len(),
            self.state.results.len()
        );
    }
}
