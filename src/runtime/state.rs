/// Execution state owned by a single run
///
/// Everything a run accumulates lives here: the current node, the answers and the
/// per-node statuses, plus the results and answer report computed once the run ends.

use crate::diagram::{AnswerReport, Answers, CompiledDiagram, ResultDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Progress of a single node within a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Executed,
    Error,
}

impl NodeStatus {
    fn rank(self) -> u8 {
        match self {
            NodeStatus::Idle => 0,
            NodeStatus::Running => 1,
            NodeStatus::Executed | NodeStatus::Error => 2,
        }
    }

    /// Statuses only move forward; a finished node may be revisited and finish again
    pub fn can_become(self, next: NodeStatus) -> bool {
        next.rank() >= self.rank() || (self.rank() == 2 && next == NodeStatus::Running)
    }

    pub fn is_finished(self) -> bool {
        self.rank() == 2
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionState {
    pub current_node_id: Option<String>,
    pub answers: Answers,
    pub node_statuses: BTreeMap<String, NodeStatus>,
    pub results: Vec<ResultDefinition>,
    pub answer_report: Vec<AnswerReport>,
}

impl ExecutionState {
    /// Fresh state with every node of the diagram idle
    pub fn new(diagram: &CompiledDiagram) -> Self {
        Self {
            node_statuses: diagram
                .nodes()
                .iter()
                .map(|node| (node.id.clone(), NodeStatus::Idle))
                .collect(),
            ..Self::default()
        }
    }

    /// Update a node's status. Unknown ids are ignored.
    pub fn set_status(&mut self, node_id: &str, status: NodeStatus) {
        if let Some(current) = self.node_statuses.get_mut(node_id) {
            if current.can_become(status) {
                *current = status;
            } else {
                tracing::warn!(
                    "⚠️ Ignoring status change {:?} → {:?} for node '{}'",
                    current,
                    status,
                    node_id
                );
            }
        }
    }

    pub fn status(&self, node_id: &str) -> Option<NodeStatus> {
        self.node_statuses.get(node_id).copied()
    }

    /// Record an answer; `null` answers are not recorded
    pub fn record_answer(&mut self, node_id: &str, answer: Value) {
        if answer.is_null() {
            return;
        }
        self.answers.insert(node_id.to_string(), answer);
    }

    /// Compute the end-of-run results and answer report
    pub fn finish(&mut self, diagram: &CompiledDiagram) {
        self.results = diagram.surfaced_results(&self.answers);
        self.answer_report = diagram.answer_report(&self.answers);
    }
}
