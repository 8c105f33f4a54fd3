//! Diagram compilation
//!
//! Turns an authored `Diagram` into the structure the engine executes: node lookups,
//! per-source edge lists in declaration order, and every expression (edge conditions,
//! result values, question validity) parsed once up front.
//!
//! Structural problems that the engine can survive (dangling edges, cycles, missing
//! start node) are reported as warnings; only ambiguities the engine cannot resolve
//! are hard errors.

use crate::condition::Predicate;
use crate::diagram::types::{Answers, Diagram, Node, NodeKind, ResultDefinition};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that prevent a diagram from being compiled
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagramError {
    #[error("Duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("Node at position {0} has an empty id")]
    EmptyNodeId(usize),
}

/// An outgoing edge with its guard compiled
#[derive(Debug, Clone)]
pub struct CompiledEdge {
    pub id: String,
    pub target: String,
    /// `None` means the edge is always eligible
    pub guard: Option<Predicate>,
}

/// One line of the answer report shown at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerReport {
    pub id: String,
    pub answer: Value,
    /// Whether the node's validity expression holds; false when it has none
    pub valid: bool,
}

/// Execution-ready diagram
#[derive(Debug, Clone)]
pub struct CompiledDiagram {
    diagram: Diagram,
    node_index: HashMap<String, usize>,
    outgoing: HashMap<String, Vec<CompiledEdge>>,
    results: Vec<(ResultDefinition, Predicate)>,
    validity: HashMap<String, Predicate>,
    start_node_id: Option<String>,
    warnings: Vec<String>,
}

impl CompiledDiagram {
    /// Compile a diagram, collecting warnings for recoverable structural issues
    pub fn compile(diagram: Diagram) -> Result<Self, DiagramError> {
        tracing::debug!(
            "🏗️ Compiling diagram '{}' with {} nodes and {} edges",
            diagram.id,
            diagram.nodes.len(),
            diagram.edges.len()
        );

        let mut warnings = Vec::new();
        let mut node_index = HashMap::new();
        for (position, node) in diagram.nodes.iter().enumerate() {
            if node.id.is_empty() {
                return Err(DiagramError::EmptyNodeId(position));
            }
            if node_index.insert(node.id.clone(), position).is_some() {
                return Err(DiagramError::DuplicateNode(node.id.clone()));
            }
            if node.kind == NodeKind::Unknown {
                warnings.push(format!("Node '{}' has an unsupported type", node.id));
            }
        }

        let mut outgoing: HashMap<String, Vec<CompiledEdge>> = HashMap::new();
        for edge in &diagram.edges {
            for end in [&edge.source, &edge.target] {
                if !node_index.contains_key(end) {
                    warnings.push(format!("Edge '{}' references unknown node '{}'", edge.id, end));
                }
            }
            let guard = edge.condition().map(Predicate::new);
            if let Some(error) = guard.as_ref().and_then(Predicate::compile_error) {
                warnings.push(format!("Condition on edge '{}' does not parse: {}", edge.id, error));
            }
            outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(CompiledEdge {
                    id: edge.id.clone(),
                    target: edge.target.clone(),
                    guard,
                });
        }

        let mut results = Vec::new();
        for definition in &diagram.result {
            if definition.label.is_empty() || definition.value.is_empty() {
                continue;
            }
            let predicate = Predicate::new(&definition.value);
            if let Some(error) = predicate.compile_error() {
                warnings.push(format!("Result '{}' does not parse: {}", definition.label, error));
            }
            results.push((definition.clone(), predicate));
        }

        let validity = diagram
            .nodes
            .iter()
            .filter_map(|node| {
                node.validity_expression()
                    .map(|expr| (node.id.clone(), Predicate::new(expr)))
            })
            .collect();

        let inputs: Vec<&Node> = diagram
            .nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Input)
            .collect();
        let start_node_id = inputs.first().map(|node| node.id.clone());
        match inputs.len() {
            0 => warnings.push("Diagram has no input node; runs complete immediately".to_string()),
            1 => {}
            n => warnings.push(format!(
                "Diagram has {} input nodes; runs start at '{}'",
                n,
                inputs[0].id
            )),
        }

        warnings.extend(graph_warnings(&diagram, start_node_id.as_deref()));
        for warning in &warnings {
            tracing::warn!("⚠️ Diagram '{}': {}", diagram.id, warning);
        }

        Ok(Self {
            diagram,
            node_index,
            outgoing,
            results,
            validity,
            start_node_id,
            warnings,
        })
    }

    pub fn id(&self) -> &str {
        &self.diagram.id
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn nodes(&self) -> &[Node] {
        &self.diagram.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.diagram.nodes[i])
    }

    /// The node a run starts at
    pub fn start_node_id(&self) -> Option<&str> {
        self.start_node_id.as_deref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Outgoing edges of a node in declaration order
    pub fn outgoing(&self, node_id: &str) -> &[CompiledEdge] {
        self.outgoing.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve the next node: the target of the first edge whose guard is absent or holds
    pub fn next_node_id(&self, current: &str, answers: &Answers) -> Option<String> {
        for edge in self.outgoing(current) {
            let eligible = match &edge.guard {
                None => true,
                Some(guard) => guard.check(answers).unwrap_or_else(|e| {
                    tracing::warn!(
                        "⚠️ Invalid condition on edge '{}' (`{}`): {}",
                        edge.id,
                        guard.source(),
                        e
                    );
                    false
                }),
            };
            if eligible {
                tracing::debug!("➡️ Edge '{}' taken: {} → {}", edge.id, current, edge.target);
                return Some(edge.target.clone());
            }
        }
        None
    }

    /// Declared results whose expression holds, in declaration order
    pub fn surfaced_results(&self, answers: &Answers) -> Vec<ResultDefinition> {
        self.results
            .iter()
            .filter(|(_, predicate)| predicate.holds(answers))
            .map(|(definition, _)| definition.clone())
            .collect()
    }

    /// Every recorded answer, flagged with its node's validity
    pub fn answer_report(&self, answers: &Answers) -> Vec<AnswerReport> {
        answers
            .iter()
            .map(|(id, answer)| AnswerReport {
                id: id.clone(),
                answer: answer.clone(),
                valid: self
                    .validity
                    .get(id)
                    .is_some_and(|predicate| predicate.holds(answers)),
            })
            .collect()
    }
}

/// Graph-level checks: cycles and nodes the start node can never reach
fn graph_warnings(diagram: &Diagram, start_node_id: Option<&str>) -> Vec<String> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
    for node in &diagram.nodes {
        indices.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
    }
    for edge in &diagram.edges {
        if let (Some(&from), Some(&to)) = (
            indices.get(edge.source.as_str()),
            indices.get(edge.target.as_str()),
        ) {
            graph.add_edge(from, to, ());
        }
    }

    let mut warnings = Vec::new();
    if is_cyclic_directed(&graph) {
        warnings.push("Diagram contains a cycle; revisited nodes overwrite their answers".to_string());
    }

    if let Some(&start) = start_node_id.and_then(|id| indices.get(id)) {
        let mut reachable = HashSet::new();
        let mut dfs = Dfs::new(&graph, start);
        while let Some(index) = dfs.next(&graph) {
            reachable.insert(index);
        }
        let unreachable: Vec<&str> = graph
            .node_indices()
            .filter(|index| !reachable.contains(index))
            .map(|index| graph[index])
            .collect();
        if !unreachable.is_empty() {
            warnings.push(format!(
                "Nodes unreachable from the input node: {}",
                unreachable.join(", ")
            ));
        }
    }

    warnings
}
