//! Core diagram type definitions
//!
//! Defines the documents produced by the flow editor: diagrams, their typed nodes,
//! conditional edges and declared results. These types are serialized to and from
//! JSON in the editor's camelCase shape, both for persistence and for the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Values produced while running a diagram, keyed by node id
pub type Answers = serde_json::Map<String, Value>;

/// A complete diagram as authored in the editor
///
/// Diagrams are stored as JSON in SQLite and compiled into a `CompiledDiagram`
/// before they can be executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    /// Unique diagram identifier, assigned on creation when left empty
    #[serde(default)]
    pub id: String,
    /// Human-readable title
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Opaque author reference, supplied by whatever sits in front of the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub public: bool,
    /// Results surfaced at the end of a run when their expression holds
    #[serde(default)]
    pub result: Vec<ResultDefinition>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges in declaration order; order is the tie-break between eligible edges
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Diagram {
    /// Build an unsaved diagram from a node and edge list
    pub fn new(title: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            description: String::new(),
            author: None,
            public: false,
            result: Vec::new(),
            nodes,
            edges,
            viewport: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Attach declared results
    pub fn with_results(mut self, results: Vec<ResultDefinition>) -> Self {
        self.result = results;
        self
    }
}

/// A single typed node in the diagram
///
/// `data` is the type-specific payload written by the editor's property panels.
/// Executors pull the fields they need out of it (prompt, model, endpoint, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured: Option<Measured>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: Value::Object(Default::default()),
            position: None,
            measured: None,
        }
    }

    /// Replace the node's payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Read a string field from the payload
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Display label, falling back to the id
    pub fn label(&self) -> &str {
        self.data_str("label").unwrap_or(&self.id)
    }

    /// Validity expression of a question node, if one was written
    pub fn validity_expression(&self) -> Option<&str> {
        self.data_str("valid").filter(|expr| !expr.trim().is_empty())
    }
}

/// Available node types
///
/// - Input / Output: auto-executed markers for the start and end of a flow
/// - Question / GeminiInfo: suspend the run until an answer is submitted
/// - HttpRequest, Gemini, Puter: invoke an asynchronous executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Input,
    /// Expected data: { "question": "...", "questionType": "text", "valid": "answers['q1'] != ''" }
    Question,
    /// Expected data: { "endpoint": "https://...", "method": "GET", "responseType": "json" }
    HttpRequest,
    GeminiInfo,
    /// Expected data: { "prompt": "Summarize {{q1}}", "model": "gemini-2.5-flash", "temperature": 0.4 }
    Gemini,
    /// Expected data: { "prompt": "Translate {{q1}}", "model": "gpt-5-nano" }
    Puter,
    Output,
    /// Any type string this engine does not know about
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    /// Nodes that go through an asynchronous executor
    pub fn is_effectful(self) -> bool {
        matches!(self, NodeKind::HttpRequest | NodeKind::Gemini | NodeKind::Puter)
    }
}

/// Directed connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Editor edge style, kept for round-tripping only
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EdgeData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeData {
    /// Boolean expression over the answers, e.g. `answers['q1'] === 'yes'`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Edge {
    /// Create an unconditional edge
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            edge_type: None,
            data: None,
        }
    }

    /// Create an edge guarded by a condition expression
    pub fn when(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            data: Some(EdgeData {
                condition: Some(condition.into()),
            }),
            ..Self::new(id, source, target)
        }
    }

    /// The guard expression; blank conditions count as no condition
    pub fn condition(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.condition.as_deref())
            .filter(|condition| !condition.trim().is_empty())
    }
}

/// Result declared on a diagram, surfaced when `value` evaluates true
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDefinition {
    pub label: String,
    /// Condition expression deciding whether the result applies
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Measured {
    pub width: f64,
    pub height: f64,
}
