/// Diagram Management Layer
///
/// Diagram documents, their compilation into an execution-ready form, SQLite
/// persistence and the hot-reload registry.

// Editor document types
pub mod types;

// Validation and ahead-of-time expression compilation
pub mod compiled;

// SQLite persistence with sqlx
pub mod storage;

// Lock-free registry of compiled diagrams
pub mod registry;

pub use compiled::{AnswerReport, CompiledDiagram, CompiledEdge, DiagramError};
pub use types::{Answers, Diagram, Edge, EdgeData, Node, NodeKind, ResultDefinition};
