/// flowrun: execution engine and service for conditional flow diagrams
///
/// Diagrams are graphs of typed nodes (questions, HTTP calls, AI prompts) joined by
/// edges guarded by small boolean expressions over the answers collected so far.
/// Each run is a state machine driven by a dedicated tokio task.

// Core configuration and setup
pub mod config;

// Sandboxed expression language for edge conditions, results and validity checks
pub mod condition;

// Diagram documents, compilation, storage and hot-reload registry
pub mod diagram;

// Local secret store for provider API keys
pub mod credentials;

// Run state machine, executors and sessions
pub mod runtime;

// HTTP API layer
pub mod api;

// Server setup and initialization
pub mod server;

pub use condition::{evaluate, Condition, ConditionError};
pub use diagram::{CompiledDiagram, Diagram, Edge, Node, NodeKind, ResultDefinition};
pub use runtime::{FlowEngine, FlowEvent, FlowHandle, RunSnapshot, RunState, StopPolicy};
pub use server::start_server;
