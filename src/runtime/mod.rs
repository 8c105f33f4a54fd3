/// Runtime Execution Engine
///
/// Drives diagram runs:
/// - `engine`: the synchronous per-run state machine
/// - `session`: the tokio task that owns an engine and runs its executor calls
/// - `executor` and the HTTP / Gemini / Puter executors behind it

// Per-run execution state
pub mod state;

// State machine over events and executor completions
pub mod engine;

// Executor trait, failures and the kind → executor registry
pub mod executor;

// Effectful node executors
pub mod http;
pub mod prompt;
pub mod gemini;
pub mod puter;

// Prompt placeholder rendering
pub mod template;

// Session task and handles
pub mod session;

pub use engine::{
    Directive, FlowEngine, FlowEvent, Invocation, InvocationId, RunSnapshot, RunState, RunningState,
    StopPolicy,
};
pub use executor::{ExecutorFailure, ExecutorRegistry, NodeExecutor};
pub use session::{spawn_session, FlowHandle, SessionTable, DEFAULT_MAX_RUNS, DEFAULT_RUN_TTL};
pub use state::{ExecutionState, NodeStatus};
