/// Run sessions
///
/// A session is one tokio task that owns a `FlowEngine` and processes its inputs
/// strictly one at a time: events from callers and completions of the single
/// executor call that may be in flight. Callers only ever hold a `FlowHandle`,
/// which can enqueue events and observe snapshots.

use crate::diagram::CompiledDiagram;
use crate::runtime::engine::{Directive, FlowEngine, FlowEvent, InvocationId, RunSnapshot, StopPolicy};
use crate::runtime::executor::{ExecutorFailure, ExecutorRegistry};
use anyhow::Result;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

const COMMAND_BUFFER: usize = 32;

/// Runs nobody has looked at for this long are discarded
pub const DEFAULT_RUN_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_RUNS: usize = 10_000;

enum Command {
    Event(FlowEvent, oneshot::Sender<RunSnapshot>),
    Shutdown,
}

struct InFlight {
    id: InvocationId,
    task: JoinHandle<Result<Value, ExecutorFailure>>,
}

enum Wakeup {
    Command(Command),
    Completed(InvocationId, Result<Value, ExecutorFailure>),
    Closed,
}

struct FlowSession {
    id: Uuid,
    engine: FlowEngine,
    executors: ExecutorRegistry,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<RunSnapshot>,
    in_flight: Option<InFlight>,
}

impl FlowSession {
    async fn run(mut self) {
        tracing::info!("🧵 Session {} started for diagram '{}'", self.id, self.engine.diagram().id());

        loop {
            let wakeup = tokio::select! {
                command = self.commands.recv() => command.map_or(Wakeup::Closed, Wakeup::Command),
                (id, outcome) = join_in_flight(&mut self.in_flight) => Wakeup::Completed(id, outcome),
            };

            match wakeup {
                Wakeup::Command(Command::Event(event, ack)) => {
                    let directive = self.engine.send(event);
                    self.apply(directive);
                    let snapshot = self.publish();
                    // The caller may have given up waiting
                    let _ = ack.send(snapshot);
                }
                Wakeup::Completed(id, outcome) => {
                    let directive = self.engine.complete(id, outcome);
                    self.apply(directive);
                    self.publish();
                }
                Wakeup::Command(Command::Shutdown) | Wakeup::Closed => break,
            }
        }

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        tracing::info!("🧵 Session {} shut down", self.id);
    }

    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::Wait => {}
            Directive::Invoke(invocation) => {
                if let Some(previous) = self.in_flight.take() {
                    previous.task.abort();
                }
                let id = invocation.id;
                let task = self.executors.spawn(invocation);
                self.in_flight = Some(InFlight { id, task });
            }
            Directive::Cancel(id) => {
                if self.in_flight.as_ref().is_some_and(|in_flight| in_flight.id == id) {
                    if let Some(in_flight) = self.in_flight.take() {
                        in_flight.task.abort();
                        tracing::debug!("🛑 Aborted invocation {}", id);
                    }
                }
            }
        }
    }

    fn publish(&self) -> RunSnapshot {
        let snapshot = self.engine.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }
}

/// Wait for the in-flight call, or forever when there is none
async fn join_in_flight(slot: &mut Option<InFlight>) -> (InvocationId, Result<Value, ExecutorFailure>) {
    let Some(in_flight) = slot.as_mut() else {
        return std::future::pending().await;
    };
    let outcome = (&mut in_flight.task)
        .await
        .unwrap_or_else(|e| Err(ExecutorFailure::from_join_error(e)));
    let id = in_flight.id;
    *slot = None;
    (id, outcome)
}

/// Caller side of a session
#[derive(Debug, Clone)]
pub struct FlowHandle {
    id: Uuid,
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<RunSnapshot>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Event(event, _) => f.debug_tuple("Event").field(event).finish(),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl FlowHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Enqueue an event and wait for the snapshot taken right after it was applied
    pub async fn send(&self, event: FlowEvent) -> Result<RunSnapshot> {
        let (ack, applied) = oneshot::channel();
        self.commands
            .send(Command::Event(event, ack))
            .await
            .map_err(|_| anyhow::anyhow!("Session {} is no longer running", self.id))?;
        applied
            .await
            .map_err(|_| anyhow::anyhow!("Session {} dropped the event", self.id))
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for(&self, predicate: impl Fn(&RunSnapshot) -> bool) -> Result<RunSnapshot> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| anyhow::anyhow!("Session {} ended", self.id))?;
        Ok(snapshot.clone())
    }

    /// Stop the session task; the run is abandoned wherever it is
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| anyhow::anyhow!("Session {} is no longer running", self.id))
    }
}

/// Start a session for `diagram`; the run waits in `idle` for START
pub fn spawn_session(
    diagram: Arc<CompiledDiagram>,
    executors: ExecutorRegistry,
    policy: StopPolicy,
) -> FlowHandle {
    let id = Uuid::new_v4();
    let engine = FlowEngine::new(diagram, policy);
    let (snapshots, snapshot_rx) = watch::channel(engine.snapshot());
    let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);

    let session = FlowSession {
        id,
        engine,
        executors,
        commands: command_rx,
        snapshots,
        in_flight: None,
    };
    tokio::spawn(session.run());

    FlowHandle {
        id,
        commands,
        snapshots: snapshot_rx,
    }
}

#[derive(Debug)]
struct Entry {
    handle: FlowHandle,
    touched: Instant,
}

/// Live sessions keyed by run id
///
/// Every lookup refreshes a session's lease. Sessions whose lease is older than
/// the table's TTL are shut down by `evict_expired`, whatever state the run is in.
#[derive(Debug)]
pub struct SessionTable {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::with_limits(DEFAULT_RUN_TTL, DEFAULT_MAX_RUNS)
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    /// Track `handle`; when the table is full even after evicting expired
    /// sessions, the new session is shut down and rejected.
    pub async fn insert(&self, handle: FlowHandle) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let expired = if sessions.len() >= self.capacity {
            take_expired(&mut sessions, self.ttl)
        } else {
            Vec::new()
        };
        let accepted = sessions.len() < self.capacity;
        if accepted {
            sessions.insert(
                handle.id(),
                Entry {
                    handle: handle.clone(),
                    touched: Instant::now(),
                },
            );
        }
        drop(sessions);

        close_all(&expired).await;
        if !accepted {
            close_all(std::slice::from_ref(&handle)).await;
            anyhow::bail!("Run limit of {} sessions reached", self.capacity);
        }
        Ok(())
    }

    pub async fn get(&self, id: &Uuid) -> Option<FlowHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.touched = Instant::now();
        Some(entry.handle.clone())
    }

    pub async fn remove(&self, id: &Uuid) -> Option<FlowHandle> {
        self.sessions.write().await.remove(id).map(|entry| entry.handle)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Shut down and forget every session untouched for longer than the TTL
    pub async fn evict_expired(&self) -> Vec<Uuid> {
        let expired = take_expired(&mut *self.sessions.write().await, self.ttl);
        close_all(&expired).await;
        expired.iter().map(FlowHandle::id).collect()
    }

    /// Periodically evict expired sessions until the table is dropped
    pub fn spawn_sweeper(table: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let table = Arc::downgrade(table);
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(table) = table.upgrade() else {
                    break;
                };
                let evicted = table.evict_expired().await;
                if !evicted.is_empty() {
                    tracing::info!("🧹 Evicted {} expired run(s)", evicted.len());
                }
            }
        })
    }
}

fn take_expired(sessions: &mut HashMap<Uuid, Entry>, ttl: Duration) -> Vec<FlowHandle> {
    let expired: Vec<Uuid> = sessions
        .iter()
        .filter(|(_, entry)| entry.touched.elapsed() >= ttl)
        .map(|(id, _)| *id)
        .collect();
    expired
        .iter()
        .filter_map(|id| sessions.remove(id))
        .map(|entry| entry.handle)
        .collect()
}

async fn close_all(handles: &[FlowHandle]) {
    for handle in handles {
        if let Err(e) = handle.shutdown().await {
            tracing::debug!("Session {} already ended: {}", handle.id(), e);
        }
    }
}
