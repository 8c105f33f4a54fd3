#![allow(dead_code)]

use axum::Router;
use flowrun::diagram::{Answers, Diagram, Edge, Node, NodeKind};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A running throwaway server; shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn serve(router: Router) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });
    TestServer {
        addr,
        shutdown: Some(shutdown_tx),
    }
}

pub fn answers(value: Value) -> Answers {
    value.as_object().cloned().unwrap_or_default()
}

/// input(start) → question(q) → output(end)
pub fn linear_question() -> Diagram {
    Diagram::new(
        "linear",
        vec![
            Node::new("start", NodeKind::Input),
            Node::new("q", NodeKind::Question),
            Node::new("end", NodeKind::Output),
        ],
        vec![Edge::new("e1", "start", "q"), Edge::new("e2", "q", "end")],
    )
}

/// input(start) → <kind>(call) → output(end)
pub fn single_call(kind: NodeKind, data: Value) -> Diagram {
    Diagram::new(
        "single-call",
        vec![
            Node::new("start", NodeKind::Input),
            Node::new("call", kind).with_data(data),
            Node::new("end", NodeKind::Output),
        ],
        vec![Edge::new("e1", "start", "call"), Edge::new("e2", "call", "end")],
    )
}
