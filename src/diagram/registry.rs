/// Hot-reload diagram registry using ArcSwap
///
/// Holds every stored diagram in compiled form. Updates swap the whole map, so runs
/// that already hold an `Arc<CompiledDiagram>` keep executing the version they
/// started with while new runs pick up the edit.

use crate::diagram::{compiled::CompiledDiagram, storage::DiagramStorage};
use anyhow::Result;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

#[derive(Debug)]
pub struct DiagramRegistry {
    /// Key: diagram_id, Value: compiled diagram
    diagrams: ArcSwap<HashMap<String, Arc<CompiledDiagram>>>,
    storage: DiagramStorage,
}

impl DiagramRegistry {
    pub fn new(storage: DiagramStorage) -> Self {
        Self {
            diagrams: ArcSwap::new(Arc::new(HashMap::new())),
            storage,
        }
    }

    /// Populate the registry from storage
    ///
    /// Diagrams that no longer compile are logged and left out; they stay in
    /// storage so they can still be fetched and fixed.
    pub async fn init_from_storage(&self) -> Result<()> {
        let stored = self.storage.load_all_diagrams().await?;
        let mut compiled = HashMap::with_capacity(stored.len());
        for (id, diagram) in stored {
            match CompiledDiagram::compile(diagram) {
                Ok(diagram) => {
                    compiled.insert(id, Arc::new(diagram));
                }
                Err(e) => tracing::error!("❌ Diagram '{}' failed to compile: {}", id, e),
            }
        }

        self.diagrams.store(Arc::new(compiled));
        tracing::info!(
            "📊 Initialized diagram registry with {} diagrams",
            self.diagrams.load().len()
        );
        Ok(())
    }

    /// Recompile one diagram from storage and swap it in
    pub async fn reload_diagram(&self, diagram_id: &str) -> Result<Arc<CompiledDiagram>> {
        let diagram = self
            .storage
            .get_diagram(diagram_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Diagram not found: {}", diagram_id))?;
        let compiled = Arc::new(CompiledDiagram::compile(diagram)?);

        self.diagrams.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(diagram_id.to_string(), Arc::clone(&compiled));
            next
        });

        tracing::info!("🔄 Hot-reloaded diagram: {}", diagram_id);
        Ok(compiled)
    }

    /// Lock-free lookup
    pub fn get_diagram(&self, diagram_id: &str) -> Option<Arc<CompiledDiagram>> {
        self.diagrams.load().get(diagram_id).cloned()
    }

    pub fn list_diagram_ids(&self) -> Vec<String> {
        self.diagrams.load().keys().cloned().collect()
    }

    pub fn remove_diagram(&self, diagram_id: &str) {
        let mut removed = false;
        self.diagrams.rcu(|current| {
            let mut next = (**current).clone();
            removed = next.remove(diagram_id).is_some();
            next
        });
        if removed {
            tracing::info!("🗑️ Removed diagram from registry: {}", diagram_id);
        }
    }
}
