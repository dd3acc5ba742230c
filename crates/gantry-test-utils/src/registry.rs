//! In-memory node registry
//!
//! A strict [`NodeRegistry`] double. Staged operations stay invisible until
//! commit, and commit applies them in staging order against a plain map.
//! Unlike the sqlite registry it bails loudly on misuse (adding a name that
//! exists, updating one that does not), which turns ordering bugs in
//! orchestrator code into test failures instead of silent no-ops.

use anyhow::{bail, Result};
use gantry_adapter::registry::{NodeRecord, NodeRegistry, RegistrySession};
use gantry_common::NodeName;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

enum PendingOp {
    Add(NodeRecord),
    Update(NodeRecord),
    Delete(NodeName),
}

/// Registry double backed by a map instead of sqlite
#[derive(Default)]
pub struct MemoryRegistry {
    committed: Mutex<BTreeMap<String, NodeRecord>>,
    pending: Mutex<HashMap<String, Vec<PendingOp>>>,
    commits: AtomicU32,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn stage(&self, session: &RegistrySession, op: PendingOp) {
        self.pending
            .lock()
            .unwrap()
            .entry(session.id().to_string())
            .or_default()
            .push(op);
    }

    /// Committed records, ordered by node name
    pub fn nodes(&self) -> Vec<NodeRecord> {
        self.committed.lock().unwrap().values().cloned().collect()
    }

    pub fn get(&self, name: &NodeName) -> Option<NodeRecord> {
        self.committed.lock().unwrap().get(name.as_str()).cloned()
    }

    pub fn commit_count(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Operations staged but never committed, across all sessions
    pub fn staged_count(&self) -> usize {
        self.pending.lock().unwrap().values().map(Vec::len).sum()
    }
}

impl NodeRegistry for MemoryRegistry {
    async fn add_node(&self, session: &RegistrySession, node: &NodeRecord) -> Result<()> {
        self.stage(session, PendingOp::Add(node.clone()));
        Ok(())
    }

    async fn update_node(&self, session: &RegistrySession, node: &NodeRecord) -> Result<()> {
        self.stage(session, PendingOp::Update(node.clone()));
        Ok(())
    }

    async fn delete_node(&self, session: &RegistrySession, name: &NodeName) -> Result<()> {
        self.stage(session, PendingOp::Delete(name.clone()));
        Ok(())
    }

    async fn commit(&self, session: &RegistrySession) -> Result<()> {
        let ops = self
            .pending
            .lock()
            .unwrap()
            .remove(session.id())
            .unwrap_or_default();

        self.commits.fetch_add(1, Ordering::SeqCst);

        let mut committed = self.committed.lock().unwrap();
        for op in ops {
            match op {
                PendingOp::Add(node) => {
                    let name = node.name.as_str().to_string();
                    if committed.contains_key(&name) {
                        bail!("node {name} already registered");
                    }
                    committed.insert(name, node);
                }
                PendingOp::Update(node) => {
                    let name = node.name.as_str().to_string();
                    if !committed.contains_key(&name) {
                        bail!("node {name} not registered, cannot update");
                    }
                    committed.insert(name, node);
                }
                PendingOp::Delete(name) => {
                    committed.remove(name.as_str());
                }
            }
        }

        Ok(())
    }
}
