//! Node registry gateway
//!
//! The cluster manager owns the authoritative node registry; the orchestrator
//! only drives it through the [`NodeRegistry`] trait, and always under an
//! explicit session handle so concurrent units stay isolated and auditable.

use anyhow::Result;
use gantry_common::NodeName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use uuid::Uuid;

/// Handle identifying one registry session.
///
/// Every gateway call takes the session explicitly. Implementations map it
/// onto whatever transaction discipline their store requires and serialize
/// concurrent writes internally; the orchestrator does no locking of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySession(String);

impl RegistrySession {
    /// Open a fresh session handle.
    pub fn open() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry-visible state of a node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Launching,
    Provisioned,
    Failed,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Launching => "launching",
            NodeState::Provisioned => "provisioned",
            NodeState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "launching" => Some(NodeState::Launching),
            "provisioned" => Some(NodeState::Provisioned),
            "failed" => Some(NodeState::Failed),
            _ => None,
        }
    }
}

/// Parse NodeState from string with fallback to Failed
pub fn parse_node_state(s: &str) -> NodeState {
    NodeState::parse(s).unwrap_or(NodeState::Failed)
}

/// Resolved network interface on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nic {
    pub ip: IpAddr,
    /// Exactly one interface per node carries the boot flag.
    pub boot: bool,
}

/// A node record as the registry sees it.
///
/// The orchestrator holds one transiently during a launch or decommission
/// unit and drops it after the final commit or rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: NodeName,
    pub state: NodeState,
    pub hardware_profile: String,
    pub software_profile: String,
    pub nics: Vec<Nic>,
    /// Session that created the record, kept for audit.
    pub session_id: String,
}

impl NodeRecord {
    /// Fresh placeholder in `Launching` state with no interfaces.
    pub fn placeholder(
        name: NodeName,
        hardware_profile: &str,
        software_profile: &str,
        session: &RegistrySession,
    ) -> Self {
        Self {
            name,
            state: NodeState::Launching,
            hardware_profile: hardware_profile.to_string(),
            software_profile: software_profile.to_string(),
            nics: Vec::new(),
            session_id: session.id().to_string(),
        }
    }

    /// IP of the boot interface, if interfaces have been resolved.
    pub fn boot_ip(&self) -> Option<IpAddr> {
        self.nics.iter().find(|nic| nic.boot).map(|nic| nic.ip)
    }
}

/// Gateway to the cluster's node registry.
///
/// Writes are staged per session and made durable by [`commit`]; stores with
/// per-statement durability may treat commit as a sync point.
///
/// [`commit`]: NodeRegistry::commit
pub trait NodeRegistry: Send + Sync {
    /// Stage a new node record
    fn add_node(
        &self,
        session: &RegistrySession,
        node: &NodeRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Stage changes to an existing record (state transition, interfaces)
    fn update_node(
        &self,
        session: &RegistrySession,
        node: &NodeRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Stage removal of a record
    fn delete_node(
        &self,
        session: &RegistrySession,
        name: &NodeName,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Make all staged changes for the session durable
    fn commit(&self, session: &RegistrySession) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_state_round_trip() {
        for state in [NodeState::Launching, NodeState::Provisioned, NodeState::Failed] {
            assert_eq!(NodeState::parse(state.as_str()), Some(state));
        }
        assert_eq!(NodeState::parse("unknown"), None);
        assert_eq!(parse_node_state("unknown"), NodeState::Failed);
    }

    #[test]
    fn test_placeholder_shape() {
        let session = RegistrySession::open();
        let node = NodeRecord::placeholder(
            NodeName::new("compute-01.example.com"),
            "hw-default",
            "sw-compute",
            &session,
        );

        assert_eq!(node.state, NodeState::Launching);
        assert!(node.nics.is_empty());
        assert_eq!(node.session_id, session.id());
        assert_eq!(node.boot_ip(), None);
    }

    #[test]
    fn test_boot_ip_picks_flagged_nic() {
        let session = RegistrySession::open();
        let mut node = NodeRecord::placeholder(
            NodeName::new("compute-02.example.com"),
            "hw-default",
            "sw-compute",
            &session,
        );
        node.nics = vec![
            Nic {
                ip: "10.0.0.4".parse().unwrap(),
                boot: true,
            },
            Nic {
                ip: "10.0.1.4".parse().unwrap(),
                boot: false,
            },
        ];

        assert_eq!(node.boot_ip(), Some("10.0.0.4".parse().unwrap()));
    }
}
