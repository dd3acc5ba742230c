//! Host-side integration hooks for the orchestrators
//!
//! Abstracts the cluster manager's host plumbing: announcing a node that
//! finished provisioning, and removing per-host artifacts when a node is
//! decommissioned. Deployments without extra plumbing use [`LogHooks`].

use anyhow::Result;
use gantry_common::NodeName;
use std::future::Future;
use std::net::IpAddr;
use tracing::info;

/// Details announced for a node that finished provisioning
#[derive(Debug, Clone)]
pub struct NodeReadyNotice {
    pub name: NodeName,
    pub hardware_profile: String,
    pub software_profile: String,
    pub boot_ip: Option<IpAddr>,
}

/// Host-side integration points for provisioning and decommissioning
///
/// The same orchestration logic works against real deployments and test
/// doubles through this trait.
pub trait HostHooks: Send + Sync {
    /// Announce a node that reached the provisioned state
    ///
    /// Failures are logged by the caller and never fail the launch.
    fn notify_node_ready(
        &self,
        notice: &NodeReadyNotice,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove host-side artifacts for a node being decommissioned
    ///
    /// Called exactly once per node, whether or not the provider-side
    /// teardown succeeded.
    fn cleanup_host_artifacts(&self, name: &NodeName) -> impl Future<Output = Result<()>> + Send;
}

/// Hooks that only log, for deployments without host plumbing
pub struct LogHooks;

impl LogHooks {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl HostHooks for LogHooks {
    async fn notify_node_ready(&self, notice: &NodeReadyNotice) -> Result<()> {
        info!(
            node = %notice.name,
            hardware_profile = %notice.hardware_profile,
            software_profile = %notice.software_profile,
            boot_ip = ?notice.boot_ip,
            "Node ready"
        );
        Ok(())
    }

    async fn cleanup_host_artifacts(&self, name: &NodeName) -> Result<()> {
        info!(node = %name, "Host artifacts cleaned");
        Ok(())
    }
}
