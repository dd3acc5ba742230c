//! Best-effort node decommissioning
//!
//! Tears down each node independently: terminate its instance, confirm the
//! termination, then clear the cache entry and the registry record. Host
//! cleanup runs exactly once per node no matter how the provider side went.
//! Unconfirmed terminations keep their records so a later pass can retry.

use crate::config::AdapterConfig;
use crate::hooks::HostHooks;
use crate::provider::ComputeProvider;
use crate::registry::{NodeRecord, NodeRegistry, RegistrySession};
use crate::store::InstanceCache;
use crate::waiter::{self, WaitError};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use gantry_common::{InstanceId, InstanceLifecycle};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Drives node teardown for the cluster manager
pub struct DecommissionOrchestrator<P, R, H> {
    provider: Arc<P>,
    registry: Arc<R>,
    hooks: Arc<H>,
    cache: InstanceCache,
    config: AdapterConfig,
}

impl<P, R, H> DecommissionOrchestrator<P, R, H>
where
    P: ComputeProvider,
    R: NodeRegistry,
    H: HostHooks,
{
    pub fn new(
        provider: Arc<P>,
        registry: Arc<R>,
        hooks: Arc<H>,
        cache: InstanceCache,
        config: AdapterConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            hooks,
            cache,
            config,
        }
    }

    /// Decommission the given nodes, tolerating per-node failures.
    ///
    /// A node whose termination could not be confirmed keeps its cache and
    /// registry entries; everything about the failure lands in the logs.
    #[instrument(skip_all, fields(count = nodes.len()))]
    pub async fn decommission(
        &self,
        nodes: &[NodeRecord],
        session: &RegistrySession,
    ) -> Result<()> {
        let pool_size = self.config.max_concurrent();

        let outcomes: Vec<bool> = stream::iter(nodes.iter().map(|node| async move {
            match self.decommission_one(node, session).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(node = %node.name, error = format!("{e:#}"), "Decommission failed");
                    false
                }
            }
        }))
        .buffer_unordered(pool_size)
        .collect()
        .await;

        let deleted = outcomes.iter().filter(|done| **done).count();
        info!("{} node(s) deleted", deleted);

        Ok(())
    }

    /// One teardown unit: provider removal, then host cleanup.
    ///
    /// `Ok(false)` means the node was left in place on purpose, e.g. after
    /// an unconfirmed termination.
    async fn decommission_one(
        &self,
        node: &NodeRecord,
        session: &RegistrySession,
    ) -> Result<bool> {
        let removal = self.remove_instance(node, session).await;

        // Host cleanup runs exactly once per node, whatever happened on the
        // provider side.
        if let Err(e) = self.hooks.cleanup_host_artifacts(&node.name).await {
            warn!(node = %node.name, error = format!("{e:#}"), "Host artifact cleanup failed");
        }

        removal
    }

    async fn remove_instance(&self, node: &NodeRecord, session: &RegistrySession) -> Result<bool> {
        let Some(entry) = self.cache.get(&node.name).await? else {
            // No cached identity means no instance to terminate; the
            // registry record still has to go.
            info!(node = %node.name, "No cached instance, removing registry record only");
            self.forget_node(node, session).await?;
            return Ok(true);
        };

        let instance_id = entry.instance_id;

        match self.provider.terminate_instance(&instance_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                info!(
                    instance = %instance_id.short(),
                    node = %node.name,
                    "Instance already terminated"
                );
                self.cache.delete(&node.name).await?;
                self.forget_node(node, session).await?;
                return Ok(true);
            }
            // Conservative: keep the cache entry and registry record so a
            // later pass can retry the terminate.
            Err(e) => return Err(e).context("provider terminate call failed"),
        }

        debug!(instance = %instance_id.short(), node = %node.name, "Terminating...");

        // Give the provider a moment before polling begins
        tokio::time::sleep(self.config.terminate_grace()).await;

        let wait_config = self.config.terminate_wait_config();
        let progress = |id: &InstanceId, state: InstanceLifecycle| {
            debug!(instance = %id.short(), state = %state, "Waiting for instance to terminate");
        };
        match waiter::wait_for_lifecycle(
            self.provider.as_ref(),
            &instance_id,
            InstanceLifecycle::Terminated,
            &wait_config,
            None,
            Some(&progress),
        )
        .await
        {
            Ok(()) => {}
            Err(WaitError::Provider(e)) if e.is_not_found() => {
                debug!(
                    instance = %instance_id.short(),
                    "Instance disappeared while polling, treating as terminated"
                );
            }
            Err(e) if e.is_timeout() => {
                // Unconfirmed: the instance may still be stopping. Keep the
                // cache entry and registry record for a retry.
                warn!(
                    instance = %instance_id.short(),
                    node = %node.name,
                    error = %e,
                    "Termination not confirmed, keeping node state"
                );
                return Ok(false);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("waiting for instance {} to terminate", instance_id.short())
                })
            }
        }

        // Termination confirmed; only now do the records go away
        self.cache.delete(&node.name).await?;
        self.forget_node(node, session).await?;

        info!(instance = %instance_id.short(), node = %node.name, "Instance terminated");

        Ok(true)
    }

    async fn forget_node(&self, node: &NodeRecord, session: &RegistrySession) -> Result<()> {
        self.registry.delete_node(session, &node.name).await?;
        self.registry.commit(session).await?;
        Ok(())
    }
}
