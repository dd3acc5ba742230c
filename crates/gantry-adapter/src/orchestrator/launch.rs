//! Concurrent node launch pipeline
//!
//! Each requested node runs through the same unit pipeline: register a
//! placeholder (unless the provider names the node), launch the instance,
//! wait for it to run, then finalize the registry record, the instance
//! cache, and the host hooks. Units fail independently; the call returns
//! the nodes that finished.

use super::types::{LaunchRequest, NodeSpec};
use crate::bootstrap;
use crate::config::{AdapterConfig, ConfigError};
use crate::hooks::{HostHooks, NodeReadyNotice};
use crate::naming::{NameFormat, NameGenerator};
use crate::provider::ComputeProvider;
use crate::registry::{Nic, NodeRecord, NodeRegistry, NodeState, RegistrySession};
use crate::store::{InstanceCache, InstanceCacheEntry};
use crate::waiter;
use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use gantry_common::{InstanceId, InstanceLifecycle, NodeName};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Values every unit recomputes identically; last writer wins.
#[derive(Debug, Default)]
struct SharedState {
    installer_ip: Mutex<Option<IpAddr>>,
    last_vcpus: Mutex<Option<u32>>,
}

/// Drives concurrent instance launches for the cluster manager
pub struct LaunchOrchestrator<P, R, G, H> {
    provider: Arc<P>,
    registry: Arc<R>,
    namer: Arc<G>,
    hooks: Arc<H>,
    cache: InstanceCache,
    shared: SharedState,
}

impl<P, R, G, H> LaunchOrchestrator<P, R, G, H>
where
    P: ComputeProvider,
    R: NodeRegistry,
    G: NameGenerator,
    H: HostHooks,
{
    pub fn new(
        provider: Arc<P>,
        registry: Arc<R>,
        namer: Arc<G>,
        hooks: Arc<H>,
        cache: InstanceCache,
    ) -> Self {
        Self {
            provider,
            registry,
            namer,
            hooks,
            cache,
            shared: SharedState::default(),
        }
    }

    /// Provision `request.count` nodes, returning the ones that finished.
    ///
    /// Units fail independently; a shorter list than requested is reported
    /// with a warning, not an error. Nodes come back in completion order.
    #[instrument(skip_all, fields(count = request.count, hardware_profile = %request.spec.hardware_profile.name))]
    pub async fn start(
        &self,
        request: LaunchRequest,
        session: &RegistrySession,
    ) -> Result<Vec<NodeRecord>> {
        let config = &request.spec.config;
        config.validate()?;

        // Profile-level naming wins; an empty format falls back to the
        // adapter-wide default.
        let format_source = match request.spec.hardware_profile.name_format.as_str() {
            "" => config.naming.name_format.as_str(),
            profile_format => profile_format,
        };
        let name_format = NameFormat::parse(format_source).map_err(ConfigError::from)?;
        if name_format.is_wildcard() && config.installer.hostname.is_empty() {
            return Err(ConfigError::EmptyInstallerHostname.into());
        }

        let requested = request.count;
        let pool_size = config.max_concurrent();
        let spec = &request.spec;

        info!(
            count = requested,
            shape = %config.provider.shape,
            pool_size,
            "Launching instances"
        );

        let nodes: Vec<NodeRecord> = stream::iter((0..requested).map(|unit| {
            let name_format = &name_format;
            async move {
                match self.launch_one(spec, name_format, session).await {
                    Ok(node) => Some(node),
                    Err(e) => {
                        warn!(unit, error = format!("{e:#}"), "Launch unit failed");
                        None
                    }
                }
            }
        }))
        .buffer_unordered(pool_size)
        .filter_map(|outcome| async move { outcome })
        .collect()
        .await;

        if (nodes.len() as u32) < requested {
            warn!(
                "{} node(s) requested, only {} launched successfully",
                requested,
                nodes.len()
            );
        }

        info!(launched = nodes.len(), "Launch request complete");

        Ok(nodes)
    }

    /// One launch unit, from placeholder to provisioned node
    async fn launch_one(
        &self,
        spec: &NodeSpec,
        name_format: &NameFormat,
        session: &RegistrySession,
    ) -> Result<NodeRecord> {
        let config = &spec.config;

        let placeholder = self.pre_launch(spec, name_format, session).await?;

        // Config problems found this late fail only this unit; nothing has
        // been launched yet, so the placeholder can be rolled back.
        let user_data = match bootstrap::user_data(config, self.installer_ip(config)) {
            Ok(data) => data,
            Err(e) => {
                self.rollback_placeholder(placeholder.as_ref(), session).await;
                return Err(e).context("user-data rendering failed");
            }
        };

        let launch_spec = config.launch_spec(
            placeholder.as_ref().map(|node| node.name.host_label()),
            user_data,
        );

        let instance_id = match self.provider.launch_instance(launch_spec).await {
            Ok(id) => id,
            Err(e) => {
                self.rollback_placeholder(placeholder.as_ref(), session).await;
                return Err(e).context("provider launch call failed");
            }
        };

        info!(instance = %instance_id.short(), "Instance launched");

        let wait_config = config.launch_wait_config();
        let progress = |id: &InstanceId, state: InstanceLifecycle| {
            debug!(instance = %id.short(), state = %state, "Waiting for instance to run");
        };
        if let Err(e) = waiter::wait_for_lifecycle(
            self.provider.as_ref(),
            &instance_id,
            InstanceLifecycle::Running,
            &wait_config,
            None,
            Some(&progress),
        )
        .await
        {
            self.mark_failed(placeholder.as_ref(), session).await;
            return Err(e).with_context(|| {
                format!("instance {} never reached RUNNING", instance_id.short())
            });
        }

        match self
            .post_launch(spec, placeholder.clone(), &instance_id, session)
            .await
        {
            Ok(node) => Ok(node),
            Err(e) => {
                self.mark_failed(placeholder.as_ref(), session).await;
                Err(e)
            }
        }
    }

    /// Register the launch placeholder, unless the provider names the node
    async fn pre_launch(
        &self,
        spec: &NodeSpec,
        name_format: &NameFormat,
        session: &RegistrySession,
    ) -> Result<Option<NodeRecord>> {
        if name_format.is_wildcard() {
            return Ok(None);
        }

        let config = &spec.config;
        let name = self
            .namer
            .generate(session, name_format, config.dns_zone())
            .await?;

        let node = NodeRecord::placeholder(
            name,
            &spec.hardware_profile.name,
            &spec.software_profile.name,
            session,
        );
        self.registry.add_node(session, &node).await?;
        self.registry.commit(session).await?;

        debug!(node = %node.name, "Registered launch placeholder");

        Ok(Some(node))
    }

    /// Finalize a node whose instance is confirmed running
    async fn post_launch(
        &self,
        spec: &NodeSpec,
        placeholder: Option<NodeRecord>,
        instance_id: &InstanceId,
        session: &RegistrySession,
    ) -> Result<NodeRecord> {
        let config = &spec.config;
        let had_placeholder = placeholder.is_some();

        let mut node = match placeholder {
            Some(node) => node,
            None => {
                // Wildcard naming: the provider picked the display name;
                // qualify it with the installer's domain now that the
                // instance exists.
                let instance = self.provider.get_instance(instance_id).await?;
                let name = NodeName::qualified(
                    &instance.display_name,
                    config.domain_suffix().unwrap_or(""),
                );
                NodeRecord::placeholder(
                    name,
                    &spec.hardware_profile.name,
                    &spec.software_profile.name,
                    session,
                )
            }
        };

        let attachments = self
            .provider
            .list_vnic_attachments(instance_id, &config.provider.compartment_id)
            .await?;

        let mut nics = Vec::new();
        for attachment in attachments.iter().filter(|a| a.state.is_attached()) {
            // The first attached interface is the boot interface
            nics.push(Nic {
                ip: attachment.private_ip,
                boot: nics.is_empty(),
            });
        }
        if nics.is_empty() {
            bail!(
                "instance {} has no attached network interfaces",
                instance_id.short()
            );
        }

        node.nics = nics;
        node.state = NodeState::Provisioned;

        if had_placeholder {
            self.registry.update_node(session, &node).await?;
        } else {
            self.registry.add_node(session, &node).await?;
        }
        self.registry.commit(session).await?;

        // Cache and hooks run after the registry committed; their failures
        // degrade later decommissions but do not undo a provisioned node.
        let vcpus = config.effective_vcpus();
        let entry = InstanceCacheEntry {
            instance_id: instance_id.clone(),
            compartment_id: config.provider.compartment_id.clone(),
            shape: config.provider.shape.clone(),
            vcpus,
        };
        if let Err(e) = self.cache.set(&node.name, &entry).await {
            warn!(node = %node.name, error = format!("{e:#}"), "Instance cache write failed");
        }
        *self.shared.last_vcpus.lock().unwrap() = Some(vcpus);

        let notice = NodeReadyNotice {
            name: node.name.clone(),
            hardware_profile: node.hardware_profile.clone(),
            software_profile: node.software_profile.clone(),
            boot_ip: node.boot_ip(),
        };
        if let Err(e) = self.hooks.notify_node_ready(&notice).await {
            warn!(node = %node.name, error = format!("{e:#}"), "Node ready notification failed");
        }

        info!(
            node = %node.name,
            instance = %instance_id.short(),
            ip = ?node.boot_ip(),
            "Node provisioned"
        );

        Ok(node)
    }

    /// Remove a placeholder for a unit whose instance never launched
    async fn rollback_placeholder(
        &self,
        placeholder: Option<&NodeRecord>,
        session: &RegistrySession,
    ) {
        let Some(node) = placeholder else { return };

        info!(node = %node.name, "Rolling back launch placeholder");

        if let Err(e) = self.registry.delete_node(session, &node.name).await {
            warn!(node = %node.name, error = format!("{e:#}"), "Placeholder rollback failed");
            return;
        }
        if let Err(e) = self.registry.commit(session).await {
            warn!(node = %node.name, error = format!("{e:#}"), "Placeholder rollback failed");
        }
    }

    /// Mark a placeholder failed once its instance exists but did not finish
    ///
    /// The record is kept, in failed state, so the operator can reconcile
    /// the instance behind it; deleting it here would orphan the instance.
    async fn mark_failed(&self, placeholder: Option<&NodeRecord>, session: &RegistrySession) {
        let Some(node) = placeholder else { return };

        let mut failed = node.clone();
        failed.state = NodeState::Failed;

        if let Err(e) = self.registry.update_node(session, &failed).await {
            warn!(node = %node.name, error = format!("{e:#}"), "Failed-state update failed");
            return;
        }
        if let Err(e) = self.registry.commit(session).await {
            warn!(node = %node.name, error = format!("{e:#}"), "Failed-state update failed");
        }
    }

    /// Installer IP for user-data rendering; resolved once, then reused
    fn installer_ip(&self, config: &AdapterConfig) -> Option<IpAddr> {
        let mut cached = self.shared.installer_ip.lock().unwrap();
        if cached.is_none() {
            *cached = config.installer.public_ip;
        }
        *cached
    }

    /// Vcpu count for a node: cached entry first, then the last launch's
    /// value, then 1
    pub async fn node_vcpus(&self, name: &NodeName) -> u32 {
        match self.cache.get(name).await {
            Ok(Some(entry)) => return entry.vcpus,
            Ok(None) => {}
            Err(e) => {
                warn!(node = %name, error = format!("{e:#}"), "Instance cache lookup failed");
            }
        }

        self.shared.last_vcpus.lock().unwrap().unwrap_or(1)
    }
}
