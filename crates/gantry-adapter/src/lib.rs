//! gantry-adapter - node provisioning adapter for cluster-managed compute
//!
//! This crate drives an OCI-style compute provider on behalf of a cluster
//! manager: concurrent instance launches with per-unit rollback, lifecycle
//! polling, a local instance-metadata cache, and best-effort
//! decommissioning that keeps registry and provider state aligned.

pub mod bootstrap;
pub mod config;
pub mod hooks;
pub mod naming;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod store;
pub mod waiter;
