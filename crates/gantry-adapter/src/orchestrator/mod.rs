//! Node provisioning and decommissioning pipelines
//!
//! - [`launch`]: concurrent instance launches with unit-scoped rollback
//! - [`decommission`]: best-effort teardown gated on confirmed termination
//! - [`types`]: request types shared with the cluster manager

pub mod decommission;
pub mod launch;
pub mod types;

pub use decommission::DecommissionOrchestrator;
pub use launch::LaunchOrchestrator;
pub use types::{HardwareProfile, LaunchRequest, NodeSpec, SoftwareProfile};
