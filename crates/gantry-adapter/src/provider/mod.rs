//! Compute provider abstraction

pub mod error;
pub mod types;

pub use error::ProviderError;
pub use types::{LaunchSpec, ProviderInstance, VnicAttachment};

use gantry_common::InstanceId;
use std::future::Future;

/// Trait covering the provider calls the orchestrator drives.
///
/// Production deployments implement this over their cloud SDK; tests use the
/// scriptable simulation from `gantry-test-utils`. Methods return
/// `impl Future + Send` so implementations stay mockable without extra trait
/// machinery.
pub trait ComputeProvider: Send + Sync {
    /// Launch one instance and return its provider id
    fn launch_instance(
        &self,
        spec: LaunchSpec,
    ) -> impl Future<Output = Result<InstanceId, ProviderError>> + Send;

    /// Describe one instance
    fn get_instance(
        &self,
        id: &InstanceId,
    ) -> impl Future<Output = Result<ProviderInstance, ProviderError>> + Send;

    /// Terminate one instance
    fn terminate_instance(
        &self,
        id: &InstanceId,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// List network interface attachments for an instance within a compartment
    fn list_vnic_attachments(
        &self,
        id: &InstanceId,
        compartment_id: &str,
    ) -> impl Future<Output = Result<Vec<VnicAttachment>, ProviderError>> + Send;
}
