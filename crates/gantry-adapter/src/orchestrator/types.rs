//! Request types shared with the cluster manager

use crate::config::AdapterConfig;

/// Hardware profile subset the adapter acts on
#[derive(Debug, Clone)]
pub struct HardwareProfile {
    pub name: String,
    /// Naming policy for nodes created under this profile; `*` delegates
    /// naming to the provider
    pub name_format: String,
}

impl HardwareProfile {
    pub fn new(name: impl Into<String>, name_format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_format: name_format.into(),
        }
    }
}

/// Software profile subset the adapter acts on
#[derive(Debug, Clone)]
pub struct SoftwareProfile {
    pub name: String,
}

impl SoftwareProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Immutable inputs shared by every unit of one launch call
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub hardware_profile: HardwareProfile,
    pub software_profile: SoftwareProfile,
    pub config: AdapterConfig,
}

/// One provisioning request from the cluster manager
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Number of nodes to provision, at least 1
    pub count: u32,
    pub spec: NodeSpec,
}

impl LaunchRequest {
    pub fn new(count: u32, spec: NodeSpec) -> Self {
        Self { count, spec }
    }
}
