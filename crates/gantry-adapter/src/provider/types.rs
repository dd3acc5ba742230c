//! Provider-facing request and result types

use gantry_common::{AttachmentState, InstanceId, InstanceLifecycle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Metadata key carrying SSH public keys into the instance.
pub const METADATA_SSH_KEYS: &str = "ssh_authorized_keys";

/// Metadata key carrying the base64-encoded bootstrap script.
pub const METADATA_USER_DATA: &str = "user_data";

/// Specification for a single instance launch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub availability_domain: String,
    pub compartment_id: String,
    pub shape: String,
    pub subnet_id: String,
    pub image_id: String,
    /// Display name for the instance; the provider picks one when absent.
    pub display_name: Option<String>,
    /// DNS label registered for the primary interface.
    pub hostname_label: Option<String>,
    /// Opaque instance metadata (SSH keys, base64 user data).
    pub metadata: BTreeMap<String, String>,
}

impl LaunchSpec {
    pub fn new(
        availability_domain: impl Into<String>,
        compartment_id: impl Into<String>,
        shape: impl Into<String>,
        subnet_id: impl Into<String>,
        image_id: impl Into<String>,
    ) -> Self {
        Self {
            availability_domain: availability_domain.into(),
            compartment_id: compartment_id.into(),
            shape: shape.into(),
            subnet_id: subnet_id.into(),
            image_id: image_id.into(),
            display_name: None,
            hostname_label: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_hostname_label(mut self, label: impl Into<String>) -> Self {
        self.hostname_label = Some(label.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Read-only view of a provider instance from launch/describe calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInstance {
    pub id: InstanceId,
    pub lifecycle_state: InstanceLifecycle,
    pub display_name: String,
    pub compartment_id: String,
}

/// One network interface attachment as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VnicAttachment {
    pub private_ip: IpAddr,
    pub public_ip: Option<IpAddr>,
    pub state: AttachmentState,
}
