//! Provider lifecycle and attachment states

use serde::{Deserialize, Serialize};

/// Provider-reported instance lifecycle state.
///
/// The wire form is SCREAMING_SNAKE_CASE, matching what Oracle-style compute
/// APIs return in `lifecycle_state` fields.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceLifecycle {
    Provisioning,
    Starting,
    Running,
    Stopping,
    Stopped,
    Terminating,
    Terminated,
}

impl InstanceLifecycle {
    /// Whether the instance can no longer make progress toward RUNNING.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Attachment state of a network interface (VNIC) on an instance.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentState {
    Attaching,
    Attached,
    Detaching,
    Detached,
}

impl AttachmentState {
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached)
    }
}
