//! gantry-common - Shared types and utilities
//!
//! Domain types shared between the adapter library and its test doubles,
//! with no provider or storage dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`ids`]: Node name and provider instance id newtypes
//! - [`lifecycle`]: Provider lifecycle and attachment states
//! - [`shape`]: Capacity derivation from provider shape names

pub mod defaults;
pub mod ids;
pub mod lifecycle;
pub mod shape;

// Re-export commonly used types
pub use ids::{InstanceId, NodeName};
pub use lifecycle::{AttachmentState, InstanceLifecycle};
pub use shape::vcpus_from_shape;
