//! Shared test utilities for gantry crates
//!
//! Provides an in-memory database helper and deterministic doubles for the
//! provider, registry, and host-hook seams of the adapter.

pub mod db;
pub mod hooks;
pub mod provider;
pub mod registry;

pub use db::open_test_db;
pub use hooks::RecordingHooks;
pub use provider::SimCompute;
pub use registry::MemoryRegistry;
