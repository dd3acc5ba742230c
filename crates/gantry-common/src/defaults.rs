//! Default configuration values shared across gantry components
//!
//! These constants keep the adapter library, the CLI, and the test doubles
//! agreeing on the same defaults.

/// Default provider shape when none is configured
pub const DEFAULT_SHAPE: &str = "VM.Standard1.1";

/// Default cap on concurrently running launch/decommission units
pub const DEFAULT_MAX_CONCURRENT_LAUNCHES: usize = 8;

/// Default deadline for an instance to reach RUNNING, in seconds
pub const DEFAULT_LAUNCH_TIMEOUT: u64 = 600;

/// Default deadline for an instance to reach TERMINATED, in seconds
pub const DEFAULT_TERMINATE_TIMEOUT: u64 = 600;

/// Grace period between issuing a terminate and polling for TERMINATED, in seconds
pub const DEFAULT_TERMINATE_GRACE: u64 = 3;

/// Initial delay between lifecycle polls, in milliseconds
pub const DEFAULT_POLL_INITIAL_DELAY_MS: u64 = 2_000;

/// Cap for the exponentially growing poll delay, in seconds
pub const DEFAULT_POLL_MAX_DELAY: u64 = 15;

/// Default cluster-manager admin port advertised to nodes
pub const DEFAULT_ADMIN_PORT: u16 = 8443;

/// Name format that defers node naming to the provider
pub const WILDCARD_NAME_FORMAT: &str = "*";

/// Default format for locally generated node names
pub const DEFAULT_NAME_FORMAT: &str = "compute-#NN";

// Serde default functions for struct field defaults

/// Returns the default provider shape
pub fn default_shape() -> String {
    DEFAULT_SHAPE.to_string()
}

/// Returns the default concurrent-unit cap
pub fn default_max_concurrent_launches() -> usize {
    DEFAULT_MAX_CONCURRENT_LAUNCHES
}

/// Returns the default launch deadline in seconds
pub fn default_launch_timeout() -> u64 {
    DEFAULT_LAUNCH_TIMEOUT
}

/// Returns the default terminate deadline in seconds
pub fn default_terminate_timeout() -> u64 {
    DEFAULT_TERMINATE_TIMEOUT
}

/// Returns the default termination grace period in seconds
pub fn default_terminate_grace() -> u64 {
    DEFAULT_TERMINATE_GRACE
}

/// Returns the default initial poll delay in milliseconds
pub fn default_poll_initial_delay_ms() -> u64 {
    DEFAULT_POLL_INITIAL_DELAY_MS
}

/// Returns the default maximum poll delay in seconds
pub fn default_poll_max_delay() -> u64 {
    DEFAULT_POLL_MAX_DELAY
}

/// Returns the default admin port
pub fn default_admin_port() -> u16 {
    DEFAULT_ADMIN_PORT
}

/// Returns the default node name format
pub fn default_name_format() -> String {
    DEFAULT_NAME_FORMAT.to_string()
}
