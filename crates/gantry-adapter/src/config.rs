//! Typed adapter configuration
//!
//! Launch parameters come in as one validated structure instead of loose
//! key-value maps: defaults, a TOML file, and per-request overrides are
//! merged into an [`AdapterConfig`] and checked once with [`validate`]
//! before any provider call is made.
//!
//! [`validate`]: AdapterConfig::validate

use crate::naming::{NameFormat, NameFormatError};
use crate::provider::types::{METADATA_SSH_KEYS, METADATA_USER_DATA};
use crate::provider::LaunchSpec;
use crate::waiter::WaitConfig;
use anyhow::{Context, Result};
use gantry_common::defaults::{
    default_admin_port, default_launch_timeout, default_max_concurrent_launches,
    default_name_format, default_poll_initial_delay_ms, default_poll_max_delay, default_shape,
    default_terminate_grace, default_terminate_timeout,
};
use gantry_common::vcpus_from_shape;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// availability_domain field is empty
    #[error("provider.availability_domain cannot be empty")]
    EmptyAvailabilityDomain,

    /// compartment_id field is empty
    #[error("provider.compartment_id cannot be empty")]
    EmptyCompartmentId,

    /// subnet_id field is empty
    #[error("provider.subnet_id cannot be empty")]
    EmptySubnetId,

    /// image_id field is empty
    #[error("provider.image_id cannot be empty")]
    EmptyImageId,

    /// shape field is empty
    #[error("provider.shape cannot be empty")]
    EmptyShape,

    /// installer hostname needed for wildcard naming or user-data rendering
    #[error("installer.hostname is required when name_format is '*' or a user-data template is set")]
    EmptyInstallerHostname,

    /// max_concurrent_launches is zero
    #[error("limits.max_concurrent_launches must be at least 1")]
    InvalidMaxConcurrentLaunches,

    /// name format failed to parse
    #[error(transparent)]
    InvalidNameFormat(#[from] NameFormatError),

    /// user-data template could not be read
    #[error("failed to read user-data template {}: {source}", .path.display())]
    UnreadableUserDataTemplate {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Provider-side launch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub availability_domain: String,
    pub compartment_id: String,
    pub subnet_id: String,
    pub image_id: String,
    #[serde(default = "default_shape")]
    pub shape: String,
    /// Overrides the shape-derived vcpu count (required for Flex shapes).
    pub vcpus: Option<u32>,
    /// Public keys injected into launched instances.
    pub ssh_authorized_keys: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            availability_domain: String::new(),
            compartment_id: String::new(),
            subnet_id: String::new(),
            image_id: String::new(),
            shape: default_shape(),
            vcpus: None,
            ssh_authorized_keys: Vec::new(),
        }
    }
}

/// DNS settings for generated names and node resolvers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Zone used to qualify locally generated names; falls back to the
    /// installer's domain suffix.
    pub zone: Option<String>,
    pub search: Option<String>,
    pub nameservers: Vec<String>,
}

/// Where nodes reach the cluster manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Fully qualified installer hostname.
    pub hostname: String,
    /// Externally reachable installer address, when known up front.
    pub public_ip: Option<IpAddr>,
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            public_ip: None,
            admin_port: default_admin_port(),
        }
    }
}

/// Bootstrap material injected into instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Script template; its `### SETTINGS` line is replaced at launch time.
    pub user_data_template: Option<PathBuf>,
}

/// Concurrency and deadline knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    #[serde(default = "default_max_concurrent_launches")]
    pub max_concurrent_launches: usize,
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
    #[serde(default = "default_terminate_timeout")]
    pub terminate_timeout_secs: u64,
    #[serde(default = "default_terminate_grace")]
    pub terminate_grace_secs: u64,
    #[serde(default = "default_poll_initial_delay_ms")]
    pub poll_initial_delay_ms: u64,
    #[serde(default = "default_poll_max_delay")]
    pub poll_max_delay_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_launches: default_max_concurrent_launches(),
            launch_timeout_secs: default_launch_timeout(),
            terminate_timeout_secs: default_terminate_timeout(),
            terminate_grace_secs: default_terminate_grace(),
            poll_initial_delay_ms: default_poll_initial_delay_ms(),
            poll_max_delay_secs: default_poll_max_delay(),
        }
    }
}

/// Default naming policy applied when a hardware profile does not carry one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    #[serde(default = "default_name_format")]
    pub name_format: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            name_format: default_name_format(),
        }
    }
}

/// Resolved adapter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub provider: ProviderConfig,
    pub dns: DnsConfig,
    pub installer: InstallerConfig,
    pub bootstrap: BootstrapConfig,
    pub limits: LimitsConfig,
    pub naming: NamingConfig,
}

impl AdapterConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply per-request overrides on top of this configuration.
    pub fn merge(&self, overrides: &ConfigOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(v) = &overrides.availability_domain {
            merged.provider.availability_domain = v.clone();
        }
        if let Some(v) = &overrides.compartment_id {
            merged.provider.compartment_id = v.clone();
        }
        if let Some(v) = &overrides.subnet_id {
            merged.provider.subnet_id = v.clone();
        }
        if let Some(v) = &overrides.image_id {
            merged.provider.image_id = v.clone();
        }
        if let Some(v) = &overrides.shape {
            merged.provider.shape = v.clone();
        }
        if let Some(v) = overrides.vcpus {
            merged.provider.vcpus = Some(v);
        }
        if let Some(v) = &overrides.name_format {
            merged.naming.name_format = v.clone();
        }
        merged
    }

    /// Check required fields, once, before any provider call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.availability_domain.is_empty() {
            return Err(ConfigError::EmptyAvailabilityDomain);
        }
        if self.provider.compartment_id.is_empty() {
            return Err(ConfigError::EmptyCompartmentId);
        }
        if self.provider.subnet_id.is_empty() {
            return Err(ConfigError::EmptySubnetId);
        }
        if self.provider.image_id.is_empty() {
            return Err(ConfigError::EmptyImageId);
        }
        if self.provider.shape.is_empty() {
            return Err(ConfigError::EmptyShape);
        }
        if self.limits.max_concurrent_launches == 0 {
            return Err(ConfigError::InvalidMaxConcurrentLaunches);
        }

        let format = NameFormat::parse(&self.naming.name_format)?;
        let needs_installer =
            format.is_wildcard() || self.bootstrap.user_data_template.is_some();
        if needs_installer && self.installer.hostname.is_empty() {
            return Err(ConfigError::EmptyInstallerHostname);
        }

        Ok(())
    }

    /// Build the provider launch specification for one unit.
    ///
    /// `node_host` is the bare host label when a name was generated locally;
    /// wildcard launches pass `None` and let the provider pick a display name.
    pub fn launch_spec(&self, node_host: Option<&str>, user_data: Option<String>) -> LaunchSpec {
        let mut spec = LaunchSpec::new(
            self.provider.availability_domain.as_str(),
            self.provider.compartment_id.as_str(),
            self.provider.shape.as_str(),
            self.provider.subnet_id.as_str(),
            self.provider.image_id.as_str(),
        );
        if let Some(host) = node_host {
            spec = spec.with_display_name(host).with_hostname_label(host);
        }
        if !self.provider.ssh_authorized_keys.is_empty() {
            spec = spec.with_metadata(
                METADATA_SSH_KEYS,
                self.provider.ssh_authorized_keys.join("\n"),
            );
        }
        if let Some(data) = user_data {
            spec = spec.with_metadata(METADATA_USER_DATA, data);
        }
        spec
    }

    /// Vcpu count for the configured shape: explicit override first, then
    /// shape derivation, then 1.
    pub fn effective_vcpus(&self) -> u32 {
        self.provider
            .vcpus
            .or_else(|| vcpus_from_shape(&self.provider.shape))
            .unwrap_or(1)
    }

    /// Domain suffix of the installer hostname, if it has one.
    pub fn domain_suffix(&self) -> Option<&str> {
        self.installer
            .hostname
            .split_once('.')
            .map(|(_, domain)| domain)
    }

    /// Zone for qualifying locally generated node names.
    pub fn dns_zone(&self) -> &str {
        self.dns
            .zone
            .as_deref()
            .or_else(|| self.domain_suffix())
            .unwrap_or("")
    }

    pub fn max_concurrent(&self) -> usize {
        self.limits.max_concurrent_launches
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_secs(self.limits.terminate_grace_secs)
    }

    /// Waiter settings for the RUNNING wait.
    pub fn launch_wait_config(&self) -> WaitConfig {
        WaitConfig {
            initial_delay: Duration::from_millis(self.limits.poll_initial_delay_ms),
            max_delay: Duration::from_secs(self.limits.poll_max_delay_secs),
            timeout: Duration::from_secs(self.limits.launch_timeout_secs),
            max_attempts: None,
        }
    }

    /// Waiter settings for the TERMINATED wait.
    pub fn terminate_wait_config(&self) -> WaitConfig {
        WaitConfig {
            initial_delay: Duration::from_millis(self.limits.poll_initial_delay_ms),
            max_delay: Duration::from_secs(self.limits.poll_max_delay_secs),
            timeout: Duration::from_secs(self.limits.terminate_timeout_secs),
            max_attempts: None,
        }
    }
}

/// Per-request configuration overrides.
///
/// All fields optional; `Some` values win over the base configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub availability_domain: Option<String>,
    pub compartment_id: Option<String>,
    pub subnet_id: Option<String>,
    pub image_id: Option<String>,
    pub shape: Option<String>,
    pub vcpus: Option<u32>,
    pub name_format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config() -> AdapterConfig {
        let mut config = AdapterConfig::default();
        config.provider.availability_domain = "AD-1".to_string();
        config.provider.compartment_id = "ocid1.compartment.oc1..aaa".to_string();
        config.provider.subnet_id = "ocid1.subnet.oc1..bbb".to_string();
        config.provider.image_id = "ocid1.image.oc1..ccc".to_string();
        config.installer.hostname = "installer.cluster.example.com".to_string();
        config
    }

    #[test]
    fn test_load_config_applies_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [provider]
            availability_domain = "AD-1"
            compartment_id = "ocid1.compartment.oc1..aaa"
            subnet_id = "ocid1.subnet.oc1..bbb"
            image_id = "ocid1.image.oc1..ccc"

            [installer]
            hostname = "installer.cluster.example.com"
            "#
        )
        .unwrap();

        let config = AdapterConfig::load(file.path()).unwrap();
        assert_eq!(config.provider.shape, "VM.Standard1.1");
        assert_eq!(config.limits.max_concurrent_launches, 8);
        assert_eq!(config.limits.terminate_grace_secs, 3);
        assert_eq!(config.installer.admin_port, 8443);
        assert_eq!(config.naming.name_format, "compute-#NN");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_required_fields() {
        let config = AdapterConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyAvailabilityDomain)
        ));

        let mut config = valid_config();
        config.provider.image_id.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyImageId)));

        let mut config = valid_config();
        config.limits.max_concurrent_launches = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxConcurrentLaunches)
        ));
    }

    #[test]
    fn test_validate_requires_installer_for_wildcard_naming() {
        let mut config = valid_config();
        config.naming.name_format = "*".to_string();
        config.installer.hostname.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyInstallerHostname)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_name_format() {
        let mut config = valid_config();
        config.naming.name_format = "compute".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNameFormat(_))
        ));
    }

    #[test]
    fn test_merge_overrides_win() {
        let base = valid_config();
        let overrides = ConfigOverrides {
            shape: Some("VM.Standard2.8".to_string()),
            vcpus: Some(4),
            ..Default::default()
        };

        let merged = base.merge(&overrides);
        assert_eq!(merged.provider.shape, "VM.Standard2.8");
        assert_eq!(merged.provider.vcpus, Some(4));
        // untouched fields survive
        assert_eq!(merged.provider.availability_domain, "AD-1");
    }

    #[test]
    fn test_effective_vcpus_fallback_chain() {
        let mut config = valid_config();
        config.provider.shape = "VM.Standard2.16".to_string();
        assert_eq!(config.effective_vcpus(), 16);

        config.provider.vcpus = Some(4);
        assert_eq!(config.effective_vcpus(), 4);

        config.provider.vcpus = None;
        config.provider.shape = "VM.Standard.E4.Flex".to_string();
        assert_eq!(config.effective_vcpus(), 1);
    }

    #[test]
    fn test_domain_suffix_and_dns_zone() {
        let mut config = valid_config();
        assert_eq!(config.domain_suffix(), Some("cluster.example.com"));
        assert_eq!(config.dns_zone(), "cluster.example.com");

        config.dns.zone = Some("nodes.example.com".to_string());
        assert_eq!(config.dns_zone(), "nodes.example.com");

        config.dns.zone = None;
        config.installer.hostname = "installer".to_string();
        assert_eq!(config.domain_suffix(), None);
        assert_eq!(config.dns_zone(), "");
    }

    #[test]
    fn test_launch_spec_carries_name_and_metadata() {
        let mut config = valid_config();
        config.provider.ssh_authorized_keys = vec!["ssh-ed25519 AAAA key".to_string()];

        let spec = config.launch_spec(Some("compute-01"), Some("IyEvYmluL2Jhc2g=".to_string()));
        assert_eq!(spec.display_name.as_deref(), Some("compute-01"));
        assert_eq!(spec.hostname_label.as_deref(), Some("compute-01"));
        assert_eq!(
            spec.metadata.get(METADATA_SSH_KEYS).map(String::as_str),
            Some("ssh-ed25519 AAAA key")
        );
        assert!(spec.metadata.contains_key(METADATA_USER_DATA));

        let bare = config.launch_spec(None, None);
        assert_eq!(bare.display_name, None);
        assert_eq!(bare.hostname_label, None);
        assert!(!bare.metadata.contains_key(METADATA_USER_DATA));
    }
}
