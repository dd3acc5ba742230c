//! Node name and provider instance id newtypes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical name of a cluster node, usually a fully qualified hostname.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeName(String);

impl NodeName {
    /// Create a node name from a raw string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Qualify a bare host label with a domain suffix.
    pub fn qualified(host: &str, domain: &str) -> Self {
        if domain.is_empty() {
            Self(host.to_string())
        } else {
            Self(format!("{host}.{domain}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The host label, i.e. everything before the first `.`.
    pub fn host_label(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// The domain suffix, i.e. everything after the first `.`, if any.
    pub fn domain(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, domain)| domain)
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Provider-assigned instance identifier (an OCID on Oracle-style clouds).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Create an instance id from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last six characters of the id, used as a compact log field since
    /// full OCIDs are too long to scan in log output.
    pub fn short(&self) -> &str {
        let len = self.0.len();
        if len <= 6 {
            &self.0
        } else {
            self.0.get(len - 6..).unwrap_or(&self.0)
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_name_host_label_and_domain() {
        let name = NodeName::new("compute-01.cluster.example.com");
        assert_eq!(name.host_label(), "compute-01");
        assert_eq!(name.domain(), Some("cluster.example.com"));
    }

    #[test]
    fn test_node_name_without_domain() {
        let name = NodeName::new("compute-01");
        assert_eq!(name.host_label(), "compute-01");
        assert_eq!(name.domain(), None);
    }

    #[test]
    fn test_node_name_qualified() {
        assert_eq!(
            NodeName::qualified("compute-01", "example.com").as_str(),
            "compute-01.example.com"
        );
        assert_eq!(NodeName::qualified("compute-01", "").as_str(), "compute-01");
    }

    #[test]
    fn test_instance_id_short() {
        let id = InstanceId::new("ocid1.instance.oc1.phx.abcdef123456");
        assert_eq!(id.short(), "123456");

        let tiny = InstanceId::new("abc");
        assert_eq!(tiny.short(), "abc");
    }
}
