//! Node naming policy
//!
//! Name formats come from the hardware profile. `*` defers naming to the
//! provider entirely (no placeholder record is pre-created); anything else is
//! a pattern whose `#N...` placeholder expands to a zero-padded sequence
//! index, e.g. `compute-#NN` yields `compute-01`, `compute-02`, ...

use crate::registry::RegistrySession;
use anyhow::{bail, Result};
use gantry_common::defaults::WILDCARD_NAME_FORMAT;
use gantry_common::NodeName;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Rejected name formats.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameFormatError {
    /// Empty format string
    #[error("name format cannot be empty")]
    Empty,

    /// Non-wildcard format without a sequence placeholder
    #[error("name format {0:?} has no '#' placeholder")]
    MissingPlaceholder(String),
}

/// Parsed node name format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFormat {
    /// `*`: the provider assigns names, nothing is generated locally.
    Wildcard,
    /// A pattern containing a `#N...` placeholder.
    Pattern(String),
}

impl NameFormat {
    pub fn parse(format: &str) -> Result<Self, NameFormatError> {
        if format.is_empty() {
            return Err(NameFormatError::Empty);
        }
        if format == WILDCARD_NAME_FORMAT {
            return Ok(NameFormat::Wildcard);
        }
        if !format.contains('#') {
            return Err(NameFormatError::MissingPlaceholder(format.to_string()));
        }
        Ok(NameFormat::Pattern(format.to_string()))
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, NameFormat::Wildcard)
    }

    /// Expand the pattern with a sequence index.
    ///
    /// The placeholder is a `#` followed by a run of `N`s whose length sets
    /// the zero padding: `compute-#NN` with index 7 gives `compute-07`.
    /// Wildcard formats expand to nothing.
    pub fn expand(&self, index: u64) -> Option<String> {
        let pattern = match self {
            NameFormat::Wildcard => return None,
            NameFormat::Pattern(pattern) => pattern,
        };

        let start = pattern.find('#')?;
        let digits = pattern[start + 1..]
            .chars()
            .take_while(|&c| c == 'N')
            .count();
        let width = digits.max(1);

        let mut expanded = String::with_capacity(pattern.len() + 8);
        expanded.push_str(&pattern[..start]);
        expanded.push_str(&format!("{index:0width$}"));
        expanded.push_str(&pattern[start + 1 + digits..]);
        Some(expanded)
    }
}

/// Naming-policy collaborator: yields unique qualified node names.
pub trait NameGenerator: Send + Sync {
    /// Generate the next name for the format, qualified with the DNS zone
    fn generate(
        &self,
        session: &RegistrySession,
        format: &NameFormat,
        dns_zone: &str,
    ) -> impl Future<Output = Result<NodeName>> + Send;
}

/// Sequence-backed name generator.
///
/// Expands the pattern with a monotonically increasing index and qualifies
/// the result with the DNS zone. The starting index is supplied by the
/// caller, typically one past the current registry node count.
#[derive(Debug)]
pub struct PatternNamer {
    next_index: AtomicU64,
}

impl PatternNamer {
    pub fn starting_at(index: u64) -> Self {
        Self {
            next_index: AtomicU64::new(index),
        }
    }
}

impl NameGenerator for PatternNamer {
    async fn generate(
        &self,
        _session: &RegistrySession,
        format: &NameFormat,
        dns_zone: &str,
    ) -> Result<NodeName> {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        let Some(host) = format.expand(index) else {
            bail!("wildcard name formats do not generate local names");
        };
        Ok(NodeName::qualified(&host, dns_zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wildcard() {
        assert_eq!(NameFormat::parse("*").unwrap(), NameFormat::Wildcard);
        assert!(NameFormat::parse("*").unwrap().is_wildcard());
    }

    #[test]
    fn test_parse_rejects_bad_formats() {
        assert_eq!(NameFormat::parse(""), Err(NameFormatError::Empty));
        assert_eq!(
            NameFormat::parse("compute"),
            Err(NameFormatError::MissingPlaceholder("compute".to_string()))
        );
    }

    #[test]
    fn test_expand_zero_pads_to_placeholder_width() {
        let format = NameFormat::parse("compute-#NN").unwrap();
        assert_eq!(format.expand(7).as_deref(), Some("compute-07"));
        assert_eq!(format.expand(123).as_deref(), Some("compute-123"));
    }

    #[test]
    fn test_expand_bare_hash() {
        let format = NameFormat::parse("node#").unwrap();
        assert_eq!(format.expand(4).as_deref(), Some("node4"));
    }

    #[test]
    fn test_expand_keeps_suffix() {
        let format = NameFormat::parse("rack1-#NNN-gpu").unwrap();
        assert_eq!(format.expand(12).as_deref(), Some("rack1-012-gpu"));
    }

    #[test]
    fn test_wildcard_expands_to_nothing() {
        assert_eq!(NameFormat::Wildcard.expand(1), None);
    }

    #[tokio::test]
    async fn test_pattern_namer_sequences_and_qualifies() {
        let session = RegistrySession::open();
        let namer = PatternNamer::starting_at(1);
        let format = NameFormat::parse("compute-#NN").unwrap();

        let first = namer.generate(&session, &format, "example.com").await.unwrap();
        let second = namer.generate(&session, &format, "example.com").await.unwrap();

        assert_eq!(first.as_str(), "compute-01.example.com");
        assert_eq!(second.as_str(), "compute-02.example.com");
    }

    #[tokio::test]
    async fn test_pattern_namer_rejects_wildcard() {
        let session = RegistrySession::open();
        let namer = PatternNamer::starting_at(1);

        let result = namer
            .generate(&session, &NameFormat::Wildcard, "example.com")
            .await;
        assert!(result.is_err());
    }
}
