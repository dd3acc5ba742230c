//! Provider error taxonomy
//!
//! Every provider call surfaces its failures in this typed form so call
//! sites can branch on the one condition the orchestration logic cares
//! about: whether the referenced resource still exists.

use thiserror::Error;

/// Errors from compute provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The referenced resource does not exist or is no longer visible.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Any other provider failure (auth, quota, malformed request, outage).
    #[error("provider error [{code}]: {message}")]
    Api { code: String, message: String },
}

impl ProviderError {
    /// Shorthand for a not-found condition on a given resource kind.
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Shorthand for an API failure with the provider's error code.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the resource is gone rather than the call
    /// having failed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = ProviderError::not_found("instance", "ocid1.instance.oc1..x");
        assert!(err.is_not_found());

        let err = ProviderError::api("InternalError", "something broke");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display_formats() {
        let err = ProviderError::not_found("instance", "ocid1.instance.oc1..x");
        assert_eq!(err.to_string(), "instance not found: ocid1.instance.oc1..x");

        let err = ProviderError::Api {
            code: "LimitExceeded".to_string(),
            message: "too many instances".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "provider error [LimitExceeded]: too many instances"
        );
    }
}
