//! Instance lifecycle polling with exponential backoff and cancellation.
//!
//! Wraps the provider's point-in-time instance reads in a bounded polling
//! loop: poll until the instance reports the target lifecycle state, backing
//! off exponentially with jitter between attempts, and give up at a deadline
//! or an optional attempt cap.

use crate::provider::{ComputeProvider, ProviderError};
use backon::{BackoffBuilder, ExponentialBuilder};
use gantry_common::defaults::{
    DEFAULT_LAUNCH_TIMEOUT, DEFAULT_POLL_INITIAL_DELAY_MS, DEFAULT_POLL_MAX_DELAY,
};
use gantry_common::{InstanceId, InstanceLifecycle};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Callback invoked after each poll that did not observe the target state
pub type ProgressFn<'a> = dyn Fn(&InstanceId, InstanceLifecycle) + Send + Sync + 'a;

/// Configuration for lifecycle polling
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between polls
    pub initial_delay: Duration,
    /// Maximum delay between polls (cap for exponential growth)
    pub max_delay: Duration,
    /// Maximum total time to wait before giving up
    pub timeout: Duration,
    /// Optional cap on poll attempts, on top of the deadline
    pub max_attempts: Option<u32>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_POLL_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_POLL_MAX_DELAY),
            timeout: Duration::from_secs(DEFAULT_LAUNCH_TIMEOUT),
            max_attempts: None,
        }
    }
}

/// Why a wait ended without reaching the target state
#[derive(Debug, Error)]
pub enum WaitError {
    /// The deadline or attempt cap was reached first
    #[error("timed out waiting for {instance} to reach {target} after {waited:?} ({attempts} attempts)")]
    TimedOut {
        instance: InstanceId,
        target: InstanceLifecycle,
        waited: Duration,
        attempts: u32,
    },

    /// The caller's cancellation token fired
    #[error("wait for {instance} cancelled")]
    Cancelled { instance: InstanceId },

    /// A poll failed; `NotFound` here means the instance disappeared
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::TimedOut { .. })
    }
}

/// Wait until an instance reports the target lifecycle state.
///
/// Polls `provider.get_instance` with exponential backoff and jitter. The
/// progress callback fires once per poll that observed some other state,
/// with the state seen. Poll errors end the wait immediately.
pub async fn wait_for_lifecycle<P: ComputeProvider>(
    provider: &P,
    instance: &InstanceId,
    target: InstanceLifecycle,
    config: &WaitConfig,
    cancel: Option<&CancellationToken>,
    on_progress: Option<&ProgressFn<'_>>,
) -> Result<(), WaitError> {
    let start = std::time::Instant::now();
    let mut attempts = 0u32;

    let backoff = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .with_jitter()
        .build();

    let mut delays = backoff.into_iter();

    loop {
        // Check cancellation before each attempt
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(WaitError::Cancelled {
                    instance: instance.clone(),
                });
            }
        }

        // Check deadline
        if start.elapsed() >= config.timeout {
            return Err(WaitError::TimedOut {
                instance: instance.clone(),
                target,
                waited: start.elapsed(),
                attempts,
            });
        }

        attempts += 1;

        let current = match provider.get_instance(instance).await {
            Ok(details) => details.lifecycle_state,
            Err(e) => {
                warn!(instance = %instance.short(), error = %e, "Instance state poll failed");
                return Err(e.into());
            }
        };

        if current == target {
            debug!(instance = %instance.short(), state = %current, attempts, "Instance reached target state");
            return Ok(());
        }

        if let Some(on_progress) = on_progress {
            on_progress(instance, current);
        }

        if let Some(max) = config.max_attempts {
            if attempts >= max {
                return Err(WaitError::TimedOut {
                    instance: instance.clone(),
                    target,
                    waited: start.elapsed(),
                    attempts,
                });
            }
        }

        let delay = delays.next().unwrap_or(config.max_delay);
        debug!(
            instance = %instance.short(),
            attempt = attempts,
            state = %current,
            delay_ms = delay.as_millis(),
            "Instance not in target state, retrying"
        );

        // Sleep with cancellation support
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = async {
                if let Some(token) = cancel {
                    token.cancelled().await
                } else {
                    std::future::pending::<()>().await
                }
            } => {
                return Err(WaitError::Cancelled {
                    instance: instance.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{LaunchSpec, ProviderInstance, VnicAttachment};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Provider stub that replays a scripted state sequence; the last state
    /// repeats once the script runs out.
    struct ScriptedProvider {
        states: Vec<InstanceLifecycle>,
        polls: AtomicU32,
        fail_after: Mutex<Option<u32>>,
    }

    impl ScriptedProvider {
        fn new(states: Vec<InstanceLifecycle>) -> Self {
            Self {
                states,
                polls: AtomicU32::new(0),
                fail_after: Mutex::new(None),
            }
        }

        fn failing_after(states: Vec<InstanceLifecycle>, polls: u32) -> Self {
            let provider = Self::new(states);
            *provider.fail_after.lock().unwrap() = Some(polls);
            provider
        }

        fn polls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    impl ComputeProvider for ScriptedProvider {
        async fn launch_instance(&self, _spec: LaunchSpec) -> Result<InstanceId, ProviderError> {
            Err(ProviderError::api("NotImplemented", "not used in this test"))
        }

        async fn get_instance(&self, id: &InstanceId) -> Result<ProviderInstance, ProviderError> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);

            if let Some(limit) = *self.fail_after.lock().unwrap() {
                if poll >= limit {
                    return Err(ProviderError::not_found("instance", id.as_str()));
                }
            }

            let idx = (poll as usize).min(self.states.len() - 1);
            Ok(ProviderInstance {
                id: id.clone(),
                lifecycle_state: self.states[idx],
                display_name: "inst-test".to_string(),
                compartment_id: "ocid1.compartment.oc1..test".to_string(),
            })
        }

        async fn terminate_instance(&self, _id: &InstanceId) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn list_vnic_attachments(
            &self,
            _id: &InstanceId,
            _compartment_id: &str,
        ) -> Result<Vec<VnicAttachment>, ProviderError> {
            Ok(vec![])
        }
    }

    fn fast_config() -> WaitConfig {
        WaitConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            timeout: Duration::from_secs(5),
            max_attempts: None,
        }
    }

    fn test_id() -> InstanceId {
        InstanceId::new("ocid1.instance.oc1..waiter")
    }

    #[tokio::test]
    async fn test_wait_succeeds_immediately() {
        let provider = ScriptedProvider::new(vec![InstanceLifecycle::Running]);

        let result = wait_for_lifecycle(
            &provider,
            &test_id(),
            InstanceLifecycle::Running,
            &fast_config(),
            None,
            None,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(provider.polls(), 1);
    }

    #[tokio::test]
    async fn test_wait_retries_then_succeeds() {
        let provider = ScriptedProvider::new(vec![
            InstanceLifecycle::Provisioning,
            InstanceLifecycle::Starting,
            InstanceLifecycle::Running,
        ]);

        let result = wait_for_lifecycle(
            &provider,
            &test_id(),
            InstanceLifecycle::Running,
            &fast_config(),
            None,
            None,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(provider.polls(), 3);
    }

    #[tokio::test]
    async fn test_wait_reports_progress_on_nonmatching_states_only() {
        let provider = ScriptedProvider::new(vec![
            InstanceLifecycle::Provisioning,
            InstanceLifecycle::Starting,
            InstanceLifecycle::Running,
        ]);

        let seen = Mutex::new(Vec::new());
        let progress = |_id: &InstanceId, state: InstanceLifecycle| {
            seen.lock().unwrap().push(state);
        };

        wait_for_lifecycle(
            &provider,
            &test_id(),
            InstanceLifecycle::Running,
            &fast_config(),
            None,
            Some(&progress),
        )
        .await
        .unwrap();

        // The matching poll must not fire the callback
        let seen = seen.into_inner().unwrap();
        assert_eq!(
            seen,
            vec![InstanceLifecycle::Provisioning, InstanceLifecycle::Starting]
        );
    }

    #[tokio::test]
    async fn test_wait_timeout() {
        let provider = ScriptedProvider::new(vec![InstanceLifecycle::Provisioning]);
        let config = WaitConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            timeout: Duration::from_millis(100),
            max_attempts: None,
        };

        let result = wait_for_lifecycle(
            &provider,
            &test_id(),
            InstanceLifecycle::Running,
            &config,
            None,
            None,
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_wait_attempt_cap() {
        let provider = ScriptedProvider::new(vec![InstanceLifecycle::Provisioning]);
        let config = WaitConfig {
            max_attempts: Some(3),
            ..fast_config()
        };

        let result = wait_for_lifecycle(
            &provider,
            &test_id(),
            InstanceLifecycle::Running,
            &config,
            None,
            None,
        )
        .await;

        match result.unwrap_err() {
            WaitError::TimedOut { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(provider.polls(), 3);
    }

    #[tokio::test]
    async fn test_wait_cancellation() {
        let provider = ScriptedProvider::new(vec![InstanceLifecycle::Provisioning]);
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        // Cancel after a short delay
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            cancel_clone.cancel();
        });

        let config = WaitConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
            max_attempts: None,
        };

        let result = wait_for_lifecycle(
            &provider,
            &test_id(),
            InstanceLifecycle::Running,
            &config,
            Some(&cancel),
            None,
        )
        .await;

        assert!(matches!(
            result.unwrap_err(),
            WaitError::Cancelled { .. }
        ));
    }

    #[tokio::test]
    async fn test_wait_propagates_poll_errors() {
        let provider =
            ScriptedProvider::failing_after(vec![InstanceLifecycle::Provisioning], 2);

        let result = wait_for_lifecycle(
            &provider,
            &test_id(),
            InstanceLifecycle::Running,
            &fast_config(),
            None,
            None,
        )
        .await;

        match result.unwrap_err() {
            WaitError::Provider(e) => assert!(e.is_not_found()),
            other => panic!("expected provider error, got {other:?}"),
        }
    }
}
