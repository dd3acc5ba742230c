//! Recording host hooks
//!
//! A [`HostHooks`] double that records every call so tests can assert
//! exactly-once delivery, and can be told to fail notifications to prove
//! they never fail a launch.

use anyhow::{bail, Result};
use gantry_adapter::hooks::{HostHooks, NodeReadyNotice};
use gantry_common::NodeName;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Hooks double that records calls instead of acting on them
#[derive(Default)]
pub struct RecordingHooks {
    notices: Mutex<Vec<NodeReadyNotice>>,
    cleanups: Mutex<Vec<NodeName>>,
    fail_notify: AtomicBool,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent ready notification fail
    pub fn fail_notifications(&self) {
        self.fail_notify.store(true, Ordering::SeqCst);
    }

    /// Ready notices received, in call order
    pub fn notices(&self) -> Vec<NodeReadyNotice> {
        self.notices.lock().unwrap().clone()
    }

    /// Nodes whose host artifacts were cleaned, in call order
    pub fn cleanups(&self) -> Vec<NodeName> {
        self.cleanups.lock().unwrap().clone()
    }

    /// Cleanup calls recorded for one node
    pub fn cleanup_count(&self, name: &NodeName) -> usize {
        self.cleanups
            .lock()
            .unwrap()
            .iter()
            .filter(|n| *n == name)
            .count()
    }
}

impl HostHooks for RecordingHooks {
    async fn notify_node_ready(&self, notice: &NodeReadyNotice) -> Result<()> {
        self.notices.lock().unwrap().push(notice.clone());
        if self.fail_notify.load(Ordering::SeqCst) {
            bail!("notification endpoint unavailable");
        }
        Ok(())
    }

    async fn cleanup_host_artifacts(&self, name: &NodeName) -> Result<()> {
        self.cleanups.lock().unwrap().push(name.clone());
        Ok(())
    }
}
