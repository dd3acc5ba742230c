//! Simulated compute provider
//!
//! A deterministic [`ComputeProvider`] for orchestrator tests. Instances
//! advance through a scripted lifecycle sequence, one step per poll, with
//! the last state repeating. Launches can be refused selectively by display
//! name, and every launch specification is kept for inspection.

use gantry_adapter::provider::{
    ComputeProvider, LaunchSpec, ProviderError, ProviderInstance, VnicAttachment,
};
use gantry_common::{AttachmentState, InstanceId, InstanceLifecycle};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
struct SimInstance {
    display_name: String,
    compartment_id: String,
    states: Vec<InstanceLifecycle>,
    cursor: usize,
    vnics: Vec<VnicAttachment>,
}

impl SimInstance {
    fn current_state(&mut self) -> InstanceLifecycle {
        let idx = self.cursor.min(self.states.len() - 1);
        let state = self.states[idx];
        self.cursor += 1;
        state
    }
}

/// In-memory compute provider double
pub struct SimCompute {
    instances: Mutex<HashMap<String, SimInstance>>,
    launches: Mutex<Vec<LaunchSpec>>,
    launch_states: Mutex<Vec<InstanceLifecycle>>,
    terminate_states: Mutex<Vec<InstanceLifecycle>>,
    refused_launches: Mutex<HashSet<String>>,
    vanish_on_terminate: AtomicBool,
    unattached_vnics: AtomicBool,
    seq: AtomicU32,
    in_flight_launches: AtomicU32,
    peak_in_flight: AtomicU32,
    terminate_calls: AtomicU32,
}

impl SimCompute {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            launches: Mutex::new(Vec::new()),
            launch_states: Mutex::new(vec![
                InstanceLifecycle::Provisioning,
                InstanceLifecycle::Starting,
                InstanceLifecycle::Running,
            ]),
            terminate_states: Mutex::new(vec![
                InstanceLifecycle::Terminating,
                InstanceLifecycle::Terminated,
            ]),
            refused_launches: Mutex::new(HashSet::new()),
            vanish_on_terminate: AtomicBool::new(false),
            unattached_vnics: AtomicBool::new(false),
            seq: AtomicU32::new(0),
            in_flight_launches: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
            terminate_calls: AtomicU32::new(0),
        }
    }

    /// Replace the lifecycle script newly launched instances follow.
    ///
    /// `[Provisioning]` alone gives an instance that never runs, which is
    /// how wait-timeout paths are exercised.
    pub fn set_launch_states(&self, states: Vec<InstanceLifecycle>) {
        assert!(!states.is_empty(), "lifecycle script cannot be empty");
        *self.launch_states.lock().unwrap() = states;
    }

    /// Replace the lifecycle script terminated instances follow.
    ///
    /// `[Terminating]` alone gives a termination that never confirms.
    pub fn set_terminate_states(&self, states: Vec<InstanceLifecycle>) {
        assert!(!states.is_empty(), "lifecycle script cannot be empty");
        *self.terminate_states.lock().unwrap() = states;
    }

    /// Refuse launches whose display name matches
    pub fn refuse_launch_of(&self, display_name: impl Into<String>) {
        self.refused_launches
            .lock()
            .unwrap()
            .insert(display_name.into());
    }

    /// Make terminated instances disappear instead of reporting TERMINATED
    pub fn vanish_on_terminate(&self) {
        self.vanish_on_terminate.store(true, Ordering::SeqCst);
    }

    /// Report interfaces on launched instances as still attaching
    pub fn launch_unattached_vnics(&self) {
        self.unattached_vnics.store(true, Ordering::SeqCst);
    }

    /// Insert an instance directly, bypassing launch
    pub fn seed_instance(&self, id: &str, states: Vec<InstanceLifecycle>) -> InstanceId {
        assert!(!states.is_empty(), "lifecycle script cannot be empty");

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let instance = SimInstance {
            display_name: format!("seeded-{seq:04}"),
            compartment_id: "ocid1.compartment.sim..seeded".to_string(),
            states,
            cursor: 0,
            vnics: vec![sim_vnic(seq)],
        };

        self.instances
            .lock()
            .unwrap()
            .insert(id.to_string(), instance);

        InstanceId::new(id)
    }

    /// Every launch specification received, in call order
    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> u32 {
        self.launches.lock().unwrap().len() as u32
    }

    pub fn terminate_count(&self) -> u32 {
        self.terminate_calls.load(Ordering::SeqCst)
    }

    /// Highest number of launch calls observed in flight at once
    pub fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn instance_exists(&self, id: &InstanceId) -> bool {
        self.instances.lock().unwrap().contains_key(id.as_str())
    }
}

impl Default for SimCompute {
    fn default() -> Self {
        Self::new()
    }
}

fn sim_vnic(seq: u32) -> VnicAttachment {
    VnicAttachment {
        private_ip: IpAddr::V4(Ipv4Addr::new(10, 0, (seq >> 8) as u8, (seq & 0xff) as u8)),
        public_ip: None,
        state: AttachmentState::Attached,
    }
}

impl ComputeProvider for SimCompute {
    async fn launch_instance(&self, spec: LaunchSpec) -> Result<InstanceId, ProviderError> {
        // Hold a slot briefly so concurrency bounds are observable
        let in_flight = self.in_flight_launches.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight_launches.fetch_sub(1, Ordering::SeqCst);

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let display_name = spec
            .display_name
            .clone()
            .unwrap_or_else(|| format!("inst-{seq:04}"));

        self.launches.lock().unwrap().push(spec.clone());

        if self.refused_launches.lock().unwrap().contains(&display_name) {
            return Err(ProviderError::api(
                "LimitExceeded",
                format!("launch of {display_name} refused"),
            ));
        }

        let id = InstanceId::new(format!("ocid1.instance.sim..{seq:06}"));
        let mut vnic = sim_vnic(seq);
        if self.unattached_vnics.load(Ordering::SeqCst) {
            vnic.state = AttachmentState::Attaching;
        }
        let instance = SimInstance {
            display_name,
            compartment_id: spec.compartment_id.clone(),
            states: self.launch_states.lock().unwrap().clone(),
            cursor: 0,
            vnics: vec![vnic],
        };

        self.instances
            .lock()
            .unwrap()
            .insert(id.as_str().to_string(), instance);

        Ok(id)
    }

    async fn get_instance(&self, id: &InstanceId) -> Result<ProviderInstance, ProviderError> {
        let mut instances = self.instances.lock().unwrap();
        let Some(instance) = instances.get_mut(id.as_str()) else {
            return Err(ProviderError::not_found("instance", id.as_str()));
        };

        Ok(ProviderInstance {
            id: id.clone(),
            lifecycle_state: instance.current_state(),
            display_name: instance.display_name.clone(),
            compartment_id: instance.compartment_id.clone(),
        })
    }

    async fn terminate_instance(&self, id: &InstanceId) -> Result<(), ProviderError> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);

        let mut instances = self.instances.lock().unwrap();

        if self.vanish_on_terminate.load(Ordering::SeqCst) {
            return match instances.remove(id.as_str()) {
                Some(_) => Ok(()),
                None => Err(ProviderError::not_found("instance", id.as_str())),
            };
        }

        let Some(instance) = instances.get_mut(id.as_str()) else {
            return Err(ProviderError::not_found("instance", id.as_str()));
        };

        instance.states = self.terminate_states.lock().unwrap().clone();
        instance.cursor = 0;

        Ok(())
    }

    async fn list_vnic_attachments(
        &self,
        id: &InstanceId,
        _compartment_id: &str,
    ) -> Result<Vec<VnicAttachment>, ProviderError> {
        let instances = self.instances.lock().unwrap();
        let Some(instance) = instances.get(id.as_str()) else {
            return Err(ProviderError::not_found("instance", id.as_str()));
        };

        Ok(instance.vnics.clone())
    }
}
