//! Simulated device link and in-memory key-value store.
//!
//! Stand-ins for the real transport and the host's settings storage, used by
//! the demo program and the test suite. The simulated link keeps per-tracker
//! state behind a mutex and hands notifications over a crossbeam channel,
//! the same shape the real link uses for its event stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};
use nalgebra::UnitQuaternion;

use crate::link::{self, DeviceLink, LinkEvent};
use crate::settings::KeyValueStore;
use crate::types::TrackerId;
use crate::Result;

#[derive(Clone)]
struct TrackerState {
    raw: UnitQuaternion<f32>,
    global: UnitQuaternion<f32>,
    local: UnitQuaternion<f32>,
    forward: bool,
    down: bool,
}

impl Default for TrackerState {
    fn default() -> Self {
        TrackerState {
            raw: UnitQuaternion::identity(),
            global: UnitQuaternion::identity(),
            local: UnitQuaternion::identity(),
            forward: false,
            down: false,
        }
    }
}

/// In-process device link with scriptable tracker state.
pub struct SimulatedLink {
    initialized: AtomicBool,
    status: AtomicI32,
    count: AtomicUsize,
    trackers: Mutex<Vec<TrackerState>>,
    signals: Mutex<Vec<TrackerId>>,
    event_tx: Sender<LinkEvent>,
    event_rx: Receiver<LinkEvent>,
}

impl SimulatedLink {
    pub fn new() -> Self {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        SimulatedLink {
            initialized: AtomicBool::new(false),
            status: AtomicI32::new(link::STATUS_NOT_STARTED),
            count: AtomicUsize::new(0),
            trackers: Mutex::new(Vec::new()),
            signals: Mutex::new(Vec::new()),
            event_tx,
            event_rx,
        }
    }

    /// Connect or disconnect simulated trackers.
    pub fn set_tracker_count(&self, count: usize) {
        self.count.store(count, Ordering::Relaxed);
        let mut trackers = self.trackers.lock().unwrap();
        if trackers.len() < count {
            trackers.resize(count, TrackerState::default());
        }
    }

    pub fn set_status(&self, code: i32) {
        self.status.store(code, Ordering::Relaxed);
    }

    pub fn set_raw_orientation(&self, id: TrackerId, raw: UnitQuaternion<f32>) {
        self.with_tracker(id, |t| t.raw = raw);
    }

    pub fn calibrating_forward(&self, id: TrackerId) -> bool {
        self.read_tracker(id).forward
    }

    pub fn calibrating_down(&self, id: TrackerId) -> bool {
        self.read_tracker(id).down
    }

    /// Tracker ids that received an identify buzz, in order.
    pub fn signalled(&self) -> Vec<TrackerId> {
        self.signals.lock().unwrap().clone()
    }

    pub fn push_event(&self, event: LinkEvent) {
        let _ = self.event_tx.send(event);
    }

    fn with_tracker(&self, id: TrackerId, f: impl FnOnce(&mut TrackerState)) {
        let mut trackers = self.trackers.lock().unwrap();
        if trackers.len() <= id {
            trackers.resize(id + 1, TrackerState::default());
        }
        f(&mut trackers[id]);
    }

    fn read_tracker(&self, id: TrackerId) -> TrackerState {
        let trackers = self.trackers.lock().unwrap();
        trackers.get(id).cloned().unwrap_or_default()
    }
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceLink for SimulatedLink {
    fn initialize(&self) -> i32 {
        self.initialized.store(true, Ordering::Relaxed);
        self.status.store(link::STATUS_SUCCESS, Ordering::Relaxed);
        link::STATUS_SUCCESS
    }

    fn shutdown(&self) -> i32 {
        self.initialized.store(false, Ordering::Relaxed);
        self.status.store(link::STATUS_NOT_STARTED, Ordering::Relaxed);
        0
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    fn status_code(&self) -> i32 {
        self.status.load(Ordering::Relaxed)
    }

    fn tracker_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    fn raw_orientation(&self, id: TrackerId) -> UnitQuaternion<f32> {
        self.read_tracker(id).raw
    }

    fn global_rotation(&self, id: TrackerId) -> UnitQuaternion<f32> {
        self.read_tracker(id).global
    }

    fn set_global_rotation(&self, id: TrackerId, rotation: UnitQuaternion<f32>) {
        self.with_tracker(id, |t| t.global = rotation);
    }

    fn local_rotation(&self, id: TrackerId) -> UnitQuaternion<f32> {
        self.read_tracker(id).local
    }

    fn set_local_rotation(&self, id: TrackerId, rotation: UnitQuaternion<f32>) {
        self.with_tracker(id, |t| t.local = rotation);
    }

    fn set_calibrating_forward(&self, id: TrackerId, on: bool) {
        self.with_tracker(id, |t| t.forward = on);
    }

    fn set_calibrating_down(&self, id: TrackerId, on: bool) {
        self.with_tracker(id, |t| t.down = on);
    }

    fn signal_tracker(&self, id: TrackerId) {
        self.signals.lock().unwrap().push(id);
    }

    fn try_recv_event(&self) -> Option<LinkEvent> {
        self.event_rx.try_recv().ok()
    }
}

/// In-memory key-value store. Clones share the same backing map so tests can
/// hold a read handle while the core owns the store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
