//! Host-facing tracking core.
//!
//! Owns the joint table, the settings store, and the calibration state
//! machine, and runs the periodic driver thread that polls the device link.
//! The host calls `update()` on its own cadence with the current HMD frame;
//! the driver never blocks it, and rebuilds swap the joint table wholesale so
//! readers never observe a half-built state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nalgebra::Vector3;

use crate::calibration::{Calibrator, Phase};
use crate::joints::{build_joint_table, JointTable};
use crate::link::{DeviceLink, LinkEvent, STATUS_SUCCESS};
use crate::settings::{KeyValueStore, SettingsStore};
use crate::status::{status_text, HandlerStatus, StatusCache};
use crate::types::{HmdFrame, JointEntry, TrackerId, TrackerRole};
use crate::{math, Result, TrackingError};

/// Lifecycle maintenance interval. Pose updates are host-driven and
/// independent of this.
pub const TICK_INTERVAL: Duration = Duration::from_millis(25);

/// World-origin offset applied to every joint.
fn global_offset() -> Vector3<f32> {
    Vector3::zeros()
}

/// Fixed device-mount offset approximating the phone-to-body distance.
fn device_offset() -> Vector3<f32> {
    Vector3::new(0.0, -0.045, 0.09)
}

/// Per-tracker height offset vector from the calibration height percentage.
fn tracker_offset(height_offset: u32) -> Vector3<f32> {
    Vector3::new(0.0, -(height_offset as f32) / 100.0, 0.0)
}

struct Inner<L: DeviceLink, S: KeyValueStore> {
    link: L,
    settings: Mutex<SettingsStore<S>>,
    joints: RwLock<JointTable>,
    calibrator: Mutex<Calibrator>,
    status_cache: StatusCache,
    last_count: AtomicUsize,
    generation: AtomicUsize,
    loaded: AtomicBool,
}

impl<L: DeviceLink, S: KeyValueStore> Inner<L, S> {
    /// One driver tick: forward link notifications, poll the tracker count,
    /// and advance any live calibration session.
    fn tick(&self, now: Instant) {
        while let Some(event) = self.link.try_recv_event() {
            match event {
                LinkEvent::Status(message) => {
                    log::info!("link status changed: {message}");
                }
                LinkEvent::Log { level, message } => log::log!(level, "link: {message}"),
            }
        }

        if !self.loaded.load(Ordering::Relaxed) || !self.link.is_initialized() {
            return;
        }

        // Record the new count only once the rebuild lands, so a skipped
        // rebuild is retried on the next tick.
        let count = self.link.tracker_count();
        if self.last_count.load(Ordering::Relaxed) != count {
            log::info!("tracker count changed to {count}");
            if self.rebuild() {
                self.last_count.store(count, Ordering::Relaxed);
            }
        }

        if let (Ok(mut calibrator), Ok(mut settings)) =
            (self.calibrator.lock(), self.settings.lock())
        {
            calibrator.tick(now, &self.link, &mut settings);
        }
    }

    /// Rebuild the joint table from the current count and roles, then swap it
    /// in. The settings lock is released before the write lock is taken.
    /// Returns true once the new table is visible to readers.
    fn rebuild(&self) -> bool {
        let table = match self.settings.lock() {
            Ok(mut settings) => build_joint_table(&self.link, &mut settings),
            Err(_) => return false,
        };
        match self.joints.write() {
            Ok(mut joints) => {
                *joints = table;
                self.generation.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }
}

/// The tracking core exposed to the host application.
pub struct Tracking<L: DeviceLink + 'static, S: KeyValueStore + 'static> {
    inner: Arc<Inner<L, S>>,
    stop_flag: Arc<AtomicBool>,
    driver: Option<JoinHandle<()>>,
}

impl<L: DeviceLink + 'static, S: KeyValueStore + 'static> Tracking<L, S> {
    /// Create the core over a device link and a settings store, and start
    /// the periodic driver thread.
    pub fn new(link: L, store: S) -> Result<Self> {
        let inner = Arc::new(Inner {
            link,
            settings: Mutex::new(SettingsStore::new(store)),
            joints: RwLock::new(JointTable::default()),
            calibrator: Mutex::new(Calibrator::new()),
            status_cache: StatusCache::new(),
            last_count: AtomicUsize::new(0),
            generation: AtomicUsize::new(0),
            loaded: AtomicBool::new(false),
        });

        let stop_flag = Arc::new(AtomicBool::new(false));
        let driver_inner = inner.clone();
        let driver_stop = stop_flag.clone();
        let driver = std::thread::Builder::new()
            .name("bodytrack-driver".into())
            .spawn(move || {
                while !driver_stop.load(Ordering::Relaxed) {
                    driver_inner.tick(Instant::now());
                    std::thread::sleep(TICK_INTERVAL);
                }
            })
            .map_err(|e| TrackingError::DriverSpawn(e.to_string()))?;

        Ok(Tracking {
            inner,
            stop_flag,
            driver: Some(driver),
        })
    }

    /// Access the underlying device link.
    pub fn link(&self) -> &L {
        &self.inner.link
    }

    /// Run the one-time legacy settings migration and enable the driver.
    pub fn on_load(&self) -> Result<()> {
        {
            let mut settings = self
                .inner
                .settings
                .lock()
                .map_err(|_| TrackingError::Store("settings lock poisoned".into()))?;
            settings.migrate_legacy()?;
        }
        self.inner.loaded.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Start the device link. Returns the resulting status code.
    pub fn initialize(&self) -> i32 {
        let code = self.inner.link.initialize();
        match HandlerStatus::from_code(code) {
            HandlerStatus::Success => log::info!("device link initialized"),
            HandlerStatus::InitFailed | HandlerStatus::PortsTaken => {
                log::error!("device link failed to initialize: {}", status_text(code, 0, 0));
            }
            other => log::warn!("device link initialize returned: {other}"),
        }
        code
    }

    /// Stop the device link. Returns the link's shutdown result.
    pub fn shutdown(&self) -> i32 {
        let result = self.inner.link.shutdown();
        if result == 0 {
            log::info!("device link shut down");
        } else {
            log::error!("device link shutdown returned {result}");
        }
        result
    }

    /// Recompute world poses for every mapped joint from the given HMD frame.
    /// No-op unless the link reports nominal connectivity; per-joint problems
    /// never abort the loop for the remaining joints.
    pub fn update(&self, hmd: &HmdFrame) {
        if !self.inner.loaded.load(Ordering::Relaxed)
            || !self.inner.link.is_initialized()
            || self.inner.link.status_code() != STATUS_SUCCESS
        {
            return;
        }

        // Height offsets are snapshotted up front so the joint write lock is
        // never held while the settings lock is wanted.
        let count = self.inner.link.tracker_count();
        let offsets: HashMap<TrackerId, Vector3<f32>> = match self.inner.settings.lock() {
            Ok(mut settings) => (0..count)
                .map(|id| (id, tracker_offset(settings.get_or_create(id).height_offset)))
                .collect(),
            Err(_) => return,
        };

        let Ok(mut joints) = self.inner.joints.write() else {
            return;
        };
        for joint in 0..joints.len() {
            let Some(tracker) = joints.tracker_for(joint) else {
                log::debug!("joint {joint} has no tracker mapping, skipped");
                continue;
            };
            let Some(&offset) = offsets.get(&tracker) else {
                log::debug!("joint {joint} maps to stale tracker {tracker}, skipped");
                continue;
            };

            let pose = math::compose_pose(
                self.inner.link.raw_orientation(tracker),
                self.inner.link.global_rotation(tracker),
                self.inner.link.local_rotation(tracker),
                hmd.pose.position,
                hmd.yaw,
                global_offset(),
                device_offset(),
                offset,
            );
            if let Some(entry) = joints.entry_mut(joint) {
                entry.pose = pose;
            }
        }
    }

    /// Forward a haptic identify request to the tracker behind a joint.
    /// Stale indices are dropped silently; the mapping heals on next rebuild.
    pub fn signal(&self, joint: usize) {
        let tracker = self
            .inner
            .joints
            .read()
            .ok()
            .and_then(|joints| joints.tracker_for(joint));
        match tracker {
            Some(tracker) => self.inner.link.signal_tracker(tracker),
            None => log::debug!("signal for unmapped joint {joint} ignored"),
        }
    }

    /// Assign a role and rebuild the joint table immediately, bypassing the
    /// driver's count check.
    pub fn set_role(&self, id: TrackerId, role: TrackerRole) -> Result<()> {
        {
            let mut settings = self
                .inner
                .settings
                .lock()
                .map_err(|_| TrackingError::Store("settings lock poisoned".into()))?;
            settings.set_role(id, role)?;
        }
        self.inner.rebuild();
        Ok(())
    }

    /// Set a tracker's height offset percentage, clamped into [60, 90].
    pub fn set_height_offset(&self, id: TrackerId, height: u32) -> Result<()> {
        let mut settings = self
            .inner
            .settings
            .lock()
            .map_err(|_| TrackingError::Store("settings lock poisoned".into()))?;
        settings.set_height_offset(id, height)
    }

    /// Request calibration for a tracker. Returns false if the request was
    /// dropped (session already active, link down, or unknown tracker).
    pub fn start_calibration(&self, id: TrackerId) -> bool {
        match self.inner.calibrator.lock() {
            Ok(mut calibrator) => calibrator.start(id, &self.inner.link, Instant::now()),
            Err(_) => false,
        }
    }

    /// The live calibration session's tracker and phase, if any.
    pub fn calibration(&self) -> Option<(TrackerId, Phase)> {
        self.inner.calibrator.lock().ok()?.active()
    }

    /// User-facing instruction for the current calibration phase.
    pub fn calibration_prompt(&self) -> Option<String> {
        self.inner.calibrator.lock().ok()?.prompt()
    }

    pub fn status_code(&self) -> i32 {
        self.inner.link.status_code()
    }

    pub fn status_text(&self) -> String {
        status_text(
            self.inner.link.status_code(),
            self.inner.link.tracker_count(),
            self.joint_count(),
        )
    }

    /// True when the status code changed since the last call; the host uses
    /// this to decide whether its settings surface needs a refresh.
    pub fn status_changed(&self) -> bool {
        self.inner.status_cache.refresh(self.inner.link.status_code())
    }

    pub fn joint_count(&self) -> usize {
        self.inner.joints.read().map(|j| j.len()).unwrap_or(0)
    }

    /// Monotonic counter bumped on every joint table swap. Hosts that cache
    /// the joint list compare this against their remembered value to decide
    /// when to re-fetch, the same way `status_changed` gates status refreshes.
    pub fn joint_generation(&self) -> usize {
        self.inner.generation.load(Ordering::Relaxed)
    }

    /// Snapshot of the exposed joints with their latest poses.
    pub fn joints(&self) -> Vec<JointEntry> {
        self.inner
            .joints
            .read()
            .map(|j| j.snapshot())
            .unwrap_or_default()
    }
}

impl<L: DeviceLink + 'static, S: KeyValueStore + 'static> Drop for Tracking<L, S> {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }
    }
}
