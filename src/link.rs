//! Device link boundary.
//!
//! The device link is the external service owning the physical tracker
//! connections: discovery, raw orientation, calibration capture, and haptic
//! signaling. The core consumes it through this trait and never reaches below
//! it; the wire transport is out of scope.

use nalgebra::UnitQuaternion;

use crate::types::TrackerId;

// -- Link status codes (wire-compatible with the device handler) --
pub const STATUS_SUCCESS: i32 = 0;
pub const STATUS_CON_DEAD: i32 = 0x0001_0001;
pub const STATUS_NO_DATA: i32 = 0x0001_0002;
pub const STATUS_INIT_FAILED: i32 = 0x0001_0003;
pub const STATUS_PORTS_TAKEN: i32 = 0x0001_0004;
pub const STATUS_NOT_STARTED: i32 = 0x0001_0005;

/// Push-style notification from the link, drained by the periodic driver and
/// forwarded to the log facade.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Connection status changed; carries a human-readable description.
    Status(String),
    /// Log line emitted by the link internals.
    Log { level: log::Level, message: String },
}

/// Operations the core consumes from the device link.
///
/// Implementations are shared across the driver thread and host calls, so all
/// methods take `&self` and implementors handle their own synchronization.
pub trait DeviceLink: Send + Sync {
    /// Start the link. Returns the resulting status code.
    fn initialize(&self) -> i32;

    /// Stop the link. Returns 0 on success.
    fn shutdown(&self) -> i32;

    fn is_initialized(&self) -> bool;

    fn status_code(&self) -> i32;

    /// Number of trackers currently known, ids 0..count-1.
    fn tracker_count(&self) -> usize;

    /// Latest raw orientation reported by a tracker.
    fn raw_orientation(&self, id: TrackerId) -> UnitQuaternion<f32>;

    fn global_rotation(&self, id: TrackerId) -> UnitQuaternion<f32>;
    fn set_global_rotation(&self, id: TrackerId, rotation: UnitQuaternion<f32>);

    fn local_rotation(&self, id: TrackerId) -> UnitQuaternion<f32>;
    fn set_local_rotation(&self, id: TrackerId, rotation: UnitQuaternion<f32>);

    /// Toggle forward-reference capture for a tracker.
    fn set_calibrating_forward(&self, id: TrackerId, on: bool);

    /// Toggle downward-reference capture for a tracker.
    fn set_calibrating_down(&self, id: TrackerId, on: bool);

    /// Ask a tracker to identify itself (haptic buzz).
    fn signal_tracker(&self, id: TrackerId);

    /// Drain one pending notification, if any.
    fn try_recv_event(&self) -> Option<LinkEvent>;
}
