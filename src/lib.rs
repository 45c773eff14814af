//! # bodytrack - tracker lifecycle, calibration, and pose composition
//!
//! Core for managing a variable set of wireless motion trackers and exposing
//! calibrated, per-joint world-space poses to a host VR body-tracking
//! application. Provides:
//! - Joint mapping over the live tracker population, rebuilt on count or
//!   role changes
//! - Per-tracker persisted settings (role, height offset, calibration) with
//!   validation and legacy migration
//! - A timed, driver-ticked calibration state machine (one session at a time)
//! - Per-frame pose composition from raw orientation, calibration offsets,
//!   and the HMD reference frame
//!
//! The device transport and the settings storage stay behind the
//! [`DeviceLink`] and [`KeyValueStore`] traits; this crate never reaches
//! below them.
//!
//! ## Quick Start
//! ```no_run
//! use bodytrack::{HmdFrame, Pose, Tracking, TrackerRole};
//! use bodytrack::sim::{MemoryStore, SimulatedLink};
//!
//! let tracking = Tracking::new(SimulatedLink::new(), MemoryStore::new()).unwrap();
//! tracking.on_load().unwrap();
//! tracking.initialize();
//!
//! tracking.set_role(0, TrackerRole::Waist).unwrap();
//! tracking.update(&HmdFrame { pose: Pose::default(), yaw: 0.0 });
//! for joint in tracking.joints() {
//!     println!("{}: {:?}", joint.name, joint.pose.position);
//! }
//! ```

pub mod calibration;
pub mod error;
pub mod joints;
pub mod link;
pub mod math;
pub mod settings;
pub mod sim;
pub mod status;
pub mod tracking;
pub mod types;

pub use calibration::Phase;
pub use error::TrackingError;
pub use link::{DeviceLink, LinkEvent};
pub use settings::{KeyValueStore, SettingsStore, TrackerSettings};
pub use status::HandlerStatus;
pub use tracking::Tracking;
pub use types::*;

/// Result type alias for bodytrack operations.
pub type Result<T> = std::result::Result<T, TrackingError>;
