//! Pose composition math.
//!
//! Pure functions turning a tracker's raw device orientation, its calibration
//! rotations, and the HMD reference frame into a world-space joint pose.
//! No state, no hidden inputs: identical arguments always produce identical
//! poses.

use nalgebra::{UnitQuaternion, Vector3};

use crate::types::Pose;

/// Rotation about world +Y by `yaw` radians.
pub fn yaw_rotation(yaw: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
}

/// World orientation of a tracker: the raw device orientation sandwiched
/// between its mounting calibration (`global`) and own-axis calibration
/// (`local`).
pub fn world_orientation(
    raw: UnitQuaternion<f32>,
    global: UnitQuaternion<f32>,
    local: UnitQuaternion<f32>,
) -> UnitQuaternion<f32> {
    global * raw * local
}

/// World position of a tracker, anchored at the HMD.
///
/// Body-relative offsets (`global_offset`, the per-tracker height offset) turn
/// with the wearer, so they rotate by the HMD yaw only. The device mount
/// offset rides on the tracker itself, so it rotates by the tracker's full
/// world orientation.
pub fn world_position(
    hmd_position: Vector3<f32>,
    hmd_yaw: f32,
    global_offset: Vector3<f32>,
    device_offset: Vector3<f32>,
    tracker_offset: Vector3<f32>,
    orientation: UnitQuaternion<f32>,
) -> Vector3<f32> {
    let yaw = yaw_rotation(hmd_yaw);
    hmd_position + yaw * global_offset + orientation * device_offset + yaw * tracker_offset
}

/// Compose the full world pose for one tracker.
#[allow(clippy::too_many_arguments)]
pub fn compose_pose(
    raw: UnitQuaternion<f32>,
    global_cal: UnitQuaternion<f32>,
    local_cal: UnitQuaternion<f32>,
    hmd_position: Vector3<f32>,
    hmd_yaw: f32,
    global_offset: Vector3<f32>,
    device_offset: Vector3<f32>,
    tracker_offset: Vector3<f32>,
) -> Pose {
    let orientation = world_orientation(raw, global_cal, local_cal);
    let position = world_position(
        hmd_position,
        hmd_yaw,
        global_offset,
        device_offset,
        tracker_offset,
        orientation,
    );
    Pose {
        position,
        orientation,
    }
}
