use nalgebra::{UnitQuaternion, Vector3};

/// Tracker identifier assigned by the device link in discovery order (0..N-1).
/// Stable for the lifetime of a link session, not across reconnects.
pub type TrackerId = usize;

/// World-space position + orientation pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in meters.
    pub position: Vector3<f32>,
    /// Unit orientation quaternion.
    pub orientation: UnitQuaternion<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Pose {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

/// HMD reference frame supplied by the host each update.
#[derive(Debug, Clone, Copy)]
pub struct HmdFrame {
    pub pose: Pose,
    /// HMD yaw around world +Y in radians.
    pub yaw: f32,
}

/// Role assigned to a tracker. `Disabled` trackers expose no joint.
///
/// All non-Disabled roles currently map to the same generic manually-assigned
/// joint kind; the role only drives display names and host-side assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TrackerRole {
    Disabled = 0,
    Waist = 1,
    Chest = 2,
    LeftFoot = 3,
    RightFoot = 4,
    LeftKnee = 5,
    RightKnee = 6,
    LeftElbow = 7,
    RightElbow = 8,
    /// User assigns the body part in the host application.
    Manual = 9,
}

impl TrackerRole {
    pub const ALL: [TrackerRole; 10] = [
        TrackerRole::Disabled,
        TrackerRole::Waist,
        TrackerRole::Chest,
        TrackerRole::LeftFoot,
        TrackerRole::RightFoot,
        TrackerRole::LeftKnee,
        TrackerRole::RightKnee,
        TrackerRole::LeftElbow,
        TrackerRole::RightElbow,
        TrackerRole::Manual,
    ];

    /// Stable integer code used for persistence.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decode a persisted role code. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<TrackerRole> {
        Self::ALL.iter().copied().find(|r| r.code() == code)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TrackerRole::Disabled => "Disabled",
            TrackerRole::Waist => "Waist",
            TrackerRole::Chest => "Chest",
            TrackerRole::LeftFoot => "Left Foot",
            TrackerRole::RightFoot => "Right Foot",
            TrackerRole::LeftKnee => "Left Knee",
            TrackerRole::RightKnee => "Right Knee",
            TrackerRole::LeftElbow => "Left Elbow",
            TrackerRole::RightElbow => "Right Elbow",
            TrackerRole::Manual => "Manual",
        }
    }
}

/// A logical body-tracking point exposed to the host, derived from one
/// enabled tracker. Identity (index in the joint table) is not stable across
/// rebuilds; consumers re-fetch after a rebuild notification.
#[derive(Debug, Clone)]
pub struct JointEntry {
    pub name: String,
    pub role: TrackerRole,
    pub pose: Pose,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_codes_round_trip() {
        for role in TrackerRole::ALL {
            assert_eq!(TrackerRole::from_code(role.code()), Some(role));
        }
        assert_eq!(TrackerRole::from_code(42), None);
        assert_eq!(TrackerRole::from_code(-1), None);
    }

    #[test]
    fn default_pose_is_identity() {
        let pose = Pose::default();
        assert_eq!(pose.position, Vector3::zeros());
        assert_eq!(pose.orientation, UnitQuaternion::identity());
    }
}
