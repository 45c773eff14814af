//! Joint table: the mapping between exposed joints and tracker ids.
//!
//! A joint table is rebuilt wholesale whenever the tracker count or any role
//! changes, and swapped in atomically by the owner. Joint indices are dense
//! and ascend in tracker-id order over enabled trackers only, so toggling a
//! tracker shifts every higher index.

use crate::link::DeviceLink;
use crate::settings::{KeyValueStore, SettingsStore};
use crate::types::{JointEntry, Pose, TrackerId, TrackerRole};

/// Immutable-shape snapshot of the exposed joints and their tracker mapping.
/// `map[i]` is the tracker backing joint `i`.
#[derive(Debug, Default)]
pub struct JointTable {
    entries: Vec<JointEntry>,
    map: Vec<TrackerId>,
}

impl JointTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[JointEntry] {
        &self.entries
    }

    pub fn entry_mut(&mut self, joint: usize) -> Option<&mut JointEntry> {
        self.entries.get_mut(joint)
    }

    /// Resolve a joint index back to its tracker. `None` for stale indices.
    pub fn tracker_for(&self, joint: usize) -> Option<TrackerId> {
        self.map.get(joint).copied()
    }

    pub fn snapshot(&self) -> Vec<JointEntry> {
        self.entries.clone()
    }
}

fn joint_name(id: TrackerId, role: TrackerRole) -> String {
    format!("{id} ({})", role.display_name())
}

/// Build a fresh joint table for the current tracker population.
///
/// Walks ids 0..count in order, skips disabled trackers, and pushes each
/// enabled tracker's persisted calibration down into the link so raw
/// orientation reads already reflect the last-known calibration. The caller
/// swaps the finished table in; consumers never see a partial rebuild.
pub fn build_joint_table<S: KeyValueStore>(
    link: &dyn DeviceLink,
    settings: &mut SettingsStore<S>,
) -> JointTable {
    let mut table = JointTable::default();

    for id in 0..link.tracker_count() {
        let config = settings.get_or_create(id);
        if config.role == TrackerRole::Disabled {
            continue;
        }

        table.map.push(id);
        table.entries.push(JointEntry {
            name: joint_name(id, config.role),
            role: config.role,
            pose: Pose::default(),
        });

        link.set_global_rotation(id, config.global_rotation);
        link.set_local_rotation(id, config.local_rotation);
    }

    log::debug!(
        "joint table rebuilt: {} joint(s) over {} tracker(s)",
        table.len(),
        link.tracker_count()
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{MemoryStore, SimulatedLink};
    use nalgebra::{UnitQuaternion, Vector3};

    fn settings_with_roles(roles: &[TrackerRole]) -> SettingsStore<MemoryStore> {
        let mut settings = SettingsStore::new(MemoryStore::new());
        for (id, &role) in roles.iter().enumerate() {
            settings.set_role(id, role).unwrap();
        }
        settings
    }

    #[test]
    fn disabled_trackers_are_skipped() {
        let link = SimulatedLink::new();
        link.set_tracker_count(3);
        let mut settings =
            settings_with_roles(&[TrackerRole::Disabled, TrackerRole::Waist, TrackerRole::Chest]);

        let table = build_joint_table(&link, &mut settings);

        assert_eq!(table.len(), 2);
        assert_eq!(table.tracker_for(0), Some(1));
        assert_eq!(table.tracker_for(1), Some(2));
        assert_eq!(table.tracker_for(2), None);
        assert_eq!(table.entries()[0].name, "1 (Waist)");
        assert_eq!(table.entries()[1].name, "2 (Chest)");
    }

    #[test]
    fn all_disabled_yields_empty_table() {
        let link = SimulatedLink::new();
        link.set_tracker_count(2);
        let mut settings = SettingsStore::new(MemoryStore::new());

        let table = build_joint_table(&link, &mut settings);
        assert!(table.is_empty());
    }

    #[test]
    fn rebuild_pushes_persisted_calibration_into_link() {
        let link = SimulatedLink::new();
        link.set_tracker_count(1);

        let global = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 1.2);
        let local = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -0.3);
        let mut settings = settings_with_roles(&[TrackerRole::Manual]);
        settings.set_calibration(0, global, local).unwrap();

        build_joint_table(&link, &mut settings);

        assert_eq!(link.global_rotation(0), global);
        assert_eq!(link.local_rotation(0), local);
    }

    #[test]
    fn indices_ascend_in_tracker_order() {
        let link = SimulatedLink::new();
        link.set_tracker_count(5);
        let mut settings = settings_with_roles(&[
            TrackerRole::Manual,
            TrackerRole::Disabled,
            TrackerRole::LeftFoot,
            TrackerRole::Disabled,
            TrackerRole::RightFoot,
        ]);

        let table = build_joint_table(&link, &mut settings);
        assert_eq!(table.len(), 3);
        assert_eq!(table.tracker_for(0), Some(0));
        assert_eq!(table.tracker_for(1), Some(2));
        assert_eq!(table.tracker_for(2), Some(4));
    }
}
