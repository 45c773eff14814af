//! Per-tracker settings, backed by the host's key-value store.
//!
//! Records are created lazily on first access, validated on load, and cached
//! in memory for the rest of the session. The store has no delete operation;
//! overwrite-with-default is the deletion idiom.

use std::collections::HashMap;

use nalgebra::{Quaternion, UnitQuaternion};

use crate::types::{TrackerId, TrackerRole};
use crate::Result;

pub const DEFAULT_HEIGHT_OFFSET: u32 = 75;
pub const MIN_HEIGHT_OFFSET: u32 = 60;
pub const MAX_HEIGHT_OFFSET: u32 = 90;

/// Sentinel key marking the one-time legacy migration as done.
const MIGRATED_KEY: &str = "SettingsMigrated";

/// Host-provided persistent key-value store. Values are strings; keys are
/// namespaced per tracker and per field by this module.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Configuration record for one tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub role: TrackerRole,
    /// Calibration height percentage, always within [60, 90].
    pub height_offset: u32,
    /// Mounting offset relative to world forward.
    pub global_rotation: UnitQuaternion<f32>,
    /// Own-axis offset.
    pub local_rotation: UnitQuaternion<f32>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSettings {
            role: TrackerRole::Disabled,
            height_offset: DEFAULT_HEIGHT_OFFSET,
            global_rotation: UnitQuaternion::identity(),
            local_rotation: UnitQuaternion::identity(),
        }
    }
}

fn key(id: TrackerId, field: &str) -> String {
    format!("Tracker{id}_{field}")
}

/// Encode a quaternion as `x y z w`. `{}` prints the shortest round-tripping
/// form, so save→reload preserves values exactly.
fn encode_quat(q: &UnitQuaternion<f32>) -> String {
    let c = q.coords;
    format!("{} {} {} {}", c.x, c.y, c.z, c.w)
}

/// Decode a stored quaternion. Missing, malformed, or zero-valued rotations
/// (never a valid rotation) all come back as identity.
fn decode_quat(value: Option<String>) -> UnitQuaternion<f32> {
    let Some(value) = value else {
        return UnitQuaternion::identity();
    };
    let parts: Vec<f32> = value
        .split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect();
    if parts.len() != 4 {
        return UnitQuaternion::identity();
    }
    let q = Quaternion::new(parts[3], parts[0], parts[1], parts[2]);
    let norm = q.norm();
    if norm < 1e-6 || !norm.is_finite() {
        return UnitQuaternion::identity();
    }
    // Already-unit values pass through untouched so save→reload is exact.
    if (norm - 1.0).abs() < 1e-3 {
        UnitQuaternion::new_unchecked(q)
    } else {
        UnitQuaternion::from_quaternion(q)
    }
}

fn decode_u32(value: Option<String>, default: u32) -> u32 {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Lazily-populated arena of per-tracker settings over a key-value store.
///
/// The single owner of the backing store: no other component touches it.
pub struct SettingsStore<S: KeyValueStore> {
    store: S,
    cache: HashMap<TrackerId, TrackerSettings>,
}

impl<S: KeyValueStore> SettingsStore<S> {
    pub fn new(store: S) -> Self {
        SettingsStore {
            store,
            cache: HashMap::new(),
        }
    }

    /// Fetch a tracker's settings, loading and validating from the store on
    /// first reference. Never fails; corrupt fields normalize to defaults.
    pub fn get_or_create(&mut self, id: TrackerId) -> TrackerSettings {
        if let Some(settings) = self.cache.get(&id) {
            return settings.clone();
        }

        let role = TrackerRole::from_code(decode_u32(self.store.get(&key(id, "Role")), 0) as i32)
            .unwrap_or(TrackerRole::Disabled);
        let mut height_offset = decode_u32(
            self.store.get(&key(id, "TrackerHeightOffset")),
            DEFAULT_HEIGHT_OFFSET,
        );
        if !(MIN_HEIGHT_OFFSET..=MAX_HEIGHT_OFFSET).contains(&height_offset) {
            height_offset = DEFAULT_HEIGHT_OFFSET;
        }

        let settings = TrackerSettings {
            role,
            height_offset,
            global_rotation: decode_quat(self.store.get(&key(id, "GlobalRotation"))),
            local_rotation: decode_quat(self.store.get(&key(id, "LocalRotation"))),
        };
        self.cache.insert(id, settings.clone());
        settings
    }

    /// Persist all four fields for one tracker.
    pub fn save(&mut self, id: TrackerId) -> Result<()> {
        let settings = self.get_or_create(id);
        self.store
            .set(&key(id, "Role"), &settings.role.code().to_string())?;
        self.store.set(
            &key(id, "TrackerHeightOffset"),
            &settings.height_offset.to_string(),
        )?;
        self.store.set(
            &key(id, "GlobalRotation"),
            &encode_quat(&settings.global_rotation),
        )?;
        self.store.set(
            &key(id, "LocalRotation"),
            &encode_quat(&settings.local_rotation),
        )?;
        Ok(())
    }

    pub fn set_role(&mut self, id: TrackerId, role: TrackerRole) -> Result<()> {
        let mut settings = self.get_or_create(id);
        settings.role = role;
        self.cache.insert(id, settings);
        self.save(id)
    }

    /// Set the height offset, clamped into the valid range.
    pub fn set_height_offset(&mut self, id: TrackerId, height: u32) -> Result<()> {
        let mut settings = self.get_or_create(id);
        settings.height_offset = height.clamp(MIN_HEIGHT_OFFSET, MAX_HEIGHT_OFFSET);
        self.cache.insert(id, settings);
        self.save(id)
    }

    /// Store freshly derived calibration rotations and persist them.
    pub fn set_calibration(
        &mut self,
        id: TrackerId,
        global: UnitQuaternion<f32>,
        local: UnitQuaternion<f32>,
    ) -> Result<()> {
        let mut settings = self.get_or_create(id);
        settings.global_rotation = global;
        settings.local_rotation = local;
        self.cache.insert(id, settings);
        self.save(id)
    }

    /// One-time migration of the legacy single-tracker record (unnamespaced
    /// keys) into tracker 0's namespace. Guarded by a sentinel flag so a
    /// second run is a no-op. The historical single device becomes the waist.
    pub fn migrate_legacy(&mut self) -> Result<()> {
        if self.store.get(MIGRATED_KEY).is_some() {
            return Ok(());
        }
        let Some(legacy_global) = self.store.get("GlobalRotation") else {
            // Nothing to migrate; still mark done so we never look again.
            self.store.set(MIGRATED_KEY, "true")?;
            return Ok(());
        };

        log::info!("migrating legacy single-tracker settings to per-tracker format");

        let legacy_local = self.store.get("LocalRotation");
        let legacy_height = self.store.get("TrackerHeightOffset");

        self.store.set(&key(0, "GlobalRotation"), &legacy_global)?;
        if let Some(local) = legacy_local {
            self.store.set(&key(0, "LocalRotation"), &local)?;
        }
        if let Some(height) = legacy_height {
            self.store.set(&key(0, "TrackerHeightOffset"), &height)?;
        }
        self.store
            .set(&key(0, "Role"), &TrackerRole::Waist.code().to_string())?;

        // No delete operation exists: reset the legacy fields to defaults.
        self.store
            .set("GlobalRotation", &encode_quat(&UnitQuaternion::identity()))?;
        self.store
            .set("LocalRotation", &encode_quat(&UnitQuaternion::identity()))?;
        self.store
            .set("TrackerHeightOffset", &DEFAULT_HEIGHT_OFFSET.to_string())?;
        self.store.set(MIGRATED_KEY, "true")?;

        // Tracker 0 may already be cached with pre-migration values.
        self.cache.remove(&0);

        log::info!("settings migration complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryStore;
    use crate::TrackingError;
    use nalgebra::Vector3;

    fn store() -> SettingsStore<MemoryStore> {
        SettingsStore::new(MemoryStore::new())
    }

    #[test]
    fn first_access_yields_defaults() {
        let mut settings = store();
        let s = settings.get_or_create(3);
        assert_eq!(s, TrackerSettings::default());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut settings = store();
        let a = settings.get_or_create(1);
        let b = settings.get_or_create(1);
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_height_resets_to_default() {
        for bad in ["59", "91", "0", "10000", "not-a-number"] {
            let mut backing = MemoryStore::new();
            backing.set("Tracker0_TrackerHeightOffset", bad).unwrap();
            let mut settings = SettingsStore::new(backing);
            assert_eq!(settings.get_or_create(0).height_offset, DEFAULT_HEIGHT_OFFSET);
        }
    }

    #[test]
    fn in_range_height_survives_load() {
        let mut backing = MemoryStore::new();
        backing.set("Tracker0_TrackerHeightOffset", "60").unwrap();
        let mut settings = SettingsStore::new(backing);
        assert_eq!(settings.get_or_create(0).height_offset, 60);
    }

    #[test]
    fn zero_rotation_resets_to_identity() {
        let mut backing = MemoryStore::new();
        backing.set("Tracker2_GlobalRotation", "0 0 0 0").unwrap();
        let mut settings = SettingsStore::new(backing);
        assert_eq!(
            settings.get_or_create(2).global_rotation,
            UnitQuaternion::identity()
        );
    }

    #[test]
    fn rotations_round_trip_through_save_and_reload() {
        let backing = MemoryStore::new();
        let view = backing.clone();
        let mut settings = SettingsStore::new(backing);

        let global = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.73);
        let local = UnitQuaternion::from_euler_angles(0.1, -0.4, 0.9);
        settings.set_calibration(5, global, local).unwrap();

        // Fresh store over the same backing: forces reload from persisted keys.
        let mut reloaded = SettingsStore::new(view);
        let s = reloaded.get_or_create(5);
        assert_eq!(s.global_rotation, global);
        assert_eq!(s.local_rotation, local);
    }

    #[test]
    fn migration_moves_legacy_fields_to_tracker_zero() {
        let mut backing = MemoryStore::new();
        backing.set("GlobalRotation", "0 1 0 0").unwrap();
        backing.set("LocalRotation", "0 0 1 0").unwrap();
        backing.set("TrackerHeightOffset", "80").unwrap();
        let view = backing.clone();

        let mut settings = SettingsStore::new(backing);
        settings.migrate_legacy().unwrap();

        let zero = settings.get_or_create(0);
        assert_eq!(zero.role, TrackerRole::Waist);
        assert_eq!(zero.height_offset, 80);
        assert_eq!(
            zero.global_rotation,
            UnitQuaternion::from_quaternion(Quaternion::new(0.0, 0.0, 1.0, 0.0))
        );

        // Legacy keys hold defaults afterwards.
        assert_eq!(view.get("GlobalRotation").unwrap(), "0 0 0 1");
        assert_eq!(view.get("LocalRotation").unwrap(), "0 0 0 1");
        assert_eq!(view.get("TrackerHeightOffset").unwrap(), "75");
        assert_eq!(view.get("SettingsMigrated").unwrap(), "true");
    }

    #[test]
    fn migration_twice_matches_running_once() {
        let mut backing = MemoryStore::new();
        backing.set("GlobalRotation", "0 1 0 0").unwrap();
        backing.set("TrackerHeightOffset", "85").unwrap();
        let view = backing.clone();

        let mut settings = SettingsStore::new(backing);
        settings.migrate_legacy().unwrap();
        let first = settings.get_or_create(0);

        // Second run sees only the sentinel and the defaulted legacy keys.
        let mut again = SettingsStore::new(view);
        again.migrate_legacy().unwrap();
        assert_eq!(again.get_or_create(0), first);
    }

    #[test]
    fn migration_without_legacy_record_is_a_noop() {
        let mut settings = store();
        settings.migrate_legacy().unwrap();
        assert_eq!(settings.get_or_create(0).role, TrackerRole::Disabled);
    }

    #[test]
    fn save_failure_propagates() {
        struct BrokenStore;
        impl KeyValueStore for BrokenStore {
            fn get(&self, _key: &str) -> Option<String> {
                None
            }
            fn set(&mut self, _key: &str, _value: &str) -> crate::Result<()> {
                Err(TrackingError::Store("backing store offline".into()))
            }
        }

        let mut settings = SettingsStore::new(BrokenStore);
        assert!(settings.save(0).is_err());
    }

    #[test]
    fn malformed_rotation_resets_to_identity() {
        for bad in ["", "1 2 3", "a b c d", "nan nan nan nan"] {
            let mut backing = MemoryStore::new();
            backing.set("Tracker1_LocalRotation", bad).unwrap();
            let mut settings = SettingsStore::new(backing);
            assert_eq!(
                settings.get_or_create(1).local_rotation,
                UnitQuaternion::identity(),
                "value {bad:?} should normalize to identity"
            );
        }
    }
}
