//! Timed calibration procedure for a single tracker.
//!
//! An explicit finite-state machine advanced by the periodic driver tick.
//! Each phase carries a deadline; the current time is injected so tests never
//! wait on the wall clock. At most one session exists system-wide: while one
//! is live, every other calibration request is dropped.

use std::time::{Duration, Instant};

use crate::link::DeviceLink;
use crate::settings::{KeyValueStore, SettingsStore};
use crate::types::TrackerId;

/// Phase durations are part of the calibration contract.
pub const STILLNESS_WAIT: Duration = Duration::from_millis(7000);
pub const FORWARD_CAPTURE: Duration = Duration::from_millis(4000);
pub const TILT_WAIT: Duration = Duration::from_millis(3000);
pub const DOWN_CAPTURE: Duration = Duration::from_millis(3000);

/// Calibration phases, in order. `Complete` and `Aborted` are terminal; the
/// session is destroyed as either is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// User faces forward and holds still; nothing sent to the link yet.
    AwaitingStillness,
    /// Forward-reference capture flag is set on the link.
    CapturingForward,
    /// User tilts the device down; no link mutation.
    TiltingDown,
    /// Downward-reference capture flag is set on the link.
    CapturingDown,
    Complete,
    Aborted,
}

struct Session {
    tracker: TrackerId,
    phase: Phase,
    deadline: Instant,
}

/// Driver-ticked calibration state machine. One live session at most,
/// enforced by the `Option` gate checked before session creation.
#[derive(Default)]
pub struct Calibrator {
    session: Option<Session>,
}

impl Calibrator {
    pub fn new() -> Self {
        Calibrator { session: None }
    }

    /// Begin calibrating `tracker`. Preconditions: link initialized, no other
    /// session live, tracker id within the current count. Any violation drops
    /// the request with a log line; the active session is never disturbed.
    pub fn start(&mut self, tracker: TrackerId, link: &dyn DeviceLink, now: Instant) -> bool {
        if self.session.is_some() {
            log::warn!("calibration request for tracker {tracker} dropped: session already active");
            return false;
        }
        if !link.is_initialized() {
            log::warn!("calibration request for tracker {tracker} dropped: link not initialized");
            return false;
        }
        if tracker >= link.tracker_count() {
            log::warn!(
                "calibration request for tracker {tracker} dropped: only {} tracker(s) connected",
                link.tracker_count()
            );
            return false;
        }

        log::info!("calibration started for tracker {tracker}");
        self.session = Some(Session {
            tracker,
            phase: Phase::AwaitingStillness,
            deadline: now + STILLNESS_WAIT,
        });
        true
    }

    /// The live session's tracker and phase, if any.
    pub fn active(&self) -> Option<(TrackerId, Phase)> {
        self.session.as_ref().map(|s| (s.tracker, s.phase))
    }

    /// User-facing instruction for the current phase.
    pub fn prompt(&self) -> Option<String> {
        let session = self.session.as_ref()?;
        let id = session.tracker;
        Some(match session.phase {
            Phase::AwaitingStillness => {
                format!("Calibrating tracker {id}: face forward and hold still...")
            }
            Phase::CapturingForward => format!("Calibrating tracker {id}: hold still..."),
            Phase::TiltingDown => format!("Calibrating tracker {id}: now tilt the device down..."),
            Phase::CapturingDown => format!("Calibrating tracker {id}: hold still..."),
            Phase::Complete | Phase::Aborted => unreachable!("terminal phases destroy the session"),
        })
    }

    /// Advance the state machine if the current phase's deadline has passed.
    /// Returns the terminal phase if the session ended this tick.
    pub fn tick<S: KeyValueStore>(
        &mut self,
        now: Instant,
        link: &dyn DeviceLink,
        settings: &mut SettingsStore<S>,
    ) -> Option<Phase> {
        let session = self.session.as_mut()?;
        if now < session.deadline {
            return None;
        }

        let tracker = session.tracker;
        match session.phase {
            Phase::AwaitingStillness => {
                if !link.is_initialized() {
                    // Link died during the stillness wait: the one abort path.
                    link.set_calibrating_forward(tracker, false);
                    self.session = None;
                    log::warn!("calibration aborted for tracker {tracker}: link went down");
                    return Some(Phase::Aborted);
                }
                link.set_calibrating_forward(tracker, true);
                session.phase = Phase::CapturingForward;
                session.deadline = now + FORWARD_CAPTURE;
            }
            Phase::CapturingForward => {
                link.set_calibrating_forward(tracker, false);
                session.phase = Phase::TiltingDown;
                session.deadline = now + TILT_WAIT;
            }
            Phase::TiltingDown => {
                link.set_calibrating_down(tracker, true);
                session.phase = Phase::CapturingDown;
                session.deadline = now + DOWN_CAPTURE;
            }
            Phase::CapturingDown => {
                link.set_calibrating_down(tracker, false);
                let global = link.global_rotation(tracker);
                let local = link.local_rotation(tracker);
                self.session = None;
                if let Err(e) = settings.set_calibration(tracker, global, local) {
                    log::error!("failed to persist calibration for tracker {tracker}: {e}");
                }
                log::info!("calibration complete for tracker {tracker}");
                return Some(Phase::Complete);
            }
            Phase::Complete | Phase::Aborted => unreachable!("terminal phases destroy the session"),
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{MemoryStore, SimulatedLink};
    use nalgebra::{UnitQuaternion, Vector3};

    fn setup() -> (SimulatedLink, SettingsStore<MemoryStore>, Calibrator) {
        let link = SimulatedLink::new();
        link.initialize();
        link.set_tracker_count(2);
        (link, SettingsStore::new(MemoryStore::new()), Calibrator::new())
    }

    /// Walk the session forward by `d` and tick.
    fn advance(
        cal: &mut Calibrator,
        now: &mut Instant,
        d: Duration,
        link: &SimulatedLink,
        settings: &mut SettingsStore<MemoryStore>,
    ) -> Option<Phase> {
        *now += d;
        cal.tick(*now, link, settings)
    }

    #[test]
    fn full_session_walks_all_phases_and_persists() {
        let (link, mut settings, mut cal) = setup();
        let derived_global = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.5);
        let derived_local = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.2);

        let mut now = Instant::now();
        assert!(cal.start(1, &link, now));
        assert_eq!(cal.active(), Some((1, Phase::AwaitingStillness)));

        // Deadline not reached: no transition.
        assert_eq!(cal.tick(now + Duration::from_millis(1), &link, &mut settings), None);
        assert_eq!(cal.active(), Some((1, Phase::AwaitingStillness)));

        advance(&mut cal, &mut now, STILLNESS_WAIT, &link, &mut settings);
        assert_eq!(cal.active(), Some((1, Phase::CapturingForward)));
        assert!(link.calibrating_forward(1));

        advance(&mut cal, &mut now, FORWARD_CAPTURE, &link, &mut settings);
        assert_eq!(cal.active(), Some((1, Phase::TiltingDown)));
        assert!(!link.calibrating_forward(1));

        advance(&mut cal, &mut now, TILT_WAIT, &link, &mut settings);
        assert_eq!(cal.active(), Some((1, Phase::CapturingDown)));
        assert!(link.calibrating_down(1));

        // The link derives fresh rotations during the down capture.
        link.set_global_rotation(1, derived_global);
        link.set_local_rotation(1, derived_local);

        let end = advance(&mut cal, &mut now, DOWN_CAPTURE, &link, &mut settings);
        assert_eq!(end, Some(Phase::Complete));
        assert_eq!(cal.active(), None);
        assert!(!link.calibrating_down(1));

        let saved = settings.get_or_create(1);
        assert_eq!(saved.global_rotation, derived_global);
        assert_eq!(saved.local_rotation, derived_local);
    }

    #[test]
    fn concurrent_start_is_rejected_without_disturbing_session() {
        let (link, mut settings, mut cal) = setup();
        let now = Instant::now();

        assert!(cal.start(0, &link, now));
        assert!(!cal.start(1, &link, now));
        assert_eq!(cal.active(), Some((0, Phase::AwaitingStillness)));

        // The rejected request must not have shifted the deadline either.
        assert_eq!(
            cal.tick(now + STILLNESS_WAIT - Duration::from_millis(1), &link, &mut settings),
            None
        );
    }

    #[test]
    fn start_preconditions_drop_the_request() {
        let (link, _settings, mut cal) = setup();
        let now = Instant::now();

        // Out-of-range tracker id.
        assert!(!cal.start(2, &link, now));

        // Uninitialized link.
        link.shutdown();
        assert!(!cal.start(0, &link, now));
        assert_eq!(cal.active(), None);
    }

    #[test]
    fn link_down_during_stillness_aborts_without_persisting() {
        let (link, mut settings, mut cal) = setup();
        let before = settings.get_or_create(0);

        let mut now = Instant::now();
        assert!(cal.start(0, &link, now));
        link.shutdown();

        let end = advance(&mut cal, &mut now, STILLNESS_WAIT, &link, &mut settings);
        assert_eq!(end, Some(Phase::Aborted));
        assert_eq!(cal.active(), None);
        assert!(!link.calibrating_forward(0));
        assert_eq!(settings.get_or_create(0), before);
    }

    #[test]
    fn prompt_tracks_phase() {
        let (link, mut settings, mut cal) = setup();
        assert_eq!(cal.prompt(), None);

        let mut now = Instant::now();
        cal.start(0, &link, now);
        assert!(cal.prompt().unwrap().contains("face forward"));

        advance(&mut cal, &mut now, STILLNESS_WAIT, &link, &mut settings);
        assert!(cal.prompt().unwrap().contains("hold still"));

        advance(&mut cal, &mut now, FORWARD_CAPTURE, &link, &mut settings);
        assert!(cal.prompt().unwrap().contains("tilt the device down"));
    }
}
