//! Status/health projection over the device link's raw status code.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::link;

/// Coarse link health derived from the raw status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    NotStarted,
    Success,
    ConnectionDead,
    NoData,
    InitFailed,
    PortsTaken,
    /// Unrecognized code, passed through for display.
    Other(i32),
}

impl HandlerStatus {
    pub fn from_code(code: i32) -> HandlerStatus {
        match code {
            link::STATUS_SUCCESS => HandlerStatus::Success,
            link::STATUS_CON_DEAD => HandlerStatus::ConnectionDead,
            link::STATUS_NO_DATA => HandlerStatus::NoData,
            link::STATUS_INIT_FAILED => HandlerStatus::InitFailed,
            link::STATUS_PORTS_TAKEN => HandlerStatus::PortsTaken,
            link::STATUS_NOT_STARTED => HandlerStatus::NotStarted,
            other => HandlerStatus::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            HandlerStatus::Success => link::STATUS_SUCCESS,
            HandlerStatus::ConnectionDead => link::STATUS_CON_DEAD,
            HandlerStatus::NoData => link::STATUS_NO_DATA,
            HandlerStatus::InitFailed => link::STATUS_INIT_FAILED,
            HandlerStatus::PortsTaken => link::STATUS_PORTS_TAKEN,
            HandlerStatus::NotStarted => link::STATUS_NOT_STARTED,
            HandlerStatus::Other(code) => code,
        }
    }
}

impl fmt::Display for HandlerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerStatus::NotStarted => write!(f, "Not started! Enable the device to connect."),
            HandlerStatus::Success => write!(f, "Success! Trackers connected."),
            HandlerStatus::ConnectionDead => write!(f, "Connection lost! Check your network."),
            HandlerStatus::NoData => write!(f, "Connected, but no data received."),
            HandlerStatus::InitFailed => write!(f, "Initialization failed."),
            HandlerStatus::PortsTaken => write!(f, "Listening ports already taken."),
            HandlerStatus::Other(code) => write!(f, "Status: {code}"),
        }
    }
}

/// Human-readable status summary. Success reports the live device and joint
/// counts; everything else degrades to the plain status text.
pub fn status_text(code: i32, device_count: usize, joint_count: usize) -> String {
    let status = HandlerStatus::from_code(code);
    match status {
        HandlerStatus::Success => format!(
            "{status} ({device_count} device{}, {joint_count} active)",
            if device_count == 1 { "" } else { "s" },
        ),
        other => other.to_string(),
    }
}

/// Remembers the last observed status code to decide whether the host should
/// refresh its settings surface. Purely advisory; never feeds pose math.
pub struct StatusCache {
    last: AtomicI32,
}

impl StatusCache {
    pub fn new() -> Self {
        StatusCache {
            last: AtomicI32::new(link::STATUS_NOT_STARTED),
        }
    }

    /// Record `code`; returns true if it differs from the previous value.
    pub fn refresh(&self, code: i32) -> bool {
        self.last.swap(code, Ordering::Relaxed) != code
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}
