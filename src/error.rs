/// Errors that can occur in the tracking core.
///
/// Transport-level conditions (connection dead, no data, ports taken) are not
/// errors here: they are carried as status codes and the pose loop idles while
/// the link is non-nominal. Only genuinely fatal conditions surface as `Err`.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("settings store unavailable: {0}")]
    Store(String),

    #[error("failed to spawn driver thread: {0}")]
    DriverSpawn(String),
}
