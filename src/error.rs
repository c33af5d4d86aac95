use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A numeric value fell outside the declared `[min, max]` bounds.
    #[error("value {value} outside of [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// A discrete value is not one of the known choice keys.
    #[error("invalid discrete value \"{0}\"")]
    InvalidChoice(String),

    /// A patched leaf attribute was written before being bound to a fixture.
    #[error("no fixture attached to attribute \"{0}\"")]
    Unattached(String),

    /// Scene name unknown to a chooser.
    #[error("scene \"{0}\" not found")]
    NotFound(String),

    /// A time-function was built against an attribute it cannot drive.
    #[error("incompatible target: {0}")]
    IncompatibleTarget(String),

    #[error("DMX channel out of bounds: {0}")]
    ChannelOutOfRange(u16),

    #[error("DMX value out of bounds: {0}")]
    ValueOutOfRange(u32),

    #[error(transparent)]
    Desk(#[from] DeskError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeskError {
    #[error("control desk is not running")]
    NotRunning,

    #[error("control desk is already running")]
    AlreadyRunning,

    /// The queue slot is occupied; only returned by non-blocking pushes.
    #[error("control desk queue is full")]
    Busy,

    #[error("control desk queue disconnected")]
    Disconnected,

    #[error("an event is already registered for {0}")]
    DuplicateRoute(String),

    #[error("failed to spawn desk task: {0}")]
    Spawn(String),

    /// A hook panicked outside event processing and took the task with it.
    #[error("control desk hooks were lost to a panic")]
    HooksLost,
}
