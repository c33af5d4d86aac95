use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds, as handed to every `update` call by the tick loop.
pub type Timestamp = f64;

/// Wall-clock seconds since the UNIX epoch.
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
