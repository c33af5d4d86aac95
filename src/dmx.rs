use std::sync::{Arc, Mutex, PoisonError};

use log::trace;

use crate::error::{Error, Result};
use crate::settings::CHANNELS_PER_UNIVERSE;

/// Hardware write path reachable from patched leaf attributes.
pub trait ChannelSink: Send + Sync {
    fn ch_set(&self, channel: u16, value: u8) -> Result<()>;

    /// Whether `channel` would be accepted by [`ChannelSink::ch_set`].
    fn check(&self, channel: u16) -> Result<()> {
        let _ = channel;
        Ok(())
    }
}

/// One DMX universe worth of channel state, shared between the fixtures
/// writing into it and the transport shipping it out.
#[derive(Clone)]
pub struct Universe {
    channels: Arc<Mutex<Vec<u8>>>,
}

impl Universe {
    pub fn new() -> Self {
        Universe {
            channels: Arc::new(Mutex::new(
                [0].repeat(CHANNELS_PER_UNIVERSE as usize),
            )),
        }
    }

    pub fn get(&self, channel: u16) -> Option<u8> {
        self.lock().get(channel as usize).copied()
    }

    /// Copy of the current channel state, as handed to a transport.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn zero(&self) {
        self.lock().iter_mut().for_each(|c| *c = 0);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSink for Universe {
    fn ch_set(&self, channel: u16, value: u8) -> Result<()> {
        self.check(channel)?;
        trace!("Set ch #{:3}: {}", channel, value);
        self.lock()[channel as usize] = value;
        Ok(())
    }

    fn check(&self, channel: u16) -> Result<()> {
        if channel >= CHANNELS_PER_UNIVERSE {
            return Err(Error::ChannelOutOfRange(channel));
        }
        Ok(())
    }
}

/// Scale `v` from `[min, max]` onto `0..=full_scale`.
pub fn scale(v: f64, min: f64, max: f64, full_scale: u32) -> u32 {
    let span = max - min;
    if span <= 0.0 {
        return 0;
    }
    let normalised = ((v - min) / span).clamp(0.0, 1.0);
    (normalised * full_scale as f64).round() as u32
}

/// Checked narrowing for values headed to an 8-bit channel.
pub fn to_byte(value: u32) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::ValueOutOfRange(value))
}
