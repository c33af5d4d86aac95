use log::trace;

use crate::dmx::{scale, to_byte};
use crate::error::{Error, Result};

use super::{FixtureLink, Patch};

/// Bounded numeric attribute.
#[derive(Debug)]
pub struct RangeAttribute {
    pub class_id: String,
    pub min: f64,
    pub max: f64,
    pub unit: String,
    /// Forward `max - v` to the hardware while `get()` keeps the logical value.
    pub invert: bool,
    pub patch: Patch,
    value: f64,
    fixture: Option<FixtureLink>,
}

impl RangeAttribute {
    pub fn new(min: f64, max: f64) -> Self {
        // Zero when the domain allows it, otherwise the nearest bound.
        let value = if (min..=max).contains(&0.0) {
            0.0
        } else {
            min
        };
        RangeAttribute {
            class_id: String::from("RangeValue"),
            min,
            max,
            unit: String::new(),
            invert: false,
            patch: Patch::Virtual,
            value,
            fixture: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    pub fn patched(mut self, patch: Patch) -> Self {
        self.patch = patch;
        self
    }

    /// 8-bit DMX channel, the common case.
    pub fn coarse(self, channel: u16) -> Self {
        self.patched(Patch::Coarse { channel })
    }

    /// 16-bit DMX value over a coarse/fine channel pair.
    pub fn fine(self, msb: u16, lsb: u16) -> Self {
        self.patched(Patch::Fine { msb, lsb })
    }

    pub fn with_class_id(mut self, class_id: &str) -> Self {
        self.class_id = class_id.into();
        self
    }

    /// False for an empty or NaN domain, which no value can satisfy.
    pub fn has_valid_bounds(&self) -> bool {
        self.min <= self.max
    }

    pub fn validate(&self, v: f64) -> Result<()> {
        if (self.min..=self.max).contains(&v) {
            Ok(())
        } else {
            Err(Error::OutOfRange {
                value: v,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Validate `v`, forward it to the hardware and only then keep it. A
    /// failed write leaves both the value and the channels untouched.
    pub fn set(&mut self, v: f64) -> Result<()> {
        self.validate(v)?;
        self.patch.check(&self.class_id, self.fixture.as_ref())?;
        self.on_set(if self.invert { self.max - v } else { v })?;
        self.value = v;
        Ok(())
    }

    pub fn get(&self) -> f64 {
        self.value
    }

    /// Clamp `v` into the declared domain.
    pub fn clamp(&self, v: f64) -> f64 {
        v.max(self.min).min(self.max)
    }

    pub fn attach(&mut self, link: FixtureLink) {
        self.fixture = Some(link);
    }

    pub fn fixture(&self) -> Option<&FixtureLink> {
        self.fixture.as_ref()
    }

    fn on_set(&self, v: f64) -> Result<()> {
        let Some(fixture) = &self.fixture else {
            return Ok(());
        };
        match self.patch {
            Patch::Virtual => Ok(()),
            Patch::Coarse { channel } => {
                let byte = to_byte(scale(v, self.min, self.max, u8::MAX as u32))?;
                trace!("{} -> ch +{} = {}", self.class_id, channel, byte);
                fixture.ch_set(channel, byte)
            }
            Patch::Fine { msb, lsb } => {
                let short = scale(v, self.min, self.max, u16::MAX as u32);
                trace!("{} -> ch +{}/+{} = {}", self.class_id, msb, lsb, short);
                fixture.ch_set(msb, to_byte(short >> 8)?)?;
                fixture.ch_set(lsb, to_byte(short & 0xFF)?)
            }
        }
    }
}
