use std::f64::consts::TAU;

use crate::attribute::AttributeHandle;
use crate::clock::Timestamp;
use crate::cue::Cue;
use crate::error::{Error, Result};

use super::{read_range, require_range, write_clamped};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sawtooth,
    Triangle,
    Sine,
    Square,
}

impl Waveform {
    /// Shape in `[0,1]` for a phase in `[0,1)`.
    pub fn shape(&self, phase: f64) -> f64 {
        match self {
            Waveform::Sawtooth => phase,
            Waveform::Triangle => 1.0 - (2.0 * phase - 1.0).abs(),
            Waveform::Sine => 0.5 - 0.5 * (TAU * phase).cos(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Free-running waveform over the attribute's whole domain. Written every
/// tick and never finishes.
pub struct Animation {
    attribute: AttributeHandle,
    waveform: Waveform,
    period: f64,
    dirty: bool,
}

impl Animation {
    pub fn new(attribute: AttributeHandle, waveform: Waveform, period: f64) -> Result<Self> {
        require_range(&attribute, "Animation")?;
        if period.is_nan() || period <= 0.0 {
            return Err(Error::OutOfRange {
                value: period,
                min: f64::MIN_POSITIVE,
                max: f64::INFINITY,
            });
        }
        Ok(Animation {
            attribute,
            waveform,
            period,
            dirty: true,
        })
    }

    pub fn attribute(&self) -> &AttributeHandle {
        &self.attribute
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn phase(&self, t: Timestamp) -> f64 {
        let cycles = t / self.period;
        cycles - cycles.floor()
    }
}

impl Cue for Animation {
    fn trigger_at(&mut self, _now: Timestamp) {
        self.dirty = true;
    }

    fn update(&mut self, now: Timestamp) -> Result<()> {
        self.dirty = true;
        let shape = self.waveform.shape(self.phase(now));
        let Some(v) = read_range(&self.attribute, |a| a.min + (a.max - a.min) * shape) else {
            return Ok(());
        };
        write_clamped(&self.attribute, v)
    }

    fn finished(&self) -> bool {
        !self.dirty
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;
    use crate::attribute::RangeAttribute;

    fn level() -> AttributeHandle {
        AttributeHandle::new(RangeAttribute::new(10.0, 20.0))
    }

    #[test]
    fn sawtooth_follows_the_phasor() {
        let a = level();
        let mut f = Animation::new(a.clone(), Waveform::Sawtooth, 1.0).unwrap();
        f.update(1000.25).unwrap();
        assert!(approx_eq!(f64, a.get().as_number().unwrap(), 12.5, epsilon = 1e-6));
        f.update(1000.75).unwrap();
        assert!(approx_eq!(f64, a.get().as_number().unwrap(), 17.5, epsilon = 1e-6));
    }

    #[test]
    fn never_finishes() {
        let mut f = Animation::new(level(), Waveform::Sine, 2.0).unwrap();
        assert!(!f.finished());
        f.update(0.0).unwrap();
        assert!(!f.finished());
        f.trigger_at(1.0);
        assert!(!f.finished());
    }

    #[test]
    fn shapes_stay_in_unit_interval() {
        for waveform in [
            Waveform::Sawtooth,
            Waveform::Triangle,
            Waveform::Sine,
            Waveform::Square,
        ] {
            for i in 0..100 {
                let s = waveform.shape(i as f64 / 100.0);
                assert!((0.0..=1.0).contains(&s), "{:?} at {}", waveform, i);
            }
        }
        assert_eq!(Waveform::Triangle.shape(0.5), 1.0);
        assert!(approx_eq!(f64, Waveform::Sine.shape(0.5), 1.0, epsilon = 1e-12));
    }

    #[test]
    fn rejects_non_positive_periods() {
        assert!(Animation::new(level(), Waveform::Square, 0.0).is_err());
        assert!(Animation::new(level(), Waveform::Square, f64::NAN).is_err());
    }

    #[test]
    fn rejects_inverted_bounds() {
        let a = AttributeHandle::new(RangeAttribute::new(20.0, 10.0));
        assert!(matches!(
            Animation::new(a, Waveform::Sine, 1.0),
            Err(Error::IncompatibleTarget(_))
        ));
    }
}
