use rand::{seq::IteratorRandom, Rng};

use crate::attribute::{Attribute, AttributeHandle, AttributeValue};
use crate::clock::Timestamp;
use crate::cue::Cue;
use crate::error::{Error, Result};

/// What a [`Periodic`] writes each time it fires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Source {
    /// Uniform over the domain; a random choice for discrete attributes.
    Random,
    /// Alternate between `min` and `max` (strobe).
    Toggle,
    /// Add the increment, wrapping to the opposite bound past either end.
    Step(f64),
}

/// Recomputes its attribute every `period` seconds.
pub struct Periodic {
    attribute: AttributeHandle,
    period: f64,
    source: Source,
    last_execution: Timestamp,
    dirty: bool,
}

impl Periodic {
    pub fn new(attribute: AttributeHandle, period: f64, source: Source) -> Result<Self> {
        {
            let guard = attribute.lock();
            match (&*guard, source) {
                (Attribute::Range(a), _) if !a.has_valid_bounds() => {
                    return Err(Error::IncompatibleTarget(format!(
                        "Periodic cannot drive {} with bounds [{}, {}]",
                        a.class_id, a.min, a.max
                    )))
                }
                (Attribute::Range(_), _) | (Attribute::Discrete(_), Source::Random) => {}
                (other, source) => {
                    return Err(Error::IncompatibleTarget(format!(
                        "Periodic {:?} cannot drive {}",
                        source,
                        other.class_id()
                    )))
                }
            }
        }
        Ok(Periodic {
            attribute,
            period,
            source,
            last_execution: 0.0,
            dirty: false,
        })
    }

    pub fn with_last_execution(mut self, t: Timestamp) -> Self {
        self.last_execution = t;
        self
    }

    pub fn attribute(&self) -> &AttributeHandle {
        &self.attribute
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn set_period(&mut self, period: f64) {
        self.period = period;
    }

    pub fn last_execution(&self) -> Timestamp {
        self.last_execution
    }

    fn next_value(&self, attribute: &Attribute) -> Option<AttributeValue> {
        let mut rng = rand::thread_rng();
        match attribute {
            Attribute::Range(a) => {
                let v = match self.source {
                    Source::Random => rng.gen_range(a.min..=a.max),
                    Source::Toggle => {
                        if a.get() >= a.max {
                            a.min
                        } else {
                            a.max
                        }
                    }
                    Source::Step(increment) => {
                        let v = a.get() + increment;
                        if v > a.max {
                            a.min
                        } else if v < a.min {
                            a.max
                        } else {
                            v
                        }
                    }
                };
                Some(AttributeValue::Number(v))
            }
            Attribute::Discrete(a) => a
                .choices()
                .keys()
                .choose(&mut rng)
                .map(|key| AttributeValue::Choice(key.clone())),
            Attribute::Group(_) => None,
        }
    }
}

impl Cue for Periodic {
    fn trigger_at(&mut self, _now: Timestamp) {
        self.dirty = true;
    }

    fn update(&mut self, now: Timestamp) -> Result<()> {
        if now - self.last_execution >= self.period {
            self.dirty = true;
        }
        if !self.dirty {
            return Ok(());
        }
        self.dirty = false;
        self.last_execution = now;

        let mut guard = self.attribute.lock();
        match self.next_value(&guard) {
            Some(v) => guard.set(&v),
            None => Ok(()),
        }
    }

    fn finished(&self) -> bool {
        !self.dirty
    }
}
