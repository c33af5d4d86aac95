//! Time-functions: stateful generators computing a new attribute value per
//! tick.
//!
//! Every variant follows the same `dirty` discipline: `trigger` marks work
//! pending, `update` applies it, and a function is finished exactly when it
//! has nothing pending.

use crate::attribute::{AttributeHandle, RangeAttribute};
use crate::clock::Timestamp;
use crate::cue::Cue;
use crate::error::{Error, Result};

pub mod animation;
pub mod delay;
pub mod fade;
pub mod periodic;
pub mod static_value;

pub use self::animation::{Animation, Waveform};
pub use self::delay::Delay;
pub use self::fade::{Curve, Fade};
pub use self::periodic::{Periodic, Source};
pub use self::static_value::Static;

pub enum Function {
    Static(Static),
    Fade(Fade),
    Periodic(Periodic),
    Animation(Animation),
    Delay(Delay),
}

impl Function {
    /// The attribute this function writes to; `None` for pure timers.
    pub fn attribute(&self) -> Option<&AttributeHandle> {
        match self {
            Function::Static(f) => Some(f.attribute()),
            Function::Fade(f) => Some(f.attribute()),
            Function::Periodic(f) => Some(f.attribute()),
            Function::Animation(f) => Some(f.attribute()),
            Function::Delay(_) => None,
        }
    }

    pub fn as_fade_mut(&mut self) -> Option<&mut Fade> {
        match self {
            Function::Fade(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_static_mut(&mut self) -> Option<&mut Static> {
        match self {
            Function::Static(f) => Some(f),
            _ => None,
        }
    }

    fn as_cue(&self) -> &dyn Cue {
        match self {
            Function::Static(f) => f,
            Function::Fade(f) => f,
            Function::Periodic(f) => f,
            Function::Animation(f) => f,
            Function::Delay(f) => f,
        }
    }

    fn as_cue_mut(&mut self) -> &mut dyn Cue {
        match self {
            Function::Static(f) => f,
            Function::Fade(f) => f,
            Function::Periodic(f) => f,
            Function::Animation(f) => f,
            Function::Delay(f) => f,
        }
    }
}

impl Cue for Function {
    fn trigger_at(&mut self, now: Timestamp) {
        self.as_cue_mut().trigger_at(now)
    }

    fn update(&mut self, now: Timestamp) -> Result<()> {
        self.as_cue_mut().update(now)
    }

    fn finished(&self) -> bool {
        self.as_cue().finished()
    }
}

impl From<Static> for Function {
    fn from(f: Static) -> Self {
        Function::Static(f)
    }
}

impl From<Fade> for Function {
    fn from(f: Fade) -> Self {
        Function::Fade(f)
    }
}

impl From<Periodic> for Function {
    fn from(f: Periodic) -> Self {
        Function::Periodic(f)
    }
}

impl From<Animation> for Function {
    fn from(f: Animation) -> Self {
        Function::Animation(f)
    }
}

impl From<Delay> for Function {
    fn from(f: Delay) -> Self {
        Function::Delay(f)
    }
}

/// Fail unless `attribute` is a bounded numeric attribute.
fn require_range(attribute: &AttributeHandle, function: &str) -> Result<()> {
    let guard = attribute.lock();
    match guard.as_range() {
        Some(a) if a.has_valid_bounds() => Ok(()),
        Some(a) => Err(Error::IncompatibleTarget(format!(
            "{} cannot drive {} with bounds [{}, {}]",
            function, a.class_id, a.min, a.max
        ))),
        None => Err(Error::IncompatibleTarget(format!(
            "{} is only compatible with RangeValue attributes, got {}",
            function,
            guard.class_id()
        ))),
    }
}

/// Clamp `v` into the attribute's domain, then write it.
fn write_clamped(attribute: &AttributeHandle, v: f64) -> Result<()> {
    let mut guard = attribute.lock();
    match guard.as_range_mut() {
        Some(range) => {
            let v = range.clamp(v);
            range.set(v)
        }
        None => Err(Error::IncompatibleTarget(guard.class_id().into())),
    }
}

fn read_range<T>(attribute: &AttributeHandle, f: impl FnOnce(&RangeAttribute) -> T) -> Option<T> {
    attribute.lock().as_range().map(f)
}
