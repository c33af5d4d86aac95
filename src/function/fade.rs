use tween::{CubicInOut, ExpoInOut, QuadInOut, SineInOut, Tween, Tweener};

use crate::attribute::AttributeHandle;
use crate::clock::Timestamp;
use crate::cue::Cue;
use crate::error::Result;

use super::{read_range, require_range, write_clamped};

/// Shape of a fade between its start and target values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Curve {
    #[default]
    Linear,
    SineInOut,
    QuadInOut,
    CubicInOut,
    ExpoInOut,
}

impl Curve {
    /// Value at `elapsed` seconds into a fade of `duration` seconds.
    fn sample(&self, from: f64, to: f64, duration: f64, elapsed: f64) -> f64 {
        let duration_ms = (duration * 1000.0) as usize;
        let elapsed_ms = (elapsed.max(0.0) * 1000.0) as usize;
        if duration_ms == 0 {
            return to;
        }
        match self {
            Curve::Linear => from + (to - from) * (elapsed / duration),
            Curve::SineInOut => ease(SineInOut, from, to, duration_ms, elapsed_ms),
            Curve::QuadInOut => ease(QuadInOut, from, to, duration_ms, elapsed_ms),
            Curve::CubicInOut => ease(CubicInOut, from, to, duration_ms, elapsed_ms),
            Curve::ExpoInOut => ease(ExpoInOut, from, to, duration_ms, elapsed_ms),
        }
    }
}

fn ease<T: Tween<f32>>(tween: T, from: f64, to: f64, duration_ms: usize, elapsed_ms: usize) -> f64 {
    let mut tweener = Tweener::new(from as f32, to as f32, duration_ms, tween);
    tweener.move_to(elapsed_ms.min(duration_ms)) as f64
}

/// Moves a range attribute from wherever it sits at trigger time to `target`
/// over `duration` seconds.
pub struct Fade {
    attribute: AttributeHandle,
    target: f64,
    duration: f64,
    curve: Curve,
    start_value: f64,
    end_value: f64,
    segment_duration: f64,
    start_time: Timestamp,
    end_time: Timestamp,
    rate: f64,
    dirty: bool,
}

impl Fade {
    pub fn new(attribute: AttributeHandle, target: f64, duration: f64) -> Result<Self> {
        require_range(&attribute, "Fade")?;
        attribute.lock().validate(&target.into())?;
        let duration = duration.max(0.0);
        Ok(Fade {
            attribute,
            target,
            duration,
            curve: Curve::Linear,
            start_value: 0.0,
            end_value: target,
            segment_duration: duration,
            start_time: 0.0,
            end_time: 0.0,
            rate: 0.0,
            dirty: false,
        })
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    pub fn attribute(&self) -> &AttributeHandle {
        &self.attribute
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// Takes effect at the next trigger; a running segment keeps its own.
    pub fn set_target(&mut self, target: f64) -> Result<()> {
        self.attribute.lock().validate(&target.into())?;
        self.target = target;
        Ok(())
    }

    /// Takes effect at the next trigger.
    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
    }

    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    /// Interpolated value at `t` on the segment fixed by the last trigger,
    /// before domain clamping.
    pub fn value_at(&self, t: Timestamp) -> f64 {
        if t >= self.end_time {
            return self.end_value;
        }
        let elapsed = (t - self.start_time).max(0.0);
        match self.curve {
            Curve::Linear => self.rate * elapsed + self.start_value,
            curve => curve.sample(
                self.start_value,
                self.end_value,
                self.segment_duration,
                elapsed,
            ),
        }
    }
}

impl Cue for Fade {
    fn trigger_at(&mut self, now: Timestamp) {
        // Live value, not the last computed one: a retrigger mid-fade
        // starts a new segment from wherever the attribute sits.
        self.start_value = read_range(&self.attribute, |a| a.get()).unwrap_or(self.target);
        self.end_value = self.target;
        self.segment_duration = self.duration;
        self.start_time = now;
        self.end_time = now + self.segment_duration;
        self.rate = if self.segment_duration > 0.0 {
            (self.end_value - self.start_value) / self.segment_duration
        } else {
            0.0
        };
        self.dirty = true;
    }

    fn update(&mut self, now: Timestamp) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let done = now >= self.end_time;
        if done {
            self.dirty = false;
        }
        write_clamped(&self.attribute, self.value_at(now)).map_err(|e| {
            self.dirty = false;
            e
        })
    }

    fn finished(&self) -> bool {
        !self.dirty
    }
}

impl std::fmt::Debug for Fade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fade")
            .field("target", &self.target)
            .field("duration", &self.duration)
            .field("curve", &self.curve)
            .field("dirty", &self.dirty)
            .finish()
    }
}
