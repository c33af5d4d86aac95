use crate::clock::Timestamp;
use crate::cue::Cue;
use crate::error::Result;

/// Pure timer. The first update after a trigger fixes the deadline; only a
/// later update can observe it passed, so even a zero delay spans two ticks.
#[derive(Debug, Clone)]
pub struct Delay {
    duration: f64,
    end: Option<Timestamp>,
    dirty: bool,
}

impl Delay {
    pub fn new(duration: f64) -> Self {
        Delay {
            duration: duration.max(0.0),
            end: None,
            dirty: false,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }
}

impl Cue for Delay {
    fn trigger_at(&mut self, _now: Timestamp) {
        self.end = None;
        self.dirty = true;
    }

    fn update(&mut self, now: Timestamp) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        match self.end {
            None => self.end = Some(now + self.duration),
            Some(end) if now >= end => {
                self.end = None;
                self.dirty = false;
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn finished(&self) -> bool {
        !self.dirty
    }
}
