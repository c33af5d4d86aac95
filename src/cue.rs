use crate::clock::{self, Timestamp};
use crate::error::Result;

/// Anything the tick loop can drive: time-functions, scenes, choosers and
/// sequences all share this contract.
pub trait Cue: Send {
    /// Mark pending work, taking `now` as the start of any interpolation.
    fn trigger_at(&mut self, now: Timestamp);

    fn trigger(&mut self) {
        self.trigger_at(clock::now())
    }

    /// Advance to `now`. A cue with no pending work does nothing.
    fn update(&mut self, now: Timestamp) -> Result<()>;

    /// True once no pending work remains.
    fn finished(&self) -> bool;
}

impl<C: Cue + ?Sized> Cue for Box<C> {
    fn trigger_at(&mut self, now: Timestamp) {
        (**self).trigger_at(now)
    }

    fn update(&mut self, now: Timestamp) -> Result<()> {
        (**self).update(now)
    }

    fn finished(&self) -> bool {
        (**self).finished()
    }
}
