use log::debug;

use crate::clock::Timestamp;
use crate::cue::Cue;
use crate::error::Result;

use super::Scene;

/// Ordered steps played one after the other.
///
/// The sequence is running while it has a current index and idle otherwise.
/// A step is triggered lazily: when the sequence visits a step that is
/// already finished, it triggers it before updating. A step pre-triggered
/// from outside is therefore not restarted when the sequence reaches it.
pub struct SceneSequence {
    steps: Vec<Box<dyn Cue>>,
    auto: bool,
    looping: bool,
    index: Option<usize>,
}

impl SceneSequence {
    pub fn new(steps: impl IntoIterator<Item = Box<dyn Cue>>) -> Self {
        SceneSequence {
            steps: steps.into_iter().collect(),
            auto: true,
            looping: false,
            index: None,
        }
    }

    /// Advance on completion of each step (default on).
    pub fn with_auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    /// Wrap back to the first step after the last (default off).
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Shorthand for a sequence made only of scenes.
    pub fn of_scenes(scenes: impl IntoIterator<Item = Scene>) -> Self {
        SceneSequence::new(scenes.into_iter().map(|s| Box::new(s) as Box<dyn Cue>))
    }

    pub fn push(&mut self, step: impl Cue + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_mut(&mut self, index: usize) -> Option<&mut Box<dyn Cue>> {
        self.steps.get_mut(index)
    }

    /// Move to the following step regardless of `auto`.
    pub fn next(&mut self) {
        self.index = match self.index {
            Some(i) if i + 1 < self.steps.len() => Some(i + 1),
            Some(_) if self.looping => Some(0),
            _ => None,
        };
        match self.index {
            Some(i) => debug!("Sequence step {}/{}", i + 1, self.steps.len()),
            None => debug!("Sequence finished"),
        }
    }
}

impl Cue for SceneSequence {
    fn trigger_at(&mut self, _now: Timestamp) {
        self.index = if self.steps.is_empty() { None } else { Some(0) };
    }

    fn update(&mut self, now: Timestamp) -> Result<()> {
        let Some(step) = self.index.and_then(|i| self.steps.get_mut(i)) else {
            return Ok(());
        };
        if step.finished() {
            step.trigger_at(now);
        }
        step.update(now)?;
        if step.finished() && self.auto {
            self.next();
        }
        Ok(())
    }

    fn finished(&self) -> bool {
        self.index.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeHandle, AttributeValue, RangeAttribute};
    use crate::function::{Delay, Fade, Static};

    fn boxed(step: impl Cue + 'static) -> Box<dyn Cue> {
        Box::new(step)
    }

    fn instant_steps() -> Vec<Box<dyn Cue>> {
        vec![boxed(Scene::default()), boxed(Scene::default())]
    }

    #[test]
    fn starts_idle() {
        let mut seq = SceneSequence::new(instant_steps());
        assert!(seq.finished());
        assert_eq!(seq.index(), None);
        seq.update(0.0).unwrap();
        assert_eq!(seq.index(), None);
    }

    #[test]
    fn looping_sequence_cycles_forever() {
        let mut seq = SceneSequence::new(instant_steps()).looping(true);
        seq.trigger_at(0.0);
        assert_eq!(seq.index(), Some(0));
        let mut seen = Vec::new();
        for t in 0..6 {
            seq.update(t as f64).unwrap();
            seen.push(seq.index());
            assert!(!seq.finished());
        }
        assert_eq!(
            seen,
            vec![Some(1), Some(0), Some(1), Some(0), Some(1), Some(0)]
        );
    }

    #[test]
    fn non_looping_sequence_terminates() {
        let mut seq = SceneSequence::new(instant_steps());
        seq.trigger_at(0.0);
        seq.update(0.0).unwrap();
        assert_eq!(seq.index(), Some(1));
        assert!(!seq.finished());
        seq.update(1.0).unwrap();
        assert!(seq.finished());
        seq.update(2.0).unwrap();
        assert_eq!(seq.index(), None);
    }

    #[test]
    fn manual_sequence_waits_for_next() {
        let mut seq = SceneSequence::new(instant_steps()).with_auto(false);
        seq.trigger_at(0.0);
        seq.update(0.0).unwrap();
        seq.update(1.0).unwrap();
        assert_eq!(seq.index(), Some(0));
        seq.next();
        assert_eq!(seq.index(), Some(1));
        seq.next();
        assert!(seq.finished());
        seq.next();
        assert!(seq.finished());
    }

    #[test]
    fn steps_play_in_order() {
        let dimmer = AttributeHandle::new(RangeAttribute::new(0.0, 100.0));
        let mut seq = SceneSequence::of_scenes([
            Scene::new([Static::new(dimmer.clone(), 100.0).unwrap().into()]).unwrap(),
            Scene::new([Delay::new(1.0).into()]).unwrap(),
            Scene::new([Fade::new(dimmer.clone(), 0.0, 1.0).unwrap().into()]).unwrap(),
        ]);
        seq.trigger_at(0.0);

        seq.update(0.0).unwrap();
        assert_eq!(dimmer.get(), AttributeValue::Number(100.0));
        assert_eq!(seq.index(), Some(1));

        // Delay: deadline fixed at 1.1 by the first visit
        seq.update(0.1).unwrap();
        seq.update(1.0).unwrap();
        assert_eq!(seq.index(), Some(1));
        seq.update(1.2).unwrap();
        assert_eq!(seq.index(), Some(2));

        // Fade triggered lazily on its first visit
        seq.update(1.5).unwrap();
        assert_eq!(dimmer.get(), AttributeValue::Number(100.0));
        seq.update(2.0).unwrap();
        assert_eq!(dimmer.get(), AttributeValue::Number(50.0));
        seq.update(2.5).unwrap();
        assert_eq!(dimmer.get(), AttributeValue::Number(0.0));
        assert!(seq.finished());
    }

    #[test]
    fn pre_triggered_step_is_not_restarted() {
        let mut seq = SceneSequence::new([boxed(Scene::default()), boxed(Delay::new(1.0))]);
        if let Some(delay) = seq.step_mut(1) {
            delay.trigger_at(0.0);
            delay.update(0.0).unwrap();
        }
        seq.trigger_at(0.5);
        seq.update(0.5).unwrap();
        assert_eq!(seq.index(), Some(1));
        // Deadline set at 0.0 survives; a restart would push it to 2.0.
        seq.update(1.0).unwrap();
        assert!(seq.finished());
    }

    #[test]
    fn nested_sequences_are_steps_too() {
        let inner = SceneSequence::new(instant_steps());
        let mut outer = SceneSequence::new([boxed(inner), boxed(Scene::default())]);
        outer.trigger_at(0.0);
        outer.update(0.0).unwrap();
        assert_eq!(outer.index(), Some(0));
        outer.update(1.0).unwrap();
        assert_eq!(outer.index(), Some(1));
        outer.update(2.0).unwrap();
        assert!(outer.finished());
    }
}
