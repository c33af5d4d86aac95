//! Scenes group time-functions into one look; choosers and sequences decide
//! which scene is live.

use log::warn;

use crate::clock::Timestamp;
use crate::cue::Cue;
use crate::error::{Error, Result};
use crate::function::Function;

pub mod chooser;
pub mod sequence;

pub use self::chooser::SceneChooser;
pub use self::sequence::SceneSequence;

/// Unordered set of time-functions updated together each tick.
///
/// Two functions of one scene may not drive the same attribute; this is
/// rejected when the function is added.
#[derive(Default)]
pub struct Scene {
    functions: Vec<Function>,
}

impl Scene {
    pub fn new(functions: impl IntoIterator<Item = Function>) -> Result<Self> {
        let mut scene = Scene::default();
        for f in functions {
            scene.push(f)?;
        }
        Ok(scene)
    }

    pub fn push(&mut self, function: impl Into<Function>) -> Result<()> {
        let function = function.into();
        if let Some(attribute) = function.attribute() {
            let clash = self
                .functions
                .iter()
                .filter_map(Function::attribute)
                .any(|other| other.ptr_eq(attribute));
            if clash {
                return Err(Error::IncompatibleTarget(format!(
                    "{} is already driven by another function of this scene",
                    attribute.class_id()
                )));
            }
        }
        self.functions.push(function);
        Ok(())
    }

    pub fn with(mut self, function: impl Into<Function>) -> Result<Self> {
        self.push(function)?;
        Ok(self)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function_mut(&mut self, index: usize) -> Option<&mut Function> {
        self.functions.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Cue for Scene {
    fn trigger_at(&mut self, now: Timestamp) {
        for f in self.functions.iter_mut() {
            f.trigger_at(now);
        }
    }

    /// Every function is updated even if an earlier one fails; the first
    /// failure is returned.
    fn update(&mut self, now: Timestamp) -> Result<()> {
        let mut first_error = None;
        for f in self.functions.iter_mut() {
            if let Err(e) = f.update(now) {
                warn!("Scene function failed to update: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn finished(&self) -> bool {
        self.functions.iter().all(Function::finished)
    }
}
