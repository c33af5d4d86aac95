use crate::attribute::{AttributeHandle, AttributeValue};
use crate::clock::Timestamp;
use crate::cue::Cue;
use crate::error::Result;

/// Writes a fixed target once per trigger.
pub struct Static {
    attribute: AttributeHandle,
    target: AttributeValue,
    dirty: bool,
}

impl Static {
    pub fn new(attribute: AttributeHandle, target: impl Into<AttributeValue>) -> Result<Self> {
        let target = target.into();
        attribute.lock().validate(&target)?;
        Ok(Static {
            attribute,
            target,
            dirty: false,
        })
    }

    pub fn attribute(&self) -> &AttributeHandle {
        &self.attribute
    }

    pub fn target(&self) -> &AttributeValue {
        &self.target
    }

    /// Changing the target marks the function dirty.
    pub fn set_target(&mut self, target: impl Into<AttributeValue>) -> Result<()> {
        let target = target.into();
        self.attribute.lock().validate(&target)?;
        self.target = target;
        self.dirty = true;
        Ok(())
    }
}

impl Cue for Static {
    fn trigger_at(&mut self, _now: Timestamp) {
        self.dirty = true;
    }

    fn update(&mut self, _now: Timestamp) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.dirty = false;
        self.attribute.set(self.target.clone())
    }

    fn finished(&self) -> bool {
        !self.dirty
    }
}
