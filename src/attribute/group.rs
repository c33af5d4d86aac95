use indexmap::IndexMap;

use crate::error::{Error, Result};

use super::{Attribute, AttributeHandle, AttributeValue, FixtureLink, RangeAttribute};

/// Named collection of child attributes, e.g. an RGB colour or a pan/tilt
/// pair. Children are handles so that time-functions can target them
/// individually.
#[derive(Debug)]
pub struct GroupAttribute {
    pub class_id: String,
    children: IndexMap<String, AttributeHandle>,
    fixture: Option<FixtureLink>,
}

impl GroupAttribute {
    pub fn new() -> Self {
        GroupAttribute {
            class_id: String::from("GroupValue"),
            children: IndexMap::new(),
            fixture: None,
        }
    }

    pub fn with_child(mut self, name: &str, child: impl Into<Attribute>) -> Self {
        self.children
            .insert(name.into(), AttributeHandle::new(child));
        self
    }

    pub fn with_class_id(mut self, class_id: &str) -> Self {
        self.class_id = class_id.into();
        self
    }

    /// Three-channel colour.
    pub fn color(r: RangeAttribute, g: RangeAttribute, b: RangeAttribute) -> Self {
        GroupAttribute::new()
            .with_class_id("ColorValue")
            .with_child("r", r)
            .with_child("g", g)
            .with_child("b", b)
    }

    pub fn rotation(pan: RangeAttribute, tilt: RangeAttribute) -> Self {
        GroupAttribute::new()
            .with_class_id("RotationValue")
            .with_child("pan", pan)
            .with_child("tilt", tilt)
    }

    pub fn child(&self, name: &str) -> Option<&AttributeHandle> {
        self.children.get(name)
    }

    pub fn children(&self) -> &IndexMap<String, AttributeHandle> {
        &self.children
    }

    pub fn validate(&self, values: &IndexMap<String, AttributeValue>) -> Result<()> {
        for (name, value) in values {
            let child = self.children.get(name).ok_or_else(|| {
                Error::IncompatibleTarget(format!("{} has no child \"{}\"", self.class_id, name))
            })?;
            child.lock().validate(value)?;
        }
        Ok(())
    }

    /// Set several children at once. Every value is validated, and every
    /// targeted child checked for writability, before any child is written.
    pub fn set(&mut self, values: &IndexMap<String, AttributeValue>) -> Result<()> {
        self.validate(values)?;
        for name in values.keys() {
            if let Some(child) = self.children.get(name) {
                child.lock().check_writable()?;
            }
        }
        for (name, value) in values {
            if let Some(child) = self.children.get(name) {
                child.lock().set(value)?;
            }
        }
        Ok(())
    }

    pub fn get(&self) -> IndexMap<String, AttributeValue> {
        self.children
            .iter()
            .map(|(name, child)| (name.clone(), child.get()))
            .collect()
    }

    /// Shorthand for rotation groups.
    pub fn set_pan_tilt(&mut self, pan: f64, tilt: f64) -> Result<()> {
        let values = IndexMap::from([
            (String::from("pan"), AttributeValue::Number(pan)),
            (String::from("tilt"), AttributeValue::Number(tilt)),
        ]);
        self.set(&values)
    }

    pub fn attach(&mut self, link: FixtureLink) {
        for child in self.children.values() {
            child.attach(link.clone());
        }
        self.fixture = Some(link);
    }

    pub fn fixture(&self) -> Option<&FixtureLink> {
        self.fixture.as_ref()
    }
}

impl Default for GroupAttribute {
    fn default() -> Self {
        Self::new()
    }
}
