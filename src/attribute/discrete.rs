use indexmap::IndexMap;
use log::trace;
use serde::Serialize;

use crate::error::{Error, Result};

use super::{FixtureLink, Patch};

/// One named choice of a [`DiscreteAttribute`].
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub label: String,
    /// Raw payload forwarded to the hardware.
    pub value: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Choice {
    pub fn new(label: &str, value: u8) -> Self {
        Choice {
            label: label.into(),
            value,
            image: None,
        }
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Attribute drawn from a fixed set of named choices, keyed by a short id
/// such as `"rgb"` or `"auto1"`.
#[derive(Debug)]
pub struct DiscreteAttribute {
    pub class_id: String,
    pub patch: Patch,
    choices: IndexMap<String, Choice>,
    value: Option<String>,
    fixture: Option<FixtureLink>,
}

impl DiscreteAttribute {
    pub fn new<K: Into<String>>(choices: impl IntoIterator<Item = (K, Choice)>) -> Self {
        DiscreteAttribute {
            class_id: String::from("DiscreteValue"),
            patch: Patch::Virtual,
            choices: choices.into_iter().map(|(k, c)| (k.into(), c)).collect(),
            value: None,
            fixture: None,
        }
    }

    pub fn coarse(mut self, channel: u16) -> Self {
        self.patch = Patch::Coarse { channel };
        self
    }

    pub fn with_class_id(mut self, class_id: &str) -> Self {
        self.class_id = class_id.into();
        self
    }

    pub fn choices(&self) -> &IndexMap<String, Choice> {
        &self.choices
    }

    pub fn validate(&self, key: &str) -> Result<()> {
        if self.choices.contains_key(key) {
            Ok(())
        } else {
            Err(Error::InvalidChoice(key.into()))
        }
    }

    pub fn set(&mut self, key: &str) -> Result<()> {
        self.validate(key)?;
        self.patch.check(&self.class_id, self.fixture.as_ref())?;
        self.on_set(key)?;
        self.value = Some(key.into());
        Ok(())
    }

    pub fn get(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn attach(&mut self, link: FixtureLink) {
        self.fixture = Some(link);
    }

    pub fn fixture(&self) -> Option<&FixtureLink> {
        self.fixture.as_ref()
    }

    fn on_set(&self, key: &str) -> Result<()> {
        let (Some(fixture), Some(choice)) = (&self.fixture, self.choices.get(key)) else {
            return Ok(());
        };
        match self.patch {
            Patch::Virtual => Ok(()),
            Patch::Coarse { channel } => {
                trace!("{} -> ch +{} = {} ({})", self.class_id, channel, choice.value, key);
                fixture.ch_set(channel, choice.value)
            }
            Patch::Fine { msb, lsb } => {
                fixture.ch_set(msb, choice.value)?;
                fixture.ch_set(lsb, 0)
            }
        }
    }
}
