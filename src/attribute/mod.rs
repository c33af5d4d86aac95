//! Controllable values on a fixture: bounded numbers, enumerated choices and
//! named composites of both.
//!
//! Attributes are shared between their fixture and any number of
//! time-functions through an [`AttributeHandle`]. The relation back to the
//! owning fixture is a [`FixtureLink`]: a fixture id plus the channel sink the
//! fixture writes into, never the fixture itself.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use indexmap::IndexMap;
use serde::Serialize;

use crate::dmx::ChannelSink;
use crate::error::{Error, Result};
use crate::fixture::FixtureId;

pub mod discrete;
pub mod group;
pub mod range;

pub use self::discrete::{Choice, DiscreteAttribute};
pub use self::group::GroupAttribute;
pub use self::range::RangeAttribute;

/// Where a leaf attribute lands in its fixture's channel map. Offsets are
/// relative to the fixture's start channel.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Patch {
    /// No hardware behind this attribute; writes never leave the engine.
    #[default]
    Virtual,
    /// One 8-bit channel.
    Coarse { channel: u16 },
    /// A 16-bit value split over two channels.
    Fine { msb: u16, lsb: u16 },
}

/// Non-owning back-reference from an attribute to its fixture.
#[derive(Clone)]
pub struct FixtureLink {
    pub id: FixtureId,
    pub channel_start: u16,
    sink: Arc<dyn ChannelSink>,
}

impl FixtureLink {
    pub fn new(id: FixtureId, channel_start: u16, sink: Arc<dyn ChannelSink>) -> Self {
        FixtureLink {
            id,
            channel_start,
            sink,
        }
    }

    pub fn ch_set(&self, offset: u16, value: u8) -> Result<()> {
        self.sink.ch_set(self.channel(offset)?, value)
    }

    /// Resolve `offset` to an absolute channel the sink accepts.
    pub fn channel(&self, offset: u16) -> Result<u16> {
        let channel = self
            .channel_start
            .checked_add(offset)
            .ok_or(Error::ChannelOutOfRange(u16::MAX))?;
        self.sink.check(channel)?;
        Ok(channel)
    }
}

impl Patch {
    /// Fail unless a write through this patch would reach every channel it
    /// covers. Virtual patches are always writable.
    pub fn check(&self, class_id: &str, fixture: Option<&FixtureLink>) -> Result<()> {
        let offsets = match *self {
            Patch::Virtual => return Ok(()),
            Patch::Coarse { channel } => [channel, channel],
            Patch::Fine { msb, lsb } => [msb, lsb],
        };
        let fixture = fixture.ok_or_else(|| Error::Unattached(class_id.into()))?;
        for offset in offsets {
            fixture.channel(offset)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FixtureLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureLink")
            .field("id", &self.id)
            .field("channel_start", &self.channel_start)
            .finish()
    }
}

/// A value as accepted by [`Attribute::set`] and returned by [`Attribute::get`].
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    Unset,
    Number(f64),
    Choice(String),
    Group(IndexMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            AttributeValue::Choice(key) => Some(key),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(key: &str) -> Self {
        AttributeValue::Choice(key.into())
    }
}

impl From<String> for AttributeValue {
    fn from(key: String) -> Self {
        AttributeValue::Choice(key)
    }
}

pub enum Attribute {
    Range(RangeAttribute),
    Discrete(DiscreteAttribute),
    Group(GroupAttribute),
}

impl Attribute {
    pub fn class_id(&self) -> &str {
        match self {
            Attribute::Range(a) => &a.class_id,
            Attribute::Discrete(a) => &a.class_id,
            Attribute::Group(a) => &a.class_id,
        }
    }

    /// Check `value` against this attribute's domain without touching state.
    pub fn validate(&self, value: &AttributeValue) -> Result<()> {
        match (self, value) {
            (Attribute::Range(a), AttributeValue::Number(v)) => a.validate(*v),
            (Attribute::Discrete(a), AttributeValue::Choice(key)) => a.validate(key),
            (Attribute::Group(a), AttributeValue::Group(values)) => a.validate(values),
            (attribute, value) => Err(Error::IncompatibleTarget(format!(
                "{} cannot hold {:?}",
                attribute.class_id(),
                value
            ))),
        }
    }

    pub fn set(&mut self, value: &AttributeValue) -> Result<()> {
        match (self, value) {
            (Attribute::Range(a), AttributeValue::Number(v)) => a.set(*v),
            (Attribute::Discrete(a), AttributeValue::Choice(key)) => a.set(key),
            (Attribute::Group(a), AttributeValue::Group(values)) => a.set(values),
            (attribute, value) => attribute.validate(value),
        }
    }

    /// Fail if a write would not reach the hardware behind this attribute or
    /// any of its descendants.
    pub fn check_writable(&self) -> Result<()> {
        match self {
            Attribute::Range(a) => a.patch.check(&a.class_id, a.fixture()),
            Attribute::Discrete(a) => a.patch.check(&a.class_id, a.fixture()),
            Attribute::Group(a) => a
                .children()
                .values()
                .try_for_each(|child| child.lock().check_writable()),
        }
    }

    pub fn get(&self) -> AttributeValue {
        match self {
            Attribute::Range(a) => AttributeValue::Number(a.get()),
            Attribute::Discrete(a) => match a.get() {
                Some(key) => AttributeValue::Choice(key.into()),
                None => AttributeValue::Unset,
            },
            Attribute::Group(a) => AttributeValue::Group(a.get()),
        }
    }

    /// Bind this attribute (and, for groups, every descendant) to a fixture.
    pub fn attach(&mut self, link: FixtureLink) {
        match self {
            Attribute::Range(a) => a.attach(link),
            Attribute::Discrete(a) => a.attach(link),
            Attribute::Group(a) => a.attach(link),
        }
    }

    pub fn fixture(&self) -> Option<&FixtureLink> {
        match self {
            Attribute::Range(a) => a.fixture(),
            Attribute::Discrete(a) => a.fixture(),
            Attribute::Group(a) => a.fixture(),
        }
    }

    pub fn as_range(&self) -> Option<&RangeAttribute> {
        match self {
            Attribute::Range(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_range_mut(&mut self) -> Option<&mut RangeAttribute> {
        match self {
            Attribute::Range(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_discrete_mut(&mut self) -> Option<&mut DiscreteAttribute> {
        match self {
            Attribute::Discrete(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupAttribute> {
        match self {
            Attribute::Group(a) => Some(a),
            _ => None,
        }
    }

    pub fn describe(&self) -> AttributeDescriptor {
        let kind = match self {
            Attribute::Range(a) => DescriptorKind::Range {
                min: a.min,
                max: a.max,
                unit: a.unit.clone(),
                invert: a.invert,
                patch: a.patch,
                value: a.get(),
            },
            Attribute::Discrete(a) => DescriptorKind::Discrete {
                choices: a.choices().clone(),
                patch: a.patch,
                value: a.get().map(String::from),
            },
            Attribute::Group(a) => DescriptorKind::Group {
                children: a
                    .children()
                    .iter()
                    .map(|(name, child)| (name.clone(), child.describe()))
                    .collect(),
            },
        };
        AttributeDescriptor {
            class_id: self.class_id().into(),
            kind,
        }
    }
}

impl From<RangeAttribute> for Attribute {
    fn from(a: RangeAttribute) -> Self {
        Attribute::Range(a)
    }
}

impl From<DiscreteAttribute> for Attribute {
    fn from(a: DiscreteAttribute) -> Self {
        Attribute::Discrete(a)
    }
}

impl From<GroupAttribute> for Attribute {
    fn from(a: GroupAttribute) -> Self {
        Attribute::Group(a)
    }
}

/// Shared ownership of one attribute between its fixture and the
/// time-functions driving it.
#[derive(Clone)]
pub struct AttributeHandle(Arc<Mutex<Attribute>>);

impl AttributeHandle {
    pub fn new(attribute: impl Into<Attribute>) -> Self {
        AttributeHandle(Arc::new(Mutex::new(attribute.into())))
    }

    pub fn lock(&self) -> MutexGuard<'_, Attribute> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, value: impl Into<AttributeValue>) -> Result<()> {
        self.lock().set(&value.into())
    }

    pub fn get(&self) -> AttributeValue {
        self.lock().get()
    }

    pub fn attach(&self, link: FixtureLink) {
        self.lock().attach(link)
    }

    pub fn is_attached(&self) -> bool {
        self.lock().fixture().is_some()
    }

    pub fn class_id(&self) -> String {
        self.lock().class_id().into()
    }

    pub fn describe(&self) -> AttributeDescriptor {
        self.lock().describe()
    }

    pub fn ptr_eq(&self, other: &AttributeHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AttributeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attribute = self.lock();
        f.debug_struct("AttributeHandle")
            .field("class_id", &attribute.class_id())
            .field("value", &attribute.get())
            .finish()
    }
}

/// External representation of an attribute, tagged by its `class_id`.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    pub class_id: String,
    #[serde(flatten)]
    pub kind: DescriptorKind,
}

#[derive(Serialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DescriptorKind {
    Range {
        min: f64,
        max: f64,
        unit: String,
        invert: bool,
        patch: Patch,
        value: f64,
    },
    Discrete {
        choices: IndexMap<String, Choice>,
        patch: Patch,
        value: Option<String>,
    },
    Group {
        children: IndexMap<String, AttributeDescriptor>,
    },
}
