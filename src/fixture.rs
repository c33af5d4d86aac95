use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use crate::attribute::{Attribute, AttributeDescriptor, AttributeHandle, FixtureLink};
use crate::dmx::ChannelSink;

static NEXT_FIXTURE_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FixtureId(pub usize);

impl FixtureId {
    fn next() -> Self {
        FixtureId(NEXT_FIXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A fixture instance: owns its attributes and knows where in the universe
/// its channels start.
pub struct Fixture {
    pub id: FixtureId,
    /// The label (should be unique per show) of this fixture instance
    pub label: String,
    pub brand: String,
    pub name: String,
    pub channel_start: u16,
    attributes: IndexMap<String, AttributeHandle>,
}

impl Fixture {
    pub fn new(label: &str, brand: &str, name: &str, channel_start: u16) -> Self {
        Fixture {
            id: FixtureId::next(),
            label: label.into(),
            brand: brand.into(),
            name: name.into(),
            channel_start,
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, attribute: impl Into<Attribute>) -> Self {
        self.attributes
            .insert(name.into(), AttributeHandle::new(attribute));
        self
    }

    /// Link every attribute, recursively through groups, to `sink`.
    pub fn attach(&self, sink: Arc<dyn ChannelSink>) {
        let link = FixtureLink::new(self.id, self.channel_start, sink);
        for (name, attribute) in self.attributes.iter() {
            debug!("Attach {}.{} at channel {}", self.label, name, self.channel_start);
            attribute.attach(link.clone());
        }
    }

    /// Look up an attribute by name, or a group child by dotted path such
    /// as `"color.r"`.
    pub fn attribute(&self, path: &str) -> Option<AttributeHandle> {
        let mut parts = path.split('.');
        let mut current = self.attributes.get(parts.next()?)?.clone();
        for part in parts {
            let child = current.lock().as_group()?.child(part)?.clone();
            current = child;
        }
        Some(current)
    }

    pub fn attributes(&self) -> &IndexMap<String, AttributeHandle> {
        &self.attributes
    }

    pub fn describe(&self) -> FixtureDescriptor {
        FixtureDescriptor {
            label: self.label.clone(),
            brand: self.brand.clone(),
            name: self.name.clone(),
            channel_start: self.channel_start,
            attributes: self
                .attributes
                .iter()
                .map(|(name, a)| (name.clone(), a.describe()))
                .collect(),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FixtureDescriptor {
    pub label: String,
    pub brand: String,
    pub name: String,
    pub channel_start: u16,
    pub attributes: IndexMap<String, AttributeDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{GroupAttribute, RangeAttribute};
    use crate::dmx::Universe;

    fn fixture() -> Fixture {
        Fixture::new("Front wash", "Generic", "Generic RGB DMX fixture", 1)
            .with_attribute(
                "dimmer",
                RangeAttribute::new(0.0, 100.0).with_unit("%").coarse(0),
            )
            .with_attribute(
                "color",
                GroupAttribute::color(
                    RangeAttribute::new(0.0, 1.0).coarse(1),
                    RangeAttribute::new(0.0, 1.0).coarse(2),
                    RangeAttribute::new(0.0, 1.0).coarse(3),
                ),
            )
    }

    #[test]
    fn fixtures_get_distinct_ids() {
        assert_ne!(fixture().id, fixture().id);
    }

    #[test]
    fn dotted_paths_resolve_group_children() {
        let f = fixture();
        assert!(f.attribute("dimmer").is_some());
        assert_eq!(f.attribute("color").unwrap().class_id(), "ColorValue");
        assert!(f.attribute("color.g").is_some());
        assert!(f.attribute("color.w").is_none());
        assert!(f.attribute("dimmer.r").is_none());
        assert!(f.attribute("gobo").is_none());
    }

    #[test]
    fn attach_writes_land_after_channel_start() {
        let universe = Universe::new();
        let f = fixture();
        f.attach(Arc::new(universe.clone()));
        f.attribute("dimmer").unwrap().set(100.0).unwrap();
        f.attribute("color.b").unwrap().set(1.0).unwrap();
        assert_eq!(universe.get(1), Some(255));
        assert_eq!(universe.get(4), Some(255));
    }

    #[test]
    fn describe_serialises_class_ids() {
        let f = fixture();
        let json = serde_json::to_value(f.describe()).unwrap();
        assert_eq!(json["channelStart"], 1);
        assert_eq!(json["attributes"]["dimmer"]["classId"], "RangeValue");
        assert_eq!(json["attributes"]["dimmer"]["unit"], "%");
        assert_eq!(json["attributes"]["color"]["classId"], "ColorValue");
        assert_eq!(
            json["attributes"]["color"]["children"]["r"]["kind"],
            "range"
        );
    }
}
