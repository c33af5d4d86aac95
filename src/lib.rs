//! Lighting-fixture show engine: attributes bound to DMX channels, driven by
//! time-functions grouped into scenes, switched from control desks.

pub mod artnet;
pub mod attribute;
pub mod clock;
pub mod cue;
pub mod desk;
pub mod dmx;
pub mod error;
pub mod fixture;
pub mod function;
pub mod scene;
pub mod settings;
pub mod show;

pub use crate::error::{DeskError, Error, Result};
