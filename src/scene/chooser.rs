use indexmap::IndexMap;
use log::debug;

use crate::clock::{self, Timestamp};
use crate::cue::Cue;
use crate::error::{Error, Result};

use super::Scene;

/// Picks one live scene by name, with a transient flash override.
#[derive(Default)]
pub struct SceneChooser {
    scenes: IndexMap<String, Scene>,
    current: Option<String>,
    flash: Option<String>,
}

impl SceneChooser {
    pub fn new<K: Into<String>>(scenes: impl IntoIterator<Item = (K, Scene)>) -> Self {
        SceneChooser {
            scenes: scenes.into_iter().map(|(k, s)| (k.into(), s)).collect(),
            current: None,
            flash: None,
        }
    }

    pub fn insert(&mut self, name: &str, scene: Scene) -> Option<Scene> {
        self.scenes.insert(name.into(), scene)
    }

    pub fn scene_names(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }

    pub fn scene_mut(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.get_mut(name)
    }

    pub fn choose(&mut self, name: &str) -> Result<()> {
        self.choose_at(name, clock::now())
    }

    /// Make `name` the persistent selection and trigger it.
    pub fn choose_at(&mut self, name: &str, now: Timestamp) -> Result<()> {
        let scene = self
            .scenes
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(name.into()))?;
        debug!("Choose scene \"{}\"", name);
        scene.trigger_at(now);
        self.current = Some(name.into());
        Ok(())
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn flash_start(&mut self, name: &str) -> Result<()> {
        self.flash_start_at(name, clock::now())
    }

    /// Override the current scene with `name` until [`Self::flash_end`].
    pub fn flash_start_at(&mut self, name: &str, now: Timestamp) -> Result<()> {
        let scene = self
            .scenes
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(name.into()))?;
        debug!("Flash scene \"{}\"", name);
        scene.trigger_at(now);
        self.flash = Some(name.into());
        Ok(())
    }

    pub fn flash_end(&mut self) {
        self.flash_end_at(clock::now())
    }

    /// Drop the flash override and retrigger the current scene so its
    /// interpolation resumes from wherever the flash left the attributes.
    pub fn flash_end_at(&mut self, now: Timestamp) {
        let Some(name) = self.flash.take() else {
            return;
        };
        debug!("End flash \"{}\"", name);
        if let Some(scene) = self.current.as_ref().and_then(|c| self.scenes.get_mut(c)) {
            scene.trigger_at(now);
        }
    }

    pub fn flash_current(&self) -> Option<&str> {
        self.flash.as_deref()
    }

    fn active_name(&self) -> Option<&String> {
        self.flash.as_ref().or(self.current.as_ref())
    }

    fn active_mut(&mut self) -> Option<&mut Scene> {
        let name = self.flash.as_ref().or(self.current.as_ref())?;
        self.scenes.get_mut(name)
    }
}

impl Cue for SceneChooser {
    /// Retrigger whichever scene is live.
    fn trigger_at(&mut self, now: Timestamp) {
        if let Some(scene) = self.active_mut() {
            scene.trigger_at(now);
        }
    }

    fn update(&mut self, now: Timestamp) -> Result<()> {
        match self.active_mut() {
            Some(scene) => scene.update(now),
            None => Ok(()),
        }
    }

    fn finished(&self) -> bool {
        self.active_name()
            .and_then(|name| self.scenes.get(name))
            .map_or(true, Scene::finished)
    }
}
