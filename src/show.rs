use std::sync::{mpsc::Receiver, Arc};

use log::{debug, error, info};

use crate::attribute::{AttributeHandle, GroupAttribute, RangeAttribute};
use crate::clock::Timestamp;
use crate::cue::Cue;
use crate::dmx::Universe;
use crate::error::{Error, Result};
use crate::fixture::Fixture;
use crate::function::{Delay, Fade, Static};
use crate::scene::{Scene, SceneChooser, SceneSequence};

/// Requests from desks to the tick loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ShowCommand {
    Choose(String),
    FlashStart(String),
    FlashEnd,
    /// Fade the dimmer to this level (0 to 1) via the "on" scene.
    Dimmer(f64),
    /// Start the colour chase; any `Choose` stops it again.
    Chase,
}

const FADE_TIME: f64 = 1.0;
const CHASE_FADE: f64 = 0.5;
const CHASE_HOLD: f64 = 1.0;

/// Generic RGB par: dimmer on the first channel, then red, green, blue.
pub fn rgb_par(label: &str, channel_start: u16) -> Fixture {
    let color = |ch| RangeAttribute::new(0.0, 255.0).coarse(ch);
    Fixture::new(label, "Generic", "RGB Par", channel_start)
        .with_attribute(
            "dimmer",
            RangeAttribute::new(0.0, 100.0).with_unit("%").coarse(0),
        )
        .with_attribute("color", GroupAttribute::color(color(1), color(2), color(3)))
}

/// The demo show: one fixture on one universe, a scene chooser and a
/// looping colour chase, driven by commands from the desks.
pub struct Show {
    pub fixture: Fixture,
    pub universe: Universe,
    chooser: SceneChooser,
    chase: SceneSequence,
    chase_active: bool,
    commands: Receiver<ShowCommand>,
}

impl Show {
    pub fn demo(channel_start: u16, commands: Receiver<ShowCommand>) -> Result<Self> {
        let fixture = rgb_par("par1", channel_start);
        let universe = Universe::new();
        fixture.attach(Arc::new(universe.clone()));

        let dimmer = lookup(&fixture, "dimmer")?;
        let rgb = [
            lookup(&fixture, "color.r")?,
            lookup(&fixture, "color.g")?,
            lookup(&fixture, "color.b")?,
        ];

        let color_scene = |dimmer: &AttributeHandle, levels: [f64; 3], time: f64| {
            let mut scene = Scene::new([Static::new(dimmer.clone(), 100.0)?.into()])?;
            for (attr, level) in rgb.iter().zip(levels) {
                scene.push(Fade::new(attr.clone(), level, time)?)?;
            }
            Ok::<_, Error>(scene)
        };

        let chooser = SceneChooser::new([
            ("on", Scene::new([Fade::new(dimmer.clone(), 100.0, FADE_TIME)?.into()])?),
            ("off", Scene::new([Fade::new(dimmer.clone(), 0.0, FADE_TIME)?.into()])?),
            ("red", color_scene(&dimmer, [255.0, 0.0, 0.0], FADE_TIME)?),
        ]);

        let mut steps = Vec::new();
        for levels in [[255.0, 0.0, 0.0], [0.0, 255.0, 0.0], [0.0, 0.0, 255.0]] {
            steps.push(color_scene(&dimmer, levels, CHASE_FADE)?);
            steps.push(Scene::new([Delay::new(CHASE_HOLD).into()])?);
        }
        let chase = SceneSequence::of_scenes(steps).looping(true);

        Ok(Show {
            fixture,
            universe,
            chooser,
            chase,
            chase_active: false,
            commands,
        })
    }

    pub fn chooser(&self) -> &SceneChooser {
        &self.chooser
    }

    pub fn chase_active(&self) -> bool {
        self.chase_active
    }

    pub fn handle(&mut self, command: ShowCommand, now: Timestamp) -> Result<()> {
        debug!("Show command {:?}", command);
        match command {
            ShowCommand::Choose(name) => {
                self.chooser.choose_at(&name, now)?;
                self.chase_active = false;
            }
            ShowCommand::FlashStart(name) => self.chooser.flash_start_at(&name, now)?,
            ShowCommand::FlashEnd => self.chooser.flash_end_at(now),
            ShowCommand::Dimmer(level) => {
                let target = level.clamp(0.0, 1.0) * 100.0;
                if let Some(fade) = self
                    .chooser
                    .scene_mut("on")
                    .and_then(|s| s.function_mut(0))
                    .and_then(|f| f.as_fade_mut())
                {
                    fade.set_target(target)?;
                }
                self.chooser.choose_at("on", now)?;
                self.chase_active = false;
            }
            ShowCommand::Chase => {
                info!("Start chase");
                self.chase.trigger_at(now);
                self.chase_active = true;
            }
        }
        Ok(())
    }

    /// Apply pending commands then advance whichever cue is live.
    pub fn tick(&mut self, now: Timestamp) {
        while let Ok(command) = self.commands.try_recv() {
            if let Err(e) = self.handle(command, now) {
                error!("Failed to apply show command: {}", e);
            }
        }
        let live: &mut dyn Cue = if self.chase_active {
            &mut self.chase
        } else {
            &mut self.chooser
        };
        if let Err(e) = live.update(now) {
            error!("Show update failed: {}", e);
        }
    }
}

fn lookup(fixture: &Fixture, path: &str) -> Result<AttributeHandle> {
    fixture
        .attribute(path)
        .ok_or_else(|| Error::NotFound(format!("{}.{}", fixture.label, path)))
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    fn show() -> (Show, mpsc::Sender<ShowCommand>) {
        let (tx, rx) = mpsc::channel();
        (Show::demo(10, rx).unwrap(), tx)
    }

    #[test]
    fn rgb_par_layout() {
        let par = rgb_par("p", 0);
        assert!(par.attribute("dimmer").is_some());
        assert!(par.attribute("color.b").is_some());
        assert!(par.attribute("color.w").is_none());
    }

    #[test]
    fn choose_drives_the_universe() {
        let (mut show, tx) = show();
        tx.send(ShowCommand::Choose("on".into())).unwrap();
        show.tick(0.0);
        assert_eq!(show.universe.get(10), Some(0));
        show.tick(0.5);
        assert_eq!(show.universe.get(10), Some(128));
        show.tick(1.0);
        assert_eq!(show.universe.get(10), Some(255));
    }

    #[test]
    fn dimmer_command_retargets_the_on_scene() {
        let (mut show, tx) = show();
        tx.send(ShowCommand::Dimmer(0.5)).unwrap();
        show.tick(0.0);
        show.tick(1.0);
        assert_eq!(show.chooser().current(), Some("on"));
        assert_eq!(show.universe.get(10), Some(128));
    }

    #[test]
    fn bad_commands_are_logged_not_fatal() {
        let (mut show, tx) = show();
        tx.send(ShowCommand::Choose("strobe".into())).unwrap();
        tx.send(ShowCommand::Choose("red".into())).unwrap();
        show.tick(0.0);
        show.tick(1.0);
        assert_eq!(show.chooser().current(), Some("red"));
        assert_eq!(show.universe.get(11), Some(255));
        assert_eq!(show.universe.get(12), Some(0));
    }

    #[test]
    fn chase_takes_over_until_a_choice() {
        let (mut show, tx) = show();
        tx.send(ShowCommand::Chase).unwrap();
        show.tick(0.0);
        assert!(show.chase_active());
        show.tick(0.5);
        assert_eq!(show.universe.get(11), Some(255));
        tx.send(ShowCommand::Choose("off".into())).unwrap();
        show.tick(0.6);
        assert!(!show.chase_active());
    }
}
