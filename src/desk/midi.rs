use std::{collections::HashMap, fmt, net::SocketAddr};

use anyhow::anyhow;
use log::{debug, warn};
use midly::{live::LiveEvent, MidiMessage};

use crate::error::DeskError;

use super::listener::UdpListener;
use super::{DeskHooks, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiKind {
    NoteOff,
    NoteOn,
    Aftertouch,
    ControlChange,
    ProgramChange,
    ChannelAftertouch,
    PitchBend,
}

/// A channel voice message reduced to what a lighting desk cares about.
///
/// `data1` is the note, controller, program or pressure (zero for pitch
/// bend); `data2` the velocity or value, or the 14-bit bend amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub channel: u8,
    pub kind: MidiKind,
    pub data1: u8,
    pub data2: u16,
}

impl MidiEvent {
    pub fn new(channel: u8, kind: MidiKind, data1: u8, data2: u16) -> Self {
        MidiEvent {
            channel,
            kind,
            data1,
            data2,
        }
    }

    pub fn note_on(channel: u8, key: u8, vel: u8) -> Self {
        MidiEvent::new(channel, MidiKind::NoteOn, key, vel.into())
    }

    pub fn note_off(channel: u8, key: u8) -> Self {
        MidiEvent::new(channel, MidiKind::NoteOff, key, 0)
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        MidiEvent::new(channel, MidiKind::ControlChange, controller, value.into())
    }

    /// Key the desk's handler table is indexed by.
    pub fn filter_key(&self) -> (u8, MidiKind, u8) {
        (self.channel, self.kind, self.data1)
    }

    /// `data2` normalised to `[0, 1]`.
    pub fn unit_value(&self) -> f64 {
        match self.kind {
            MidiKind::PitchBend => self.data2 as f64 / 16383.0,
            _ => self.data2 as f64 / 127.0,
        }
    }

    /// Parse raw bytes. Note-on with zero velocity is reported as note-off.
    pub fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        let event =
            LiveEvent::parse(bytes).map_err(|e| anyhow!("malformed MIDI message: {}", e))?;
        let (channel, message) = match event {
            LiveEvent::Midi { channel, message } => (channel, message),
            other => return Err(anyhow!("unsupported MIDI message {:?}", other)),
        };
        let (kind, data1, data2) = match message {
            MidiMessage::NoteOff { key, .. } => (MidiKind::NoteOff, key.as_int(), 0),
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
                (MidiKind::NoteOff, key.as_int(), 0)
            }
            MidiMessage::NoteOn { key, vel } => {
                (MidiKind::NoteOn, key.as_int(), vel.as_int().into())
            }
            MidiMessage::Aftertouch { key, vel } => {
                (MidiKind::Aftertouch, key.as_int(), vel.as_int().into())
            }
            MidiMessage::Controller { controller, value } => (
                MidiKind::ControlChange,
                controller.as_int(),
                value.as_int().into(),
            ),
            MidiMessage::ProgramChange { program } => {
                (MidiKind::ProgramChange, program.as_int(), 0)
            }
            MidiMessage::ChannelAftertouch { vel } => {
                (MidiKind::ChannelAftertouch, vel.as_int(), 0)
            }
            MidiMessage::PitchBend { bend } => (MidiKind::PitchBend, 0, bend.0.as_int()),
        };
        Ok(MidiEvent::new(channel.as_int(), kind, data1, data2))
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} ch{} {} {}",
            self.kind, self.channel, self.data1, self.data2
        )
    }
}

/// Producer handle turning raw MIDI bytes into desk events.
///
/// Hand this to whatever delivers MIDI (a port callback, a file reader);
/// bytes that do not parse are logged and skipped.
#[derive(Clone)]
pub struct MidiFeed {
    events: EventSender<MidiEvent>,
}

impl MidiFeed {
    pub fn new(events: EventSender<MidiEvent>) -> Self {
        MidiFeed { events }
    }

    pub fn feed(&self, bytes: &[u8]) -> Result<(), DeskError> {
        match MidiEvent::decode(bytes) {
            Ok(event) => self.events.push(event),
            Err(e) => {
                warn!("{:#}", e);
                Ok(())
            }
        }
    }
}

type Handler = Box<dyn FnMut(&MidiEvent) -> anyhow::Result<()> + Send>;

/// Desk dispatching MIDI channel messages to handlers keyed by
/// channel, kind and first data byte.
///
/// With a UDP source configured, every datagram received there is
/// treated as one raw MIDI message.
pub struct MidiDesk {
    handlers: HashMap<(u8, MidiKind, u8), Handler>,
    source: Option<SocketAddr>,
    listener: Option<UdpListener>,
}

impl Default for MidiDesk {
    fn default() -> Self {
        MidiDesk::new()
    }
}

impl MidiDesk {
    pub fn new() -> Self {
        MidiDesk {
            handlers: HashMap::new(),
            source: None,
            listener: None,
        }
    }

    pub fn with_udp_source(mut self, addr: SocketAddr) -> Self {
        self.source = Some(addr);
        self
    }

    /// Register `handler` for events matching `template`'s filter key.
    pub fn on<F>(&mut self, template: MidiEvent, handler: F) -> Result<(), DeskError>
    where
        F: FnMut(&MidiEvent) -> anyhow::Result<()> + Send + 'static,
    {
        let key = template.filter_key();
        if self.handlers.contains_key(&key) {
            return Err(DeskError::DuplicateRoute(template.to_string()));
        }
        self.handlers.insert(key, Box::new(handler));
        Ok(())
    }
}

impl DeskHooks for MidiDesk {
    type Event = MidiEvent;

    fn on_open(&mut self, events: &EventSender<MidiEvent>) -> anyhow::Result<()> {
        let Some(addr) = self.source else {
            return Ok(());
        };
        let feed = MidiFeed::new(events.clone());
        let listener = UdpListener::spawn("midi", addr, move |bytes| {
            match feed.feed(bytes) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Dropping MIDI message: {}", e);
                    feed.events.is_running()
                }
            }
        })?;
        self.listener = Some(listener);
        Ok(())
    }

    fn on_process(&mut self, event: MidiEvent) -> anyhow::Result<()> {
        match self.handlers.get_mut(&event.filter_key()) {
            Some(handler) => handler(&event),
            None => {
                debug!("Unhandled MIDI event {}", event);
                Ok(())
            }
        }
    }

    fn on_close(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.close();
        }
    }
}
