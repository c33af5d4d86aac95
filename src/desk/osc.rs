use std::net::SocketAddr;

use indexmap::IndexMap;
use log::{debug, warn};
use rosc::{OscPacket, OscType};

use crate::error::DeskError;

use super::listener::UdpListener;
use super::{DeskHooks, EventSender};

/// One decoded OSC message.
#[derive(Debug, Clone, PartialEq)]
pub struct OscEvent {
    pub addr: String,
    pub args: Vec<OscType>,
}

impl OscEvent {
    pub fn new(addr: &str, args: Vec<OscType>) -> Self {
        OscEvent {
            addr: addr.into(),
            args,
        }
    }

    /// Argument `i` as a number, accepting any numeric OSC type.
    pub fn number(&self, i: usize) -> Option<f64> {
        match self.args.get(i)? {
            OscType::Float(v) => Some(*v as f64),
            OscType::Double(v) => Some(*v),
            OscType::Int(v) => Some(*v as f64),
            OscType::Long(v) => Some(*v as f64),
            OscType::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn string(&self, i: usize) -> Option<&str> {
        match self.args.get(i)? {
            OscType::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Decode one datagram, flattening bundles into their messages.
pub fn decode_packet(bytes: &[u8]) -> anyhow::Result<Vec<OscEvent>> {
    let (_, packet) = rosc::decoder::decode_udp(bytes)
        .map_err(|e| anyhow::anyhow!("malformed OSC packet: {:?}", e))?;
    let mut events = Vec::new();
    flatten(packet, &mut events);
    Ok(events)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscEvent>) {
    match packet {
        OscPacket::Message(msg) => out.push(OscEvent {
            addr: msg.addr,
            args: msg.args,
        }),
        OscPacket::Bundle(bundle) => {
            for p in bundle.content {
                flatten(p, out);
            }
        }
    }
}

type Route = Box<dyn FnMut(&OscEvent) -> anyhow::Result<()> + Send>;

/// Desk dispatching OSC messages by address.
///
/// Routes are exact address matches. Messages without a route are logged
/// and ignored.
pub struct OscDesk {
    bind: SocketAddr,
    routes: IndexMap<String, Route>,
    listener: Option<UdpListener>,
}

impl OscDesk {
    pub fn new(bind: SocketAddr) -> Self {
        OscDesk {
            bind,
            routes: IndexMap::new(),
            listener: None,
        }
    }

    pub fn route<F>(&mut self, path: &str, callback: F) -> Result<(), DeskError>
    where
        F: FnMut(&OscEvent) -> anyhow::Result<()> + Send + 'static,
    {
        if self.routes.contains_key(path) {
            return Err(DeskError::DuplicateRoute(path.into()));
        }
        self.routes.insert(path.into(), Box::new(callback));
        Ok(())
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind
    }
}

impl DeskHooks for OscDesk {
    type Event = OscEvent;

    fn on_open(&mut self, events: &EventSender<OscEvent>) -> anyhow::Result<()> {
        let events = events.clone();
        let listener = UdpListener::spawn("osc", self.bind, move |bytes| {
            match decode_packet(bytes) {
                Ok(decoded) => {
                    for ev in decoded {
                        if let Err(e) = events.push(ev) {
                            warn!("Dropping OSC message: {}", e);
                            return events.is_running();
                        }
                    }
                }
                Err(e) => warn!("{}", e),
            }
            true
        })?;
        self.listener = Some(listener);
        Ok(())
    }

    fn on_process(&mut self, event: OscEvent) -> anyhow::Result<()> {
        match self.routes.get_mut(&event.addr) {
            Some(route) => route(&event),
            None => {
                debug!("No OSC route for {}", event.addr);
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
