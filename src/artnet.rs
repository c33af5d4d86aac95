use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use anyhow::{anyhow, Context};
use artnet_protocol::{ArtCommand, Output};
use log::debug;

use crate::dmx::Universe;

pub const ARTNET_PORT: u16 = 6454;

pub struct ArtNetInterface {
    socket: UdpSocket,
    destination: SocketAddr,
    port_address: u8,
}

pub enum ArtNetMode {
    Broadcast,
    /// Specify from (interface) + to (destination) addresses
    Unicast(SocketAddr, SocketAddr),
}

impl ArtNetInterface {
    pub fn new(mode: ArtNetMode) -> anyhow::Result<Self> {
        match mode {
            ArtNetMode::Broadcast => {
                let socket = UdpSocket::bind(("0.0.0.0", ARTNET_PORT + 1))
                    .context("failed to bind ArtNet broadcast socket")?;
                let destination = ("255.255.255.255", ARTNET_PORT)
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| anyhow!("no broadcast address"))?;
                socket.set_broadcast(true)?;
                Ok(ArtNetInterface {
                    socket,
                    destination,
                    port_address: 0,
                })
            }
            ArtNetMode::Unicast(src, destination) => {
                let socket = UdpSocket::bind(src)
                    .with_context(|| format!("failed to bind ArtNet socket to {}", src))?;
                socket.set_broadcast(false)?;
                Ok(ArtNetInterface {
                    socket,
                    destination,
                    port_address: 0,
                })
            }
        }
    }

    pub fn with_port_address(mut self, port_address: u8) -> Self {
        self.port_address = port_address;
        self
    }

    /// Send the universe's current state as one ArtDmx frame.
    pub fn update(&mut self, universe: &Universe) -> anyhow::Result<()> {
        let buff = frame(universe, self.port_address)?;
        self.socket.send_to(&buff, self.destination)?;
        Ok(())
    }
}

/// Encode a universe snapshot as an ArtDmx packet.
pub fn frame(universe: &Universe, port_address: u8) -> anyhow::Result<Vec<u8>> {
    let command = ArtCommand::Output(Output {
        port_address: port_address.into(),
        data: universe.snapshot().into(),
        ..Output::default()
    });
    let buff = command
        .write_to_buffer()
        .map_err(|e| anyhow!("failed to encode ArtDmx frame: {:?}", e))?;
    debug!("ArtDmx frame of {} bytes", buff.len());
    Ok(buff)
}
