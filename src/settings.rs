use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;

const UNICAST_SRC: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 102));
const UNICAST_DST: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
const OSC_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

pub const DEFAULT_TICK_HERTZ: u64 = 44;
pub const DEFAULT_OSC_PORT: u16 = 8000;

pub const CHANNELS_PER_UNIVERSE: u16 = 512;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = "Fixture Show runner")]
pub struct Cli {
    #[arg(long = "loglevel",default_value_t=String::from("info"))]
    pub log_level: String,

    /// Show update frequency, in Hertz; one ArtNet frame is sent per tick
    #[arg(long = "tick.freq", default_value_t=DEFAULT_TICK_HERTZ)]
    pub tick_frequency: u64,

    /// Flag to enable ArtNet broadcast mode (good for development)
    #[arg(long = "artnet.broadcast")]
    pub artnet_broadcast: bool,

    /// IP address for ArtNet source interface (ignored if broadcast enabled)
    #[arg(long = "artnet.interface", default_value_t=UNICAST_SRC)]
    pub unicast_src: IpAddr,

    /// IP address for ArtNet destination node (ignored if broadcast enabled)
    #[arg(long = "artnet.destination", default_value_t=UNICAST_DST)]
    pub unicast_dst: IpAddr,

    /// Interface the OSC desk listens on
    #[arg(long = "osc.host", default_value_t=OSC_HOST)]
    pub osc_host: IpAddr,

    #[arg(long = "osc.port", default_value_t=DEFAULT_OSC_PORT)]
    pub osc_port: u16,

    /// UDP port receiving raw MIDI messages, one per datagram
    #[arg(long = "midi.port")]
    pub midi_port: Option<u16>,

    /// DMX start channel of the demo fixture (zero-based)
    #[arg(long = "fixture.channel", default_value_t = 0)]
    pub fixture_channel: u16,

    /// Do not send ArtNet; log channel frames instead
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Print the demo fixture as JSON and exit
    #[arg(long = "describe")]
    pub describe: bool,
}

impl Cli {
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / self.tick_frequency.max(1))
    }
}
