use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        Arc,
    },
    thread,
    time::Instant,
};

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, trace};

use fixture_show::{
    artnet::{ArtNetInterface, ArtNetMode, ARTNET_PORT},
    clock,
    desk::{ControlDesk, MidiDesk, MidiEvent, OscDesk},
    settings::Cli,
    show::{Show, ShowCommand},
};

const MIDI_CHANNEL: u8 = 0;
const NOTE_OFF_SCENE: u8 = 21;
const NOTE_ON_SCENE: u8 = 22;
const NOTE_FLASH: u8 = 23;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    debug!("Started with settings: {:?}", cli);

    let (show_tx, show_rx) = mpsc::channel();
    let mut show = Show::demo(cli.fixture_channel, show_rx)?;

    if cli.describe {
        println!("{}", serde_json::to_string_pretty(&show.fixture.describe())?);
        return Ok(());
    }

    let mut artnet = if cli.dry_run {
        info!("Dry run; ArtNet output disabled");
        None
    } else if cli.artnet_broadcast {
        Some(ArtNetInterface::new(ArtNetMode::Broadcast)?)
    } else {
        Some(ArtNetInterface::new(ArtNetMode::Unicast(
            SocketAddr::from((cli.unicast_src, ARTNET_PORT - 1)),
            SocketAddr::from((cli.unicast_dst, ARTNET_PORT)),
        ))?)
    };

    let mut osc = ControlDesk::new("osc", osc_desk(&cli, show_tx.clone())?);
    let mut midi = ControlDesk::new("midi", midi_desk(&cli, show_tx)?);
    osc.start()?;
    midi.start()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .context("failed to install Ctrl+C handler")?;

    info!("Running show at {} Hz; Ctrl+C to quit", cli.tick_frequency);
    let interval = cli.tick_interval();
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        show.tick(clock::now());
        match artnet.as_mut() {
            Some(artnet) => {
                if let Err(e) = artnet.update(&show.universe) {
                    error!("Failed to send ArtNet frame: {:#}", e);
                }
            }
            None => trace!("Frame: {:?}", &show.universe.snapshot()[..16]),
        }
        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    info!("Shutting down...");
    osc.stop()?;
    midi.stop()?;
    Ok(())
}

fn forward(tx: &Sender<ShowCommand>, command: ShowCommand) -> anyhow::Result<()> {
    tx.send(command).context("show loop has gone away")
}

fn osc_desk(cli: &Cli, tx: Sender<ShowCommand>) -> anyhow::Result<OscDesk> {
    let mut desk = OscDesk::new(SocketAddr::from((cli.osc_host, cli.osc_port)));

    let t = tx.clone();
    desk.route("/scene", move |ev| {
        let name = ev.string(0).context("/scene expects a scene name")?;
        forward(&t, ShowCommand::Choose(name.into()))
    })?;
    let t = tx.clone();
    desk.route("/flash", move |ev| {
        let name = ev.string(0).context("/flash expects a scene name")?;
        forward(&t, ShowCommand::FlashStart(name.into()))
    })?;
    let t = tx.clone();
    desk.route("/flash/end", move |_| forward(&t, ShowCommand::FlashEnd))?;
    let t = tx.clone();
    desk.route("/dimmer", move |ev| {
        let level = ev.number(0).context("/dimmer expects a level")?;
        forward(&t, ShowCommand::Dimmer(level))
    })?;
    desk.route("/chase", move |_| forward(&tx, ShowCommand::Chase))?;

    Ok(desk)
}

fn midi_desk(cli: &Cli, tx: Sender<ShowCommand>) -> anyhow::Result<MidiDesk> {
    let mut desk = match cli.midi_port {
        Some(port) => MidiDesk::new().with_udp_source(SocketAddr::from(([0, 0, 0, 0], port))),
        None => MidiDesk::new(),
    };

    let t = tx.clone();
    desk.on(MidiEvent::note_on(MIDI_CHANNEL, NOTE_OFF_SCENE, 0), move |_| {
        forward(&t, ShowCommand::Choose("off".into()))
    })?;
    let t = tx.clone();
    desk.on(MidiEvent::note_on(MIDI_CHANNEL, NOTE_ON_SCENE, 0), move |_| {
        forward(&t, ShowCommand::Choose("on".into()))
    })?;
    let t = tx.clone();
    desk.on(MidiEvent::note_on(MIDI_CHANNEL, NOTE_FLASH, 0), move |_| {
        forward(&t, ShowCommand::FlashStart("on".into()))
    })?;
    desk.on(MidiEvent::note_off(MIDI_CHANNEL, NOTE_FLASH), move |_| {
        forward(&tx, ShowCommand::FlashEnd)
    })?;

    Ok(desk)
}
