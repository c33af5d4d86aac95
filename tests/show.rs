use std::{
    net::{SocketAddr, UdpSocket},
    sync::{mpsc, Arc},
    thread,
    time::{Duration, Instant},
};

use float_cmp::approx_eq;
use rosc::{OscMessage, OscPacket, OscType};

use fixture_show::{
    attribute::{AttributeValue, Choice, DiscreteAttribute, RangeAttribute},
    cue::Cue,
    desk::{ControlDesk, MidiDesk, MidiEvent, MidiFeed, OscDesk},
    dmx::Universe,
    fixture::Fixture,
    function::{Animation, Fade, Periodic, Source, Static, Waveform},
    scene::{Scene, SceneChooser, SceneSequence},
    show::{Show, ShowCommand},
};

/// Tick `show` at `now` until `done` holds or five seconds pass.
fn tick_until(show: &mut Show, now: f64, done: impl Fn(&Show) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        show.tick(now);
        if done(show) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn free_udp_addr() -> SocketAddr {
    let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap()
}

#[test]
fn moving_head_runs_a_scripted_show() {
    let universe = Universe::new();
    let head = Fixture::new("spot1", "Acme", "Spot 250", 100)
        .with_attribute("dimmer", RangeAttribute::new(0.0, 1.0).coarse(0))
        .with_attribute(
            "gobo",
            DiscreteAttribute::new([
                ("open", Choice::new("Open", 0)),
                ("star", Choice::new("Star", 40)),
            ])
            .coarse(1),
        )
        .with_attribute("pan", RangeAttribute::new(0.0, 540.0).fine(2, 3));
    head.attach(Arc::new(universe.clone()));

    let dimmer = head.attribute("dimmer").unwrap();
    let gobo = head.attribute("gobo").unwrap();
    let pan = head.attribute("pan").unwrap();

    let intro = Scene::new([
        Fade::new(dimmer.clone(), 1.0, 2.0).unwrap().into(),
        Static::new(gobo.clone(), "star").unwrap().into(),
    ])
    .unwrap();
    let sweep = Scene::new([Animation::new(pan.clone(), Waveform::Sawtooth, 4.0)
        .unwrap()
        .into()])
    .unwrap();
    let mut seq = SceneSequence::of_scenes([intro, sweep]);

    seq.trigger_at(0.0);
    seq.update(0.0).unwrap();
    assert_eq!(universe.get(101), Some(40));
    seq.update(1.0).unwrap();
    assert!(approx_eq!(f64, dimmer.get().as_number().unwrap(), 0.5, ulps = 2));
    assert_eq!(universe.get(100), Some(128));
    seq.update(2.0).unwrap();
    assert_eq!(universe.get(100), Some(255));
    assert_eq!(seq.index(), Some(1));

    // Sawtooth over a 4 s period, three quarters into the cycle.
    seq.update(3.0).unwrap();
    let p = pan.get().as_number().unwrap();
    assert!(approx_eq!(f64, p, 405.0, epsilon = 1e-9));
    let fine = ((universe.get(102).unwrap() as u32) << 8) | universe.get(103).unwrap() as u32;
    assert_eq!(fine, (0.75f64 * 65535.0).round() as u32);
}

#[test]
fn chooser_and_periodic_strobe_share_a_fixture() {
    let universe = Universe::new();
    let par = fixture_show::show::rgb_par("par", 0);
    par.attach(Arc::new(universe.clone()));
    let dimmer = par.attribute("dimmer").unwrap();
    let red = par.attribute("color.r").unwrap();

    let strobe = Scene::new([Periodic::new(dimmer.clone(), 0.1, Source::Toggle)
        .unwrap()
        .with_last_execution(0.0)
        .into()])
    .unwrap();
    let wash = Scene::new([
        Static::new(dimmer.clone(), 100.0).unwrap().into(),
        Fade::new(red.clone(), 255.0, 1.0).unwrap().into(),
    ])
    .unwrap();
    let mut chooser = SceneChooser::new([("wash", wash), ("strobe", strobe)]);

    chooser.choose_at("wash", 0.0).unwrap();
    chooser.update(0.5).unwrap();
    assert_eq!(universe.get(0), Some(255));
    assert_eq!(universe.get(1), Some(128));

    // A triggered strobe fires at once, then every 100 ms.
    chooser.flash_start_at("strobe", 0.5).unwrap();
    chooser.update(0.55).unwrap();
    assert_eq!(dimmer.get(), AttributeValue::Number(0.0));
    assert_eq!(universe.get(0), Some(0));
    chooser.update(0.6).unwrap();
    assert_eq!(dimmer.get(), AttributeValue::Number(0.0));
    chooser.update(0.7).unwrap();
    assert_eq!(dimmer.get(), AttributeValue::Number(100.0));

    chooser.flash_end_at(1.0);
    chooser.update(1.0).unwrap();
    assert_eq!(dimmer.get(), AttributeValue::Number(100.0));
    // The red fade restarts from where it was left, over its full duration.
    chooser.update(1.5).unwrap();
    assert_eq!(universe.get(1), Some(191));
    chooser.update(2.0).unwrap();
    assert_eq!(universe.get(1), Some(255));
}

#[test]
fn midi_feed_drives_the_demo_show() {
    let (tx, rx) = mpsc::channel();
    let mut show = Show::demo(0, rx).unwrap();

    let mut desk = MidiDesk::new();
    let t = tx.clone();
    desk.on(MidiEvent::note_on(0, 22, 0), move |_| {
        Ok(t.send(ShowCommand::Choose("on".into()))?)
    })
    .unwrap();
    desk.on(MidiEvent::note_on(0, 23, 0), move |_| {
        Ok(tx.send(ShowCommand::FlashStart("red".into()))?)
    })
    .unwrap();
    let mut desk = ControlDesk::new("midi", desk);
    desk.start().unwrap();
    let feed = MidiFeed::new(desk.sender());

    feed.feed(&[0x90, 22, 100]).unwrap();
    assert!(tick_until(&mut show, 0.0, |s| s.chooser().current() == Some("on")));
    show.tick(1.0);
    assert_eq!(show.universe.get(0), Some(255));

    // Unparseable bytes are dropped by the feed; the desk keeps going.
    feed.feed(&[0x12]).unwrap();
    feed.feed(&[0x90, 23, 0]).unwrap();
    feed.feed(&[0x90, 23, 64]).unwrap();
    assert!(tick_until(&mut show, 1.0, |s| s.chooser().flash_current() == Some("red")));

    desk.stop().unwrap();
    assert!(feed.feed(&[0x90, 22, 100]).is_err());
}

#[test]
fn osc_over_udp_reaches_the_show() {
    let (tx, rx) = mpsc::channel();
    let mut show = Show::demo(0, rx).unwrap();

    let addr = free_udp_addr();
    let mut desk = OscDesk::new(addr);
    desk.route("/scene", move |ev| {
        let name = ev.string(0).unwrap_or_default().to_string();
        Ok(tx.send(ShowCommand::Choose(name))?)
    })
    .unwrap();
    let mut desk = ControlDesk::new("osc", desk);
    desk.start().unwrap();

    let packet = OscPacket::Message(OscMessage {
        addr: "/scene".into(),
        args: vec![OscType::String("red".into())],
    });
    let bytes = rosc::encoder::encode(&packet).unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();

    // The listener opens asynchronously; resend until the show reacts.
    let deadline = Instant::now() + Duration::from_secs(5);
    while show.chooser().current() != Some("red") && Instant::now() < deadline {
        let _ = client.send_to(&bytes, addr);
        thread::sleep(Duration::from_millis(20));
        show.tick(0.0);
    }
    assert_eq!(show.chooser().current(), Some("red"));

    desk.stop().unwrap();
    assert!(desk.hooks().is_some());
}
