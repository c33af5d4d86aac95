//! Control desks decouple external event sources from the show.
//!
//! Producers (socket readers, hardware callbacks, other threads) push events
//! into a queue of depth one; a single consumer thread per desk drains it and
//! hands each event to the desk's [`DeskHooks`]. A slow consumer therefore
//! stalls its producers instead of dropping events.
//!
//! Lifecycle: `start` spawns the consumer, which calls `on_open` once, then
//! `on_process` per event until `stop`, then `on_close` once. An error from
//! `on_process` is logged and the loop carries on; only cancellation (or a
//! panicking hook) ends it. Cancellation is observed while waiting for the
//! next event, never mid-hook; events still queued at that point are dropped.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle, ThreadId},
    time::Duration,
};

use crossbeam_channel::{
    bounded, select, Receiver, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use log::{debug, error, info, warn};

use crate::error::DeskError;

pub mod listener;
pub mod midi;
pub mod osc;

pub use self::midi::{MidiDesk, MidiEvent, MidiFeed, MidiKind};
pub use self::osc::{OscDesk, OscEvent};

/// Depth of the hand-off queue between producers and the consumer.
pub const QUEUE_DEPTH: usize = 1;

/// How often a blocked producer re-checks that the desk is still running.
const PUSH_POLL: Duration = Duration::from_millis(50);

/// Behaviour of a concrete desk, run on the desk's own consumer thread.
pub trait DeskHooks: Send + 'static {
    type Event: Send + 'static;

    /// Called once when the consumer starts. `events` can be cloned into
    /// producer threads opened here.
    fn on_open(&mut self, _events: &EventSender<Self::Event>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_process(&mut self, event: Self::Event) -> anyhow::Result<()>;

    /// Called once when the consumer ends, whatever the reason.
    fn on_close(&mut self) {}
}

struct Shared {
    running: AtomicBool,
    consumer: Mutex<Option<ThreadId>>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn is_consumer_thread(&self) -> bool {
        let consumer = self.consumer.lock().unwrap_or_else(PoisonError::into_inner);
        *consumer == Some(thread::current().id())
    }

    fn set_consumer(&self, id: Option<ThreadId>) {
        *self.consumer.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }
}

/// Cloneable, thread-safe entry point into a desk's queue.
pub struct EventSender<E> {
    tx: Sender<E>,
    shared: Arc<Shared>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        EventSender {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Send> EventSender<E> {
    /// Block until the queue accepts `event`. From the desk's own consumer
    /// thread this falls back to [`Self::try_push`], since blocking there
    /// could never be released.
    pub fn push(&self, event: E) -> Result<(), DeskError> {
        if self.shared.is_consumer_thread() {
            return self.try_push(event);
        }
        let mut event = event;
        loop {
            if !self.shared.is_running() {
                return Err(DeskError::NotRunning);
            }
            match self.tx.send_timeout(event, PUSH_POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(e)) => event = e,
                Err(SendTimeoutError::Disconnected(_)) => return Err(DeskError::Disconnected),
            }
        }
    }

    /// Enqueue without blocking; fails with `Busy` if the slot is taken.
    pub fn try_push(&self, event: E) -> Result<(), DeskError> {
        if !self.shared.is_running() {
            return Err(DeskError::NotRunning);
        }
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DeskError::Busy,
            TrySendError::Disconnected(_) => DeskError::Disconnected,
        })
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}

pub struct ControlDesk<H: DeskHooks> {
    name: String,
    hooks: Option<H>,
    sender: EventSender<H::Event>,
    events: Receiver<H::Event>,
    cancel: Option<Sender<()>>,
    task: Option<JoinHandle<H>>,
}

impl<H: DeskHooks> ControlDesk<H> {
    pub fn new(name: &str, hooks: H) -> Self {
        let (tx, events) = bounded(QUEUE_DEPTH);
        ControlDesk {
            name: name.into(),
            hooks: Some(hooks),
            sender: EventSender {
                tx,
                shared: Arc::new(Shared {
                    running: AtomicBool::new(false),
                    consumer: Mutex::new(None),
                }),
            },
            events,
            cancel: None,
            task: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A producer handle; valid across restarts of this desk.
    pub fn sender(&self) -> EventSender<H::Event> {
        self.sender.clone()
    }

    pub fn push(&self, event: H::Event) -> Result<(), DeskError> {
        self.sender.push(event)
    }

    pub fn try_push(&self, event: H::Event) -> Result<(), DeskError> {
        self.sender.try_push(event)
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// The hooks, while the desk is stopped.
    pub fn hooks(&self) -> Option<&H> {
        self.hooks.as_ref()
    }

    pub fn hooks_mut(&mut self) -> Option<&mut H> {
        self.hooks.as_mut()
    }

    /// Spawn the consumer thread.
    pub fn start(&mut self) -> Result<(), DeskError> {
        if self.task.is_some() {
            return Err(DeskError::AlreadyRunning);
        }
        let hooks = self.hooks.take().ok_or(DeskError::HooksLost)?;
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let events = self.events.clone();
        let sender = self.sender.clone();
        let name = self.name.clone();

        self.sender.shared.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name(format!("desk-{}", self.name))
            .spawn(move || consume(name, hooks, events, cancel_rx, sender));

        match spawned {
            Ok(task) => {
                self.task = Some(task);
                self.cancel = Some(cancel_tx);
                Ok(())
            }
            Err(e) => {
                self.sender.shared.running.store(false, Ordering::Release);
                Err(DeskError::Spawn(e.to_string()))
            }
        }
    }

    /// Cancel the consumer and wait for its close hook to run. A hook that
    /// is mid-event finishes that event first.
    pub fn stop(&mut self) -> Result<(), DeskError> {
        let task = self.task.take().ok_or(DeskError::NotRunning)?;
        // Dropping the sender disconnects the cancel channel. Producers see
        // the desk stop only once cancellation is visible to the consumer.
        drop(self.cancel.take());
        self.sender.shared.running.store(false, Ordering::Release);

        if task.thread().id() == thread::current().id() {
            warn!("Desk {}: stopped from its own task; hooks are released on exit", self.name);
            return Ok(());
        }
        match task.join() {
            Ok(hooks) => self.hooks = Some(hooks),
            Err(_) => error!("Desk {}: task panicked; hooks lost", self.name),
        }

        let mut dropped = 0;
        while self.events.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Desk {}: dropped {} pending event(s)", self.name, dropped);
        }
        Ok(())
    }
}

impl<H: DeskHooks> Drop for ControlDesk<H> {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.stop();
        }
    }
}

fn cancelled(cancel: &Receiver<()>) -> bool {
    matches!(cancel.try_recv(), Err(TryRecvError::Disconnected))
}

fn consume<H: DeskHooks>(
    name: String,
    mut hooks: H,
    events: Receiver<H::Event>,
    cancel: Receiver<()>,
    sender: EventSender<H::Event>,
) -> H {
    sender.shared.set_consumer(Some(thread::current().id()));
    info!("Desk {}: open", name);

    match hooks.on_open(&sender) {
        Ok(()) => loop {
            let event = select! {
                recv(cancel) -> _ => break,
                recv(events) -> event => match event {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };
            if cancelled(&cancel) {
                debug!("Desk {}: cancelled; abandoning dequeued event", name);
                break;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| hooks.on_process(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Desk {}: failed to process event: {:#}", name, e),
                Err(_) => {
                    error!("Desk {}: process hook panicked; closing", name);
                    break;
                }
            }
        },
        Err(e) => error!("Desk {}: failed to open: {:#}", name, e),
    }

    sender.shared.running.store(false, Ordering::Release);
    hooks.on_close();
    sender.shared.set_consumer(None);
    info!("Desk {}: closed", name);
    hooks
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use anyhow::bail;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Seen {
        Open,
        Event(u32),
        Close,
    }

    /// Records everything it sees; events above 100 fail.
    struct Recorder {
        log: mpsc::Sender<Seen>,
        fail_open: bool,
    }

    impl DeskHooks for Recorder {
        type Event = u32;

        fn on_open(&mut self, _events: &EventSender<u32>) -> anyhow::Result<()> {
            self.log.send(Seen::Open)?;
            if self.fail_open {
                bail!("refusing to open");
            }
            Ok(())
        }

        fn on_process(&mut self, event: u32) -> anyhow::Result<()> {
            if event > 100 {
                bail!("malformed event {}", event);
            }
            if event == 99 {
                panic!("hook bug");
            }
            self.log.send(Seen::Event(event))?;
            Ok(())
        }

        fn on_close(&mut self) {
            let _ = self.log.send(Seen::Close);
        }
    }

    fn desk(fail_open: bool) -> (ControlDesk<Recorder>, mpsc::Receiver<Seen>) {
        let (log, seen) = mpsc::channel();
        (ControlDesk::new("test", Recorder { log, fail_open }), seen)
    }

    fn next(seen: &mpsc::Receiver<Seen>) -> Seen {
        seen.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    /// Reports each event as it starts, then holds it until released.
    struct Gated {
        log: mpsc::Sender<Seen>,
        started: mpsc::Sender<u32>,
        release: mpsc::Receiver<()>,
    }

    impl DeskHooks for Gated {
        type Event = u32;

        fn on_open(&mut self, _events: &EventSender<u32>) -> anyhow::Result<()> {
            self.log.send(Seen::Open)?;
            Ok(())
        }

        fn on_process(&mut self, event: u32) -> anyhow::Result<()> {
            self.started.send(event)?;
            self.release.recv()?;
            self.log.send(Seen::Event(event))?;
            Ok(())
        }

        fn on_close(&mut self) {
            let _ = self.log.send(Seen::Close);
        }
    }

    struct Gate {
        seen: mpsc::Receiver<Seen>,
        started: mpsc::Receiver<u32>,
        release: mpsc::Sender<()>,
    }

    fn gated() -> (ControlDesk<Gated>, Gate) {
        let (log, seen) = mpsc::channel();
        let (started_tx, started) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        let hooks = Gated {
            log,
            started: started_tx,
            release: release_rx,
        };
        (
            ControlDesk::new("gated", hooks),
            Gate {
                seen,
                started,
                release,
            },
        )
    }

    /// Panics outside the per-event guard, taking its thread down.
    struct Fragile;

    impl DeskHooks for Fragile {
        type Event = ();

        fn on_open(&mut self, _events: &EventSender<()>) -> anyhow::Result<()> {
            panic!("open bug");
        }

        fn on_process(&mut self, _event: ()) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn push_before_start_is_rejected() {
        let (desk, _seen) = desk(false);
        assert_eq!(desk.push(1), Err(DeskError::NotRunning));
        assert_eq!(desk.try_push(1), Err(DeskError::NotRunning));
    }

    #[test]
    fn lifecycle_calls_each_hook_once() {
        let (mut desk, seen) = desk(false);
        desk.start().unwrap();
        assert!(desk.is_running());
        assert_eq!(desk.start(), Err(DeskError::AlreadyRunning));

        desk.push(1).unwrap();
        desk.push(2).unwrap();
        assert_eq!(next(&seen), Seen::Open);
        assert_eq!(next(&seen), Seen::Event(1));
        assert_eq!(next(&seen), Seen::Event(2));

        desk.stop().unwrap();
        assert_eq!(next(&seen), Seen::Close);
        assert!(!desk.is_running());
        assert!(desk.hooks().is_some());
        assert_eq!(desk.stop(), Err(DeskError::NotRunning));
        assert_eq!(desk.push(3), Err(DeskError::NotRunning));
    }

    #[test]
    fn failing_event_does_not_kill_the_desk() {
        let (mut desk, seen) = desk(false);
        desk.start().unwrap();
        desk.push(500).unwrap();
        desk.push(7).unwrap();
        assert_eq!(next(&seen), Seen::Open);
        assert_eq!(next(&seen), Seen::Event(7));
        desk.stop().unwrap();
        assert_eq!(next(&seen), Seen::Close);
    }

    #[test]
    fn producers_on_other_threads_are_serialised() {
        let (mut desk, seen) = desk(false);
        desk.start().unwrap();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let sender = desk.sender();
                thread::spawn(move || {
                    for i in 0..10 {
                        sender.push(p * 10 + i).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        assert_eq!(next(&seen), Seen::Open);
        let mut events: Vec<u32> = (0..40)
            .map(|_| match next(&seen) {
                Seen::Event(e) => e,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        events.sort();
        assert_eq!(events, (0..40).collect::<Vec<_>>());
        desk.stop().unwrap();
    }

    #[test]
    fn failed_open_still_closes() {
        let (mut desk, seen) = desk(true);
        desk.start().unwrap();
        assert_eq!(next(&seen), Seen::Open);
        assert_eq!(next(&seen), Seen::Close);
        desk.stop().unwrap();
    }

    #[test]
    fn panicking_hook_closes_once() {
        let (mut desk, seen) = desk(false);
        desk.start().unwrap();
        desk.push(99).unwrap();
        assert_eq!(next(&seen), Seen::Open);
        assert_eq!(next(&seen), Seen::Close);
        desk.stop().unwrap();
        assert!(seen.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn desk_can_be_restarted() {
        let (mut desk, seen) = desk(false);
        desk.start().unwrap();
        desk.stop().unwrap();
        desk.start().unwrap();
        desk.push(5).unwrap();
        assert_eq!(next(&seen), Seen::Open);
        assert_eq!(next(&seen), Seen::Close);
        assert_eq!(next(&seen), Seen::Open);
        assert_eq!(next(&seen), Seen::Event(5));
        drop(desk);
        assert_eq!(next(&seen), Seen::Close);
    }

    #[test]
    fn stop_mid_hook_finishes_the_event_and_drops_the_queue() {
        let (mut desk, gate) = gated();
        desk.start().unwrap();
        desk.push(1).unwrap();
        assert_eq!(gate.started.recv_timeout(Duration::from_secs(5)), Ok(1));
        desk.push(2).unwrap();

        let sender = desk.sender();
        let release = gate.release.clone();
        let releaser = thread::spawn(move || {
            while sender.is_running() {
                thread::sleep(Duration::from_millis(5));
            }
            release.send(()).unwrap();
        });
        desk.stop().unwrap();
        releaser.join().unwrap();

        assert_eq!(next(&gate.seen), Seen::Open);
        assert_eq!(next(&gate.seen), Seen::Event(1));
        assert_eq!(next(&gate.seen), Seen::Close);
        assert!(gate.seen.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(gate.started.try_recv().is_err());
        assert!(desk.hooks().is_some());
    }

    #[test]
    fn push_blocks_while_the_slot_is_taken() {
        let (mut desk, gate) = gated();
        desk.start().unwrap();
        desk.push(1).unwrap();
        assert_eq!(gate.started.recv_timeout(Duration::from_secs(5)), Ok(1));
        desk.push(2).unwrap();
        assert_eq!(desk.try_push(9), Err(DeskError::Busy));

        let sender = desk.sender();
        let (done_tx, done) = mpsc::channel();
        let producer = thread::spawn(move || {
            let pushed = sender.push(3);
            let _ = done_tx.send(());
            pushed
        });
        assert!(done.recv_timeout(Duration::from_millis(200)).is_err());

        gate.release.send(()).unwrap();
        assert!(done.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(producer.join().unwrap(), Ok(()));
        gate.release.send(()).unwrap();
        gate.release.send(()).unwrap();

        assert_eq!(next(&gate.seen), Seen::Open);
        assert_eq!(next(&gate.seen), Seen::Event(1));
        assert_eq!(next(&gate.seen), Seen::Event(2));
        assert_eq!(next(&gate.seen), Seen::Event(3));
        desk.stop().unwrap();
        assert_eq!(next(&gate.seen), Seen::Close);
    }

    #[test]
    fn restart_after_lost_hooks_is_reported() {
        let mut desk = ControlDesk::new("fragile", Fragile);
        desk.start().unwrap();
        assert_eq!(desk.stop(), Ok(()));
        assert!(desk.hooks().is_none());
        assert_eq!(desk.start(), Err(DeskError::HooksLost));
        assert!(!desk.is_running());
    }
}
