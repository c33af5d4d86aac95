use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Context;
use log::{debug, info, warn};

const READ_TIMEOUT: Duration = Duration::from_millis(50);
const MAX_DATAGRAM: usize = 65536;

/// Background UDP reader feeding each datagram to a callback.
///
/// Opened from a desk's open hook and joined from its close hook.
pub struct UdpListener {
    local_addr: SocketAddr,
    quit: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl UdpListener {
    /// Bind `addr` and start reading. The callback returns `false` to stop
    /// the reader early (e.g. when the desk it feeds has gone away).
    pub fn spawn<F>(name: &str, addr: SocketAddr, mut on_datagram: F) -> anyhow::Result<Self>
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        let socket =
            UdpSocket::bind(addr).with_context(|| format!("failed to bind {} to {}", name, addr))?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        let local_addr = socket.local_addr()?;
        info!("{} listening on {}", name, local_addr);

        let quit = Arc::new(AtomicBool::new(false));
        let quit_flag = Arc::clone(&quit);
        let label = name.to_string();
        let handle = thread::Builder::new()
            .name(format!("{}-recv", name))
            .spawn(move || {
                let mut buf = vec![0u8; MAX_DATAGRAM];
                while !quit_flag.load(Ordering::Relaxed) {
                    match socket.recv_from(&mut buf) {
                        Ok((len, from)) => {
                            debug!("{}: {} bytes from {}", label, len, from);
                            if !on_datagram(&buf[..len]) {
                                break;
                            }
                        }
                        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                        Err(e) => {
                            warn!("{}: receive failed: {}", label, e);
                            break;
                        }
                    }
                }
                debug!("{}: receiver stopped", label);
            })
            .with_context(|| format!("failed to spawn {} receiver", name))?;

        Ok(UdpListener {
            local_addr,
            quit,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn close(&mut self) {
        self.quit.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Receiver on {} panicked", self.local_addr);
            }
        }
    }
}

impl Drop for UdpListener {
    fn drop(&mut self) {
        self.close();
    }
}
