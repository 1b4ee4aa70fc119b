#![forbid(unsafe_code)]

//! Client synchronization.
//!
//! A client target only shows up when something makes it connect. The
//! synchronizer listens on the configured port while a background thread
//! re-runs the trigger command at a fixed interval, until the first inbound
//! connection arrives. Trigger failures are logged and ignored.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{ProbeError, ProbeResult};

const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// External command that makes the client target connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCommand {
    program: String,
    args: Vec<String>,
}

impl TriggerCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self { program, args: parts.collect() })
    }

    /// Start the command without waiting for it.
    fn fire(&self) {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                debug!(program = %self.program, pid = child.id(), "trigger command started");
                thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => warn!(program = %self.program, error = %e, "trigger command failed"),
        }
    }
}

pub struct ClientSynchronizer {
    addr: SocketAddr,
    trigger: Option<TriggerCommand>,
    interval: Duration,
    timeout: Duration,
}

impl ClientSynchronizer {
    pub fn new(addr: SocketAddr, trigger: Option<TriggerCommand>, interval: Duration, timeout: Duration) -> Self {
        Self { addr, trigger, interval, timeout }
    }

    /// Block until a client connects, returning its address. The listener is
    /// closed again before returning so the driver can bind the same port.
    pub fn wait_for_client(&self) -> ProbeResult<SocketAddr> {
        let listener = TcpListener::bind(self.addr)
            .map_err(|e| ProbeError::Synchronization(format!("cannot listen on {}: {}", self.addr, e)))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| ProbeError::Synchronization(e.to_string()))?;
        info!(addr = %self.addr, "waiting for client target to connect");

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let trigger = self.trigger.clone().map(|command| {
            let interval = self.interval;
            thread::spawn(move || trigger_loop(command, interval, stop_rx))
        });

        let deadline = Instant::now() + self.timeout;
        let result = loop {
            match listener.accept() {
                Ok((_stream, peer)) => break Ok(peer),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        break Err(ProbeError::Synchronization(format!(
                            "no client connected within {:?}",
                            self.timeout
                        )));
                    }
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => break Err(ProbeError::Synchronization(e.to_string())),
            }
        };

        drop(stop_tx);
        if let Some(handle) = trigger {
            let _ = handle.join();
        }
        if let Ok(peer) = &result {
            info!(peer = %peer, "client target connected");
        }
        result
    }
}

fn trigger_loop(command: TriggerCommand, interval: Duration, stop: Receiver<()>) {
    loop {
        command.fire();
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;

    fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn returns_once_a_client_connects() {
        let addr = free_addr();
        let sync = ClientSynchronizer::new(
            addr,
            TriggerCommand::parse("forge-nonexistent-trigger --connect"),
            Duration::from_millis(10),
            Duration::from_secs(5),
        );
        let client = thread::spawn(move || {
            for _ in 0..100 {
                if TcpStream::connect(addr).is_ok() {
                    return;
                }
                thread::sleep(Duration::from_millis(20));
            }
        });
        let peer = sync.wait_for_client().unwrap();
        assert!(peer.ip().is_loopback());
        client.join().unwrap();
    }

    #[test]
    fn gives_up_after_timeout() {
        let sync = ClientSynchronizer::new(free_addr(), None, Duration::from_millis(10), Duration::from_millis(60));
        assert!(matches!(sync.wait_for_client(), Err(ProbeError::Synchronization(_))));
    }

    #[test]
    fn parses_trigger() {
        assert_eq!(TriggerCommand::parse("curl -s http://x").unwrap().args, vec!["-s", "http://x"]);
        assert!(TriggerCommand::parse("").is_none());
    }
}
