#![forbid(unsafe_code)]

//! Inactivity watchdog.
//!
//! Every progress event re-arms the timer. When no event arrives within the
//! window the recovery action runs once and the timer is re-armed. Stuck
//! interactions are neither cancelled nor retried.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::pool::Progress;

/// External command run when progress stalls. Its exit status is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryCommand {
    program: String,
    args: Vec<String>,
}

impl RecoveryCommand {
    /// Split `line` on whitespace. `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self { program, args: parts.collect() })
    }

    pub fn run(&self) -> EngineResult<Option<i32>> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|source| EngineError::Recovery { command: self.to_string(), source })?;
        Ok(status.code())
    }
}

impl std::fmt::Display for RecoveryCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Recovery action bound to an optional command.
pub fn recovery_action(command: Option<RecoveryCommand>) -> Box<dyn Fn() + Send> {
    Box::new(move || match &command {
        Some(command) => match command.run() {
            Ok(code) => info!(command = %command, exit_code = ?code, "recovery command finished"),
            Err(e) => error!(error = %e, "recovery command failed"),
        },
        None => warn!("no recovery command configured"),
    })
}

pub struct Watchdog {
    fired: Arc<AtomicUsize>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Start watching `progress`. The watchdog stops when [`Watchdog::stop`]
    /// is called or every progress sender is gone.
    pub fn spawn(window: Duration, progress: Receiver<Progress>, on_idle: Box<dyn Fn() + Send>) -> EngineResult<Self> {
        let fired = Arc::new(AtomicUsize::new(0));
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let counter = Arc::clone(&fired);
        let handle = thread::Builder::new()
            .name("watchdog".into())
            .spawn(move || loop {
                select! {
                    recv(progress) -> event => {
                        if event.is_err() {
                            break;
                        }
                    }
                    recv(stop_rx) -> _ => break,
                    default(window) => {
                        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        warn!(window_secs = window.as_secs_f64(), count, "no progress within idle window");
                        on_idle();
                    }
                }
            })
            .map_err(EngineError::Spawn)?;
        Ok(Self { fired, stop: Some(stop_tx), handle: Some(handle) })
    }

    /// Number of times the recovery action ran.
    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn parses_command_line() {
        let command = RecoveryCommand::parse("  systemctl restart target ").unwrap();
        assert_eq!(command.to_string(), "systemctl restart target");
        assert!(RecoveryCommand::parse("   ").is_none());
    }

    #[test]
    fn fires_once_per_idle_window_and_rearms_on_progress() {
        let (tx, rx) = unbounded();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut watchdog = Watchdog::spawn(
            Duration::from_millis(150),
            rx,
            Box::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        for _ in 0..5 {
            thread::sleep(Duration::from_millis(30));
            tx.send(Progress::InteractionCompleted).unwrap();
        }
        assert_eq!(watchdog.fired(), 0);

        thread::sleep(Duration::from_millis(400));
        watchdog.stop();
        let fired = watchdog.fired();
        assert!((1..=3).contains(&fired), "fired {} times", fired);
        assert_eq!(calls.load(Ordering::SeqCst), fired);
    }

    #[test]
    fn stops_when_senders_are_gone() {
        let (tx, rx) = unbounded::<Progress>();
        let mut watchdog = Watchdog::spawn(Duration::from_secs(60), rx, Box::new(|| {})).unwrap();
        drop(tx);
        watchdog.stop();
        assert_eq!(watchdog.fired(), 0);
    }
}
