#![forbid(unsafe_code)]

//! Fixed-size, thread-backed worker pools.
//!
//! Tier 1 ([`InteractionPool`]) drives protocol interactions, one per worker
//! at a time. Tier 2 is a plain [`WorkerPool`] running test-case jobs that
//! submit to tier 1 and block on the results. Both report completions as
//! [`Progress`] events, which keep the idle watchdog armed.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use forge_core::{DraftConfig, Interaction, ProtocolDriver, TransportError};

use crate::error::{panic_message, EngineError, EngineResult};
use crate::outcome::RunOutcome;

/// Completion events observed by the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    InteractionCompleted,
    TestCaseCompleted,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Pool of `size` threads consuming boxed jobs in submission order.
pub struct WorkerPool {
    name: &'static str,
    size: usize,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(name: &'static str, size: usize) -> EngineResult<Self> {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver: Receiver<Job> = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || {
                    for job in receiver.iter() {
                        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                            warn!(pool = name, error = %panic_message(payload), "job panicked");
                        }
                    }
                })
                .map_err(EngineError::Spawn)?;
            workers.push(handle);
        }
        debug!(pool = name, size, "worker pool started");
        Ok(Self { name, size, sender: Mutex::new(Some(sender)), workers: Mutex::new(workers) })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn execute<F>(&self, job: F) -> EngineResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(EngineError::PoolClosed(self.name))?;
        sender.send(Box::new(job)).map_err(|_| EngineError::PoolClosed(self.name))
    }

    /// Stop accepting jobs, drain the queue and join every worker.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                warn!(pool = self.name, "worker thread exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Callback run on the tier-1 worker once its interaction has completed.
pub type Completion = Box<dyn FnOnce(RunOutcome) + Send + 'static>;

/// Tier-1 pool: each worker drives exactly one interaction at a time.
pub struct InteractionPool {
    workers: WorkerPool,
    driver: Arc<dyn ProtocolDriver>,
    progress: Option<Sender<Progress>>,
}

impl InteractionPool {
    pub fn new(size: usize, driver: Arc<dyn ProtocolDriver>, progress: Option<Sender<Progress>>) -> EngineResult<Self> {
        Ok(Self { workers: WorkerPool::new("interaction", size)?, driver, progress })
    }

    pub fn size(&self) -> usize {
        self.workers.size()
    }

    pub fn driver(&self) -> &Arc<dyn ProtocolDriver> {
        &self.driver
    }

    /// Queue one interaction; `completion` receives its outcome on the worker
    /// thread. Driver panics become transport errors.
    pub fn submit(
        &self,
        config: DraftConfig,
        interaction: Interaction,
        combination: String,
        completion: Completion,
    ) -> EngineResult<()> {
        let driver = Arc::clone(&self.driver);
        let progress = self.progress.clone();
        self.workers.execute(move || {
            let result = catch_unwind(AssertUnwindSafe(|| driver.execute(&config, &interaction)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload);
                    warn!(combination = %combination, error = %message, "driver panicked");
                    Err(TransportError::Other(format!("driver panicked: {}", message)))
                });
            let outcome = RunOutcome::classify(&interaction, result, combination);
            debug!(combination = %outcome.combination, status = %outcome.status, "interaction completed");
            completion(outcome);
            if let Some(progress) = progress {
                let _ = progress.send(Progress::InteractionCompleted);
            }
        })
    }

    /// Run every interaction and block until all have completed. Outcomes are
    /// returned in submission order; one interaction's failure never affects
    /// another's.
    pub fn execute_batch(&self, batch: Vec<(DraftConfig, Interaction, String)>) -> EngineResult<Vec<RunOutcome>> {
        let mut pending = Vec::with_capacity(batch.len());
        for (config, interaction, combination) in batch {
            let (tx, rx) = bounded(1);
            let label = combination.clone();
            let fallback = interaction.clone();
            self.submit(
                config,
                interaction,
                combination,
                Box::new(move |outcome| {
                    let _ = tx.send(outcome);
                }),
            )?;
            pending.push((rx, fallback, label));
        }
        Ok(pending
            .into_iter()
            .map(|(rx, interaction, label)| {
                rx.recv().unwrap_or_else(|_| {
                    RunOutcome::classify(
                        &interaction,
                        Err(TransportError::Other("interaction was dropped".into())),
                        label,
                    )
                })
            })
            .collect())
    }

    pub fn shutdown(&self) {
        self.workers.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn jobs_run_and_panics_do_not_kill_workers() {
        let pool = WorkerPool::new("test", 2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        pool.execute(|| panic!("first job fails")).unwrap();
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(matches!(pool.execute(|| {}), Err(EngineError::PoolClosed("test"))));
    }
}
