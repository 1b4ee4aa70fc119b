#![forbid(unsafe_code)]

use crossbeam_channel::unbounded;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::{info, warn};

use forge_core::{CapabilityScanner, Direction, FeatureReport, ForgeConfig, ProtocolDriver, ReportCache};
use forge_exec::{recovery_action, InteractionPool, RecoveryCommand, Watchdog};

use crate::client::ClientProber;
use crate::error::{ProbeError, ProbeResult};
use crate::server::probe_server;
use crate::sync::{ClientSynchronizer, TriggerCommand};

/// Determines what the target supports, consulting the report cache first.
pub struct CapabilityProber {
    settings: ForgeConfig,
    driver: Arc<dyn ProtocolDriver>,
    scanner: Option<Box<dyn CapabilityScanner>>,
    synchronize: bool,
    on_idle: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl CapabilityProber {
    pub fn new(settings: ForgeConfig, driver: Arc<dyn ProtocolDriver>) -> Self {
        Self { settings, driver, scanner: None, synchronize: true, on_idle: None }
    }

    /// Scanner used for server targets.
    pub fn with_scanner(mut self, scanner: Box<dyn CapabilityScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Skip waiting for the client target to connect before probing.
    pub fn without_synchronization(mut self) -> Self {
        self.synchronize = false;
        self
    }

    /// Run `action` instead of the configured restart command when probing
    /// stalls.
    pub fn on_idle<F>(mut self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_idle = Some(Arc::new(action));
        self
    }

    pub fn cache(&self) -> ReportCache {
        ReportCache::new(&self.settings.cache_dir)
    }

    pub fn probe(&mut self) -> ProbeResult<FeatureReport> {
        let cache = self.cache();
        if !self.settings.ignore_cache {
            if let Some(report) = cache.load(&self.settings.target) {
                if report.direction() == self.settings.direction {
                    info!(target_identity = %self.settings.target, "using cached feature report");
                    return Ok(report);
                }
                warn!(target_identity = %self.settings.target, "cached report is for the other direction, probing again");
            }
        }

        let report = match self.settings.direction {
            Direction::Server => self.probe_server()?,
            Direction::Client => self.probe_client()?,
        };
        cache.store(&report)?;
        info!(
            target_identity = %self.settings.target,
            versions = report.versions().len(),
            "feature report stored"
        );
        Ok(report)
    }

    fn probe_server(&mut self) -> ProbeResult<FeatureReport> {
        let scanner = self
            .scanner
            .as_mut()
            .ok_or_else(|| ProbeError::Scanner("no capability scanner configured".into()))?;
        probe_server(scanner.as_mut(), self.driver.as_ref(), &self.settings)
    }

    fn probe_client(&self) -> ProbeResult<FeatureReport> {
        if self.synchronize {
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.settings.listen_port));
            let trigger = self.settings.trigger_command.as_deref().and_then(TriggerCommand::parse);
            ClientSynchronizer::new(addr, trigger, self.settings.trigger_interval(), self.settings.idle_timeout())
                .wait_for_client()?;
        }

        let (progress_tx, progress_rx) = unbounded();
        let mut watchdog = Watchdog::spawn(self.settings.idle_timeout(), progress_rx, self.recovery())?;
        let pool =
            InteractionPool::new(self.settings.effective_parallel_handshakes(), self.driver.clone(), Some(progress_tx))?;
        let report = ClientProber::new(&pool, &self.settings).probe();
        pool.shutdown();
        watchdog.stop();
        if watchdog.fired() > 0 {
            warn!(target_identity = %self.settings.target, idle_recoveries = watchdog.fired(), "probing stalled");
        }
        report
    }

    fn recovery(&self) -> Box<dyn Fn() + Send> {
        match &self.on_idle {
            Some(action) => {
                let action = Arc::clone(action);
                Box::new(move || action())
            }
            None => recovery_action(self.settings.restart_command.as_deref().and_then(RecoveryCommand::parse)),
        }
    }
}
