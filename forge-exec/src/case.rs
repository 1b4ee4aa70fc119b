#![forbid(unsafe_code)]

//! Handle a test body uses to drive its combination.

use crossbeam_channel::{bounded, Receiver};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

use forge_core::{DraftConfig, FeatureReport, Interaction, InteractionKind, ProtocolEpoch};
use forge_derivation::DerivationContainer;

use crate::error::TestFailure;
use crate::outcome::RunOutcome;
use crate::pool::InteractionPool;
use crate::report::VolumeCounter;
use crate::result::TestCaseResult;

/// Assertion logic run on the outcome of one interaction.
pub type Validator = Box<dyn FnOnce(&RunOutcome) -> Result<(), TestFailure> + Send + 'static>;

/// One combination of one test, as seen by the test body.
///
/// Interactions submitted here run on the tier-1 pool; their validators run
/// on the worker that completed them and feed the owning [`TestCaseResult`].
pub struct CaseHandle<'a> {
    container: &'a DerivationContainer,
    config: DraftConfig,
    report: &'a FeatureReport,
    pool: &'a InteractionPool,
    result: &'a Arc<TestCaseResult>,
    volume: &'a Arc<VolumeCounter>,
    pending: Vec<Receiver<()>>,
}

impl<'a> CaseHandle<'a> {
    pub fn new(
        container: &'a DerivationContainer,
        config: DraftConfig,
        report: &'a FeatureReport,
        pool: &'a InteractionPool,
        result: &'a Arc<TestCaseResult>,
        volume: &'a Arc<VolumeCounter>,
    ) -> Self {
        Self { container, config, report, pool, result, volume, pending: Vec::new() }
    }

    pub fn container(&self) -> &DerivationContainer {
        self.container
    }

    /// Configuration materialized from the combination.
    pub fn config(&self) -> &DraftConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DraftConfig {
        &mut self.config
    }

    pub fn report(&self) -> &FeatureReport {
        self.report
    }

    pub fn epoch(&self) -> ProtocolEpoch {
        self.config.epoch
    }

    /// Message plan of `kind` for the current configuration.
    pub fn interaction(&self, kind: InteractionKind) -> Interaction {
        self.pool.driver().build_interaction(kind, &self.config)
    }

    /// Run `interaction` with the current configuration.
    pub fn execute<F>(&mut self, interaction: Interaction, validator: F) -> Result<(), TestFailure>
    where
        F: FnOnce(&RunOutcome) -> Result<(), TestFailure> + Send + 'static,
    {
        let config = self.config.clone();
        self.execute_with(config, interaction, validator)
    }

    /// Run `interaction` with an explicit configuration.
    pub fn execute_with<F>(&mut self, config: DraftConfig, interaction: Interaction, validator: F) -> Result<(), TestFailure>
    where
        F: FnOnce(&RunOutcome) -> Result<(), TestFailure> + Send + 'static,
    {
        let validator: Validator = Box::new(validator);
        let result = Arc::clone(self.result);
        let volume = Arc::clone(self.volume);
        let (epoch, direction) = (config.epoch, config.direction);
        let (done_tx, done_rx) = bounded(1);

        self.result.expect(1);
        self.volume.planned(epoch, direction);
        let submitted = self.pool.submit(
            config,
            interaction,
            self.container.label(),
            Box::new(move |outcome| {
                if outcome.reached_target() {
                    volume.executed(epoch, direction);
                }
                let assertion = catch_unwind(AssertUnwindSafe(|| validator(&outcome)))
                    .unwrap_or_else(|payload| Err(TestFailure::from_panic(payload)));
                result.record(outcome, assertion);
                let _ = done_tx.send(());
            }),
        );
        if let Err(e) = submitted {
            warn!(test = %self.result.id(), error = %e, "interaction could not be submitted");
            let failure = TestFailure::Engine(e.to_string());
            self.result.fail(failure.clone());
            return Err(failure);
        }
        self.pending.push(done_rx);
        Ok(())
    }

    /// Block until every submitted interaction has been validated.
    pub fn wait(&mut self) {
        for done in self.pending.drain(..) {
            let _ = done.recv();
        }
    }
}
