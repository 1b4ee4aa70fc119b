#![forbid(unsafe_code)]

//! Test runner: models every declared test, hands each test case to one
//! test-case worker and collects the final report.

use chrono::Utc;
use crossbeam_channel::unbounded;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use forge_core::{FeatureReport, ForgeConfig, ProtocolDriver};
use forge_derivation::{
    DerivationContainer, DerivationInputs, DimensionRegistry, ModelBuilder, ModelRegistry, StandardModelRegistry,
};

use crate::case::CaseHandle;
use crate::error::{EngineResult, TestFailure};
use crate::pool::{InteractionPool, Progress, WorkerPool};
use crate::registry::{TestBody, TestDeclaration, TestRegistry};
use crate::report::{RunReport, TestReport, VolumeCounter};
use crate::result::TestCaseResult;
use crate::watchdog::{recovery_action, RecoveryCommand, Watchdog};

/// Everything a run reads: passed explicitly to every stage.
#[derive(Clone)]
pub struct RunContext {
    pub config: ForgeConfig,
    pub report: Arc<FeatureReport>,
    pub driver: Arc<dyn ProtocolDriver>,
    pub dimensions: Arc<DimensionRegistry>,
    pub models: Arc<dyn ModelRegistry>,
}

impl RunContext {
    pub fn new(config: ForgeConfig, report: FeatureReport, driver: Arc<dyn ProtocolDriver>) -> Self {
        Self {
            config,
            report: Arc::new(report),
            driver,
            dimensions: Arc::new(DimensionRegistry::standard()),
            models: Arc::new(StandardModelRegistry),
        }
    }

    pub fn with_models(mut self, models: Arc<dyn ModelRegistry>) -> Self {
        self.models = models;
        self
    }

    pub fn with_dimensions(mut self, dimensions: DimensionRegistry) -> Self {
        self.dimensions = Arc::new(dimensions);
        self
    }

    /// Combinations of `declaration`, or the reason it cannot run.
    pub fn plan(&self, declaration: &TestDeclaration) -> Result<Vec<DerivationContainer>, String> {
        if let Some(reason) = declaration.rejection(&self.report) {
            return Err(reason);
        }
        let scope = declaration.spec.scope(self.config.strength);
        let inputs = DerivationInputs::new(&self.report, &scope, &self.config.certificates);
        let combinations = ModelBuilder::new(&self.dimensions, self.models.as_ref())
            .build(&inputs)
            .and_then(|model| model.combinations())
            .map_err(|e| format!("no derivation model: {}", e))?;
        Ok(combinations.into_iter().map(|c| DerivationContainer::new(c, scope.clone())).collect())
    }
}

pub struct TestRunner {
    context: Arc<RunContext>,
}

struct Shared {
    context: Arc<RunContext>,
    interactions: InteractionPool,
    volume: Arc<VolumeCounter>,
}

impl TestRunner {
    pub fn new(context: RunContext) -> Self {
        Self { context: Arc::new(context) }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run every declaration for the configured direction and block until
    /// each test case has reached its verdict.
    pub fn run(&self, registry: &TestRegistry) -> EngineResult<RunReport> {
        let config = &self.context.config;
        let started_at = Utc::now();

        let (progress_tx, progress_rx) = unbounded();
        let recovery = config.restart_command.as_deref().and_then(RecoveryCommand::parse);
        let mut watchdog = Watchdog::spawn(config.idle_timeout(), progress_rx, recovery_action(recovery))?;
        let shared = Arc::new(Shared {
            context: Arc::clone(&self.context),
            interactions: InteractionPool::new(
                config.effective_parallel_handshakes(),
                Arc::clone(&self.context.driver),
                Some(progress_tx.clone()),
            )?,
            volume: Arc::new(VolumeCounter::default()),
        });
        let cases = WorkerPool::new("test-case", config.effective_parallel_tests())?;
        info!(
            peer = %config.target,
            direction = %config.direction,
            interaction_workers = shared.interactions.size(),
            test_case_workers = cases.size(),
            "starting test run"
        );

        let (done_tx, done_rx) = unbounded::<()>();
        let mut results = Vec::new();
        let mut scheduled = 0usize;
        for declaration in registry.for_direction(config.direction) {
            let result = Arc::new(TestCaseResult::new(declaration.id.clone()));
            results.push((Arc::clone(&result), declaration.description.clone()));

            let containers = match self.context.plan(declaration) {
                Ok(containers) => containers,
                Err(reason) => {
                    result.disable(reason);
                    continue;
                }
            };
            debug!(test = %declaration.id, combinations = containers.len(), "test planned");
            result.expect(0);
            let shared = Arc::clone(&shared);
            let body = Arc::clone(&declaration.body);
            let done = done_tx.clone();
            let progress = progress_tx.clone();
            cases.execute(move || {
                run_test_case(&shared, &result, &body, &containers);
                let _ = done.send(());
                let _ = progress.send(Progress::TestCaseCompleted);
            })?;
            scheduled += 1;
        }
        drop(done_tx);

        let finished = done_rx.iter().take(scheduled).count();
        if finished < scheduled {
            warn!(scheduled, finished, "test cases lost before completion");
        }
        cases.shutdown();
        shared.interactions.shutdown();
        drop(progress_tx);
        watchdog.stop();

        let tests = results
            .into_iter()
            .map(|(result, description)| {
                result.finalize();
                TestReport::from_snapshot(result.snapshot(), description)
            })
            .collect();
        let report = RunReport::new(&config.target, config.direction, started_at, tests, shared.volume.volumes());
        info!(
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            disabled = report.summary.disabled,
            planned = report.summary.total_planned(),
            executed = report.summary.total_executed(),
            idle_recoveries = watchdog.fired(),
            "test run finished"
        );
        Ok(report)
    }
}

/// Tier-2 job: drive every combination of one test case in turn, then seal
/// its result.
fn run_test_case(shared: &Shared, result: &Arc<TestCaseResult>, body: &TestBody, containers: &[DerivationContainer]) {
    for container in containers {
        run_case(shared, result, body, container);
    }
    result.seal();
}

/// Materialize one combination, run the body and wait for its interactions.
/// Nothing escapes as a panic.
fn run_case(shared: &Shared, result: &Arc<TestCaseResult>, body: &TestBody, container: &DerivationContainer) {
    let context = &shared.context;
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let inputs = DerivationInputs::new(&context.report, container.scope(), &context.config.certificates);
        let config = container.build_config(context.driver.as_ref(), &context.dimensions, &inputs, &context.config);
        let mut handle =
            CaseHandle::new(container, config, &context.report, &shared.interactions, result, &shared.volume);
        let verdict = catch_unwind(AssertUnwindSafe(|| body(&mut handle)));
        handle.wait();
        verdict
    }));
    let failure = match outcome {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(failure))) => Some(failure),
        Ok(Err(payload)) | Err(payload) => Some(TestFailure::from_panic(payload)),
    };
    if let Some(failure) = failure {
        debug!(test = %result.id(), combination = %container.label(), "combination failed");
        result.fail(failure);
    }
}
