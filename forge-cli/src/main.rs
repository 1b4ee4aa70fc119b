#![forbid(unsafe_code)]

//! forge command line tool.
//!
//! Probes a target's capabilities, shows the combinations each conformance
//! check would run, and executes the built-in catalog, writing a JSON run
//! report. The protocol stack is the in-process simulated target; its
//! behavior follows a feature report profile.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use forge_core::{Direction, FeatureReport, ForgeConfig, ProtocolDriver};
use forge_exec::{RunContext, TestRegistry, TestRunner};
use forge_probe::{CapabilityProber, ProbeError};

mod conformance;
mod render;
mod simulated;

use simulated::{SimulatedScanner, SimulatedTarget};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target identity, overrides the configuration
    #[arg(short, long)]
    target: Option<String>,

    /// Role of the target (client, server)
    #[arg(short, long)]
    direction: Option<Direction>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,

    /// Interaction pool size
    #[arg(short, long)]
    parallel: Option<usize>,

    /// Probe again even when a cached feature report exists
    #[arg(long)]
    ignore_cache: bool,

    /// Feature report (JSON) the simulated target behaves like
    #[arg(long)]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Determine what the target supports
    Probe {
        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List the combinations every check would run
    Plan {
        /// Only checks whose id contains this string
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Probe the target and run the conformance catalog
    Run {
        /// Only checks whose id contains this string
        #[arg(short, long)]
        filter: Option<String>,
        /// Covering strength for checks without an override
        #[arg(short, long)]
        strength: Option<usize>,
        /// Directory receiving the JSON run report
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli)?;
    init_tracing(settings.log_level.as_deref().unwrap_or("info"));

    match &cli.command {
        Commands::Probe { json } => {
            let (report, _) = probe(&cli, &settings)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render::feature_table(&report));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Plan { filter } => {
            let (report, driver) = probe(&cli, &settings)?;
            plan(settings, report, driver, &selected(filter.as_deref()))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { filter, strength, output_dir } => {
            if let Some(strength) = strength {
                settings.strength = *strength;
            }
            if let Some(dir) = output_dir {
                settings.output_dir = dir.clone();
            }
            settings.validate()?;
            let (report, driver) = probe(&cli, &settings)?;
            run(settings, report, driver, &selected(filter.as_deref()))
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn load_settings(cli: &Cli) -> Result<ForgeConfig> {
    let mut settings = match &cli.config {
        Some(path) => ForgeConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ForgeConfig::default(),
    };
    if let Some(target) = &cli.target {
        settings.target = target.clone();
    }
    if let Some(direction) = cli.direction {
        settings.direction = direction;
    }
    if let Some(level) = &cli.log_level {
        settings.log_level = Some(level.clone());
    }
    if let Some(parallel) = cli.parallel {
        settings.parallel_handshakes = parallel;
    }
    settings.ignore_cache |= cli.ignore_cache;
    settings.validate()?;
    Ok(settings)
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg} [{elapsed}]")?,
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn probe(cli: &Cli, settings: &ForgeConfig) -> Result<(FeatureReport, Arc<dyn ProtocolDriver>)> {
    let target = match &cli.profile {
        Some(path) => SimulatedTarget::from_file(path)?,
        None => SimulatedTarget::reference(&settings.target, settings.direction),
    };
    let scanner = SimulatedScanner::new(&target);
    let driver: Arc<dyn ProtocolDriver> = Arc::new(target);

    // The simulated client never dials in, so there is nothing to wait for.
    let mut prober = CapabilityProber::new(settings.clone(), driver.clone())
        .with_scanner(Box::new(scanner))
        .without_synchronization();

    let progress = spinner(&format!("Probing {}", settings.target))?;
    let probed = prober.probe();
    progress.finish_and_clear();

    match probed {
        Ok(report) => {
            info!(target_identity = %report.target(), direction = %report.direction(), "capabilities known");
            Ok((report, driver))
        }
        Err(e @ ProbeError::ProbingExhaustion { .. }) => {
            eprintln!("{}", style(format!("Aborting: {}", e)).red().bold());
            Err(e.into())
        }
        Err(e) => Err(e).context("capability probing failed"),
    }
}

fn selected(filter: Option<&str>) -> TestRegistry {
    let catalog = conformance::registry();
    let Some(filter) = filter else { return catalog };
    let mut registry = TestRegistry::new();
    for declaration in catalog.iter().filter(|d| d.id.contains(filter)) {
        registry.register(declaration.clone());
    }
    debug!(filter, selected = registry.len(), "filtered conformance catalog");
    registry
}

fn plan(settings: ForgeConfig, report: FeatureReport, driver: Arc<dyn ProtocolDriver>, registry: &TestRegistry) -> Result<()> {
    let direction = settings.direction;
    let context = RunContext::new(settings, report, driver);
    for declaration in registry.for_direction(direction) {
        match context.plan(declaration) {
            Ok(containers) => {
                println!("{} ({} combinations)", style(&declaration.id).bold(), containers.len());
                for container in &containers {
                    println!("  {}", container.label());
                }
            }
            Err(reason) => println!("{} {}", style(&declaration.id).bold(), style(format!("disabled: {}", reason)).yellow()),
        }
    }
    Ok(())
}

fn run(
    settings: ForgeConfig,
    report: FeatureReport,
    driver: Arc<dyn ProtocolDriver>,
    registry: &TestRegistry,
) -> Result<ExitCode> {
    if registry.for_direction(settings.direction).next().is_none() {
        bail!("no conformance checks selected for {} targets", settings.direction);
    }
    let output_dir = settings.output_dir.clone();
    let runner = TestRunner::new(RunContext::new(settings, report, driver));

    let progress = spinner("Running conformance checks")?;
    let outcome = runner.run(registry);
    progress.finish_and_clear();
    let run = outcome.context("test execution failed")?;

    println!("{}", render::results_table(&run));
    println!("{}", render::volume_table(&run));
    println!("{}", render::summary_line(&run));

    let path = run.write_to(&output_dir)?;
    println!("Report written to {}", style(path.display()).cyan());

    Ok(if run.has_failures() || run.summary.engine_failures > 0 { ExitCode::from(2) } else { ExitCode::SUCCESS })
}
