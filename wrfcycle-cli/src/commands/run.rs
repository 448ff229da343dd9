//! Cycle commands: `analysis`, `forecast` and `cycle`.

use std::path::PathBuf;

use clap::Args;
use tracing::info;
use wrfcycle::bias::{BiasCorrector, CommandBiasCorrector};
use wrfcycle::cycle::{
    configured_domains, Cycle, CycleError, CycleOrchestrator, CycleReport, PromotionKind,
};
use wrfcycle::job::JobBackend;
use wrfcycle::time::parse_cycle_time;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments shared by every cycle command.
#[derive(Debug, Args)]
pub struct CycleArgs {
    /// Cycle start time (20140301T0600+01, 2014-03-01_06, 2014-03-01_06:00:00 or RFC 3339)
    pub time: String,

    /// List the stages that would run without staging or submitting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Only update the lower boundary; skip observations and assimilation
    #[arg(long)]
    pub low_only: bool,
}

/// Arguments for commands that run the forecast.
#[derive(Debug, Args)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub cycle: CycleArgs,

    /// Forecast length in hours
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub hours: u32,
}

/// Which part of the cycle to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Analysis,
    Forecast,
    Full,
}

impl RunMode {
    fn name(&self) -> &'static str {
        match self {
            RunMode::Analysis => "analysis",
            RunMode::Forecast => "forecast",
            RunMode::Full => "cycle",
        }
    }

    fn includes_analysis(&self) -> bool {
        matches!(self, RunMode::Analysis | RunMode::Full)
    }

    fn includes_forecast(&self) -> bool {
        matches!(self, RunMode::Forecast | RunMode::Full)
    }
}

/// Run part or all of one cycle.
///
/// `hours` is the forecast length; the analysis alone uses one hour, which
/// only sets the assimilation window end.
pub async fn run(
    config_path: Option<PathBuf>,
    debug: bool,
    mode: RunMode,
    args: CycleArgs,
    hours: Option<u32>,
) -> Result<(), CliError> {
    let start = parse_cycle_time(&args.time)?;
    let runner = CliRunner::new(config_path, debug)?;
    runner.log_startup(mode.name());

    let config = runner.config();
    let domains = configured_domains(config)?;
    let duration = chrono::Duration::hours(i64::from(hours.unwrap_or(1)));
    let cycle = Cycle::new(start, duration, domains)
        .ok_or_else(|| CliError::Config("the cycle needs at least one domain".to_string()))?;

    let backend = runner.backend();
    let orchestrator = CycleOrchestrator::new(config, cycle, &backend)
        .low_only(args.low_only || config.assimilation.low_only);

    if args.dry_run {
        print_plan(&orchestrator, mode);
        return Ok(());
    }

    runner.validate()?;
    info!(start = %start, domains, mode = mode.name(), "Cycle starting");

    let report = match &config.bias_correction.command {
        Some(command) => {
            let orchestrator =
                orchestrator.with_bias_corrector(CommandBiasCorrector::new(command.clone()));
            drive(&orchestrator, mode).await?
        }
        None => drive(&orchestrator, mode).await?,
    };

    print_summary(&report);
    Ok(())
}

async fn drive<B: JobBackend, C: BiasCorrector>(
    orchestrator: &CycleOrchestrator<'_, B, C>,
    mode: RunMode,
) -> Result<CycleReport, CycleError> {
    match mode {
        RunMode::Full => orchestrator.run().await,
        RunMode::Analysis => orchestrator.run_analysis().await,
        RunMode::Forecast => {
            let mut report = CycleReport::default();
            orchestrator.run_forecast(&mut report).await?;
            Ok(report)
        }
    }
}

fn print_plan<B: JobBackend, C: BiasCorrector>(
    orchestrator: &CycleOrchestrator<'_, B, C>,
    mode: RunMode,
) {
    println!(
        "Cycle {} ({} domain(s)), dry run",
        orchestrator.cycle().start(),
        orchestrator.cycle().domains().len()
    );
    println!();
    println!("{:<28} {:<4} {:<6} DIRECTORY", "STAGE", "DOM", "BACKEND");
    let planned = if mode.includes_analysis() {
        orchestrator.plan(mode.includes_forecast())
    } else {
        orchestrator
            .plan(true)
            .into_iter()
            .filter(|p| p.stage == wrfcycle::cycle::PipelineStage::ForecastIntegration)
            .collect()
    };
    for stage in planned {
        println!("{}", stage);
    }
}

fn print_summary(report: &CycleReport) {
    println!();
    println!("Stages run: {}", report.runs.len());
    for run in &report.runs {
        let domain = run.domain.map(|d| format!(" {}", d)).unwrap_or_default();
        let retry = run.retry.map(|r| format!(" [{}]", r)).unwrap_or_default();
        println!("  {}{}: {}{}", run.stage, domain, run.outcome, retry);
    }
    let initial = report.promotions_of(PromotionKind::InitialConditions).count();
    let fallback = report
        .promotions_of(PromotionKind::FallbackInitialConditions)
        .count();
    println!("Initial conditions promoted: {}", initial);
    if fallback > 0 {
        println!("Restored from first guess: {}", fallback);
    }
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }
    if let Some(outcome) = report.outcome {
        println!("Cycle {}", outcome);
    }
}
