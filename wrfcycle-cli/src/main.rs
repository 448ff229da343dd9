//! wrfcycle CLI - Command-line interface
//!
//! Runs one analysis cycle (or part of it) using the configuration in
//! `~/.wrfcycle/config.ini`.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::{CycleArgs, ForecastArgs, RunMode};
use error::CliError;

#[derive(Parser)]
#[command(name = "wrfcycle")]
#[command(version = wrfcycle::VERSION)]
#[command(about = "Analysis-cycle orchestration for nested-domain WRF data assimilation", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.wrfcycle/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug-level logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis: observations, boundary updates and assimilation
    Analysis(CycleArgs),

    /// Run the forecast from the promoted initial conditions
    Forecast(ForecastArgs),

    /// Run the analysis followed by the forecast
    Cycle(ForecastArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analysis(args) => {
            commands::run::run(cli.config, cli.debug, RunMode::Analysis, args, None).await
        }
        Commands::Forecast(args) => {
            commands::run::run(
                cli.config,
                cli.debug,
                RunMode::Forecast,
                args.cycle,
                Some(args.hours),
            )
            .await
        }
        Commands::Cycle(args) => {
            commands::run::run(
                cli.config,
                cli.debug,
                RunMode::Full,
                args.cycle,
                Some(args.hours),
            )
            .await
        }
        Commands::Config { action } => commands::config::run(cli.config, action),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_cycle_with_flags() {
        let cli = Cli::try_parse_from([
            "wrfcycle",
            "cycle",
            "20140301T0600+01",
            "--hours",
            "3",
            "--dry-run",
            "--debug",
        ])
        .unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Cycle(args) => {
                assert_eq!(args.hours, 3);
                assert!(args.cycle.dry_run);
                assert!(!args.cycle.low_only);
                assert_eq!(args.cycle.time, "20140301T0600+01");
            }
            _ => panic!("expected cycle command"),
        }
    }

    #[test]
    fn test_forecast_requires_hours() {
        assert!(Cli::try_parse_from(["wrfcycle", "forecast", "2014-03-01_06"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from([
            "wrfcycle",
            "analysis",
            "2014-03-01_06",
            "--config",
            "/etc/wrfcycle.ini",
            "--low-only",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/wrfcycle.ini")));
        match cli.command {
            Commands::Analysis(args) => assert!(args.low_only),
            _ => panic!("expected analysis command"),
        }
    }
}
