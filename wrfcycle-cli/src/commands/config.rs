//! Configuration management CLI commands.
//!
//! Provides `config init`, `config path` and `config show`.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use wrfcycle::config::{config_file_path, to_config_string, ConfigFile};

use crate::error::CliError;
use crate::runner::load_config;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Show the configuration in effect, defaults included
    Show {
        /// Also check that every configured path exists
        #[arg(long)]
        validate: bool,
    },
}

/// Run a config subcommand.
pub fn run(config_path: Option<PathBuf>, command: ConfigCommands) -> Result<(), CliError> {
    let path = config_path.unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show { validate } => run_show(&path, validate),
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        println!("Configuration already exists: {}", path.display());
        println!("Use --force to replace it with the defaults.");
        return Ok(());
    }
    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn run_show(path: &Path, validate: bool) -> Result<(), CliError> {
    let config = load_config(path)?;
    print!("{}", to_config_string(&config));
    if validate {
        config.validate()?;
        println!();
        println!("; configuration is valid");
    }
    Ok(())
}
