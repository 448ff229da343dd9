//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes.

use std::fmt;
use std::process;

use wrfcycle::config::ConfigFileError;
use wrfcycle::cycle::CycleError;
use wrfcycle::namelist::NamelistError;
use wrfcycle::time::TimeParseError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration could not be loaded or is invalid
    Config(String),
    /// The cycle time argument could not be parsed
    InvalidTime(TimeParseError),
    /// A cycle stage failed
    Cycle(CycleError),
}

impl CliError {
    /// Exit code for this error: 2 for problems found before any job ran,
    /// 1 for failures during the cycle.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Cycle(e) if !e.kind.is_configuration() => 1,
            _ => 2,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the configuration file:");
                eprintln!("  wrfcycle config path    show where it is");
                eprintln!("  wrfcycle config show    show the values in effect");
            }
            CliError::Cycle(e) => {
                eprintln!();
                eprintln!("Working directory: {}", e.workdir.display());
                if e.kind.is_configuration() {
                    eprintln!("Check the [scheduler] job scripts and the installed executables.");
                }
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidTime(e) => write!(f, "{}", e),
            CliError::Cycle(e) => write!(f, "Cycle failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::InvalidTime(e) => Some(e),
            CliError::Cycle(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<NamelistError> for CliError {
    fn from(e: NamelistError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<TimeParseError> for CliError {
    fn from(e: TimeParseError) -> Self {
        CliError::InvalidTime(e)
    }
}

impl From<CycleError> for CliError {
    fn from(e: CycleError) -> Self {
        CliError::Cycle(e)
    }
}
