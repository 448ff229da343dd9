//! Cycle configuration.
//!
//! Configuration lives in an INI file (default `~/.wrfcycle/config.ini`),
//! one section per concern. It is loaded once by the entry point, validated,
//! and passed by reference to every component.
//!
//! # Example
//!
//! ```no_run
//! use wrfcycle::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! config.validate()?;
//! println!("run directory: {}", config.filesystem.wrf_run_dir.display());
//! # Ok::<(), wrfcycle::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use defaults::*;
pub use settings::*;
pub use writer::to_config_string;
