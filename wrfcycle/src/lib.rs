//! wrfcycle - analysis-cycle orchestration for nested-domain WRF runs
//!
//! One cycle preprocesses observations, updates the lower boundary of each
//! domain's first guess, runs variational assimilation per domain, updates
//! the lateral boundary of the outer domain and then starts the forecast,
//! retrying it with relaxed time steps and finally from the first guess.
//!
//! # High-Level API
//!
//! ```ignore
//! use wrfcycle::config::ConfigFile;
//! use wrfcycle::cycle::{configured_domains, Cycle, CycleOrchestrator};
//! use wrfcycle::job::{BatchSettings, RoutingBackend};
//!
//! let config = ConfigFile::load()?;
//! let cycle = Cycle::new(start, chrono::Duration::hours(3), configured_domains(&config)?)
//!     .expect("at least one domain");
//! let backend = RoutingBackend::new(BatchSettings::from(&config.scheduler));
//! let report = CycleOrchestrator::new(&config, cycle, &backend).run().await?;
//! ```

pub mod bias;
pub mod config;
pub mod cycle;
pub mod job;
pub mod logging;
pub mod namelist;
pub mod retry;
pub mod staging;
pub mod time;

/// Version of the wrfcycle library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
