//! Domain staging.
//!
//! Each stage runs in its own working directory. Before a job is submitted,
//! [`DomainStaging::prepare`] builds that directory: stale outputs are
//! removed, static inputs are symlinked and per-cycle inputs copied, all
//! through a [`StagingManifest`] whose sources are checked up front. After
//! the job succeeds, [`DomainStaging::promote`] hands its outputs on.
//!
//! Files in the forecast run directory are only ever replaced through
//! [`PendingPromotion`]: the new contents are written to a temporary
//! sibling and renamed into place, so a crash leaves either the old file or
//! the new one.

mod control;
mod domain;
mod error;
pub mod layout;
mod manifest;
mod promotion;

pub use control::{da_control, update_bc_control, BoundaryKind};
pub use domain::DomainStaging;
pub use error::StagingError;
pub use layout::WorkLayout;
pub use manifest::{StagingManifest, Transfer, TransferKind};
pub use promotion::{promote_copy, silent_remove, PendingPromotion};
