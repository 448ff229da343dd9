//! Forecast retries.
//!
//! When the forecast fails, the run is repeated with progressively smaller
//! time steps taken from a [`RelaxationTable`]. Once the table is exhausted,
//! the initial conditions of every domain are replaced by the first guess
//! preserved before assimilation and the forecast runs one last time. The
//! sequence is modelled by [`RetryState`]; [`ForecastRunner`] drives it.

mod forecast;
mod state;
mod table;

pub use forecast::{clean_finish, ForecastAttempt, ForecastReport, ForecastRunner, SUCCESS_MARKER};
pub use state::RetryState;
pub use table::{RelaxationEntry, RelaxationTable};
