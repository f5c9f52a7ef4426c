//! Reservation admission algorithm for HORAO: tenant constraints, capacity
//! checks against the replicated infrastructure model, and optional
//! dynamic-start planning.

mod error;
mod scheduler;

pub use error::SchedulerError;
pub use scheduler::{Scheduler, SchedulerConfig};
