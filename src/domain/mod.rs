//! Domain layer for the SWR coupling controller
//!
//! This module contains the experiment, trajectory and convergence models and
//! the ports the services drive the external coupled model through.

pub mod errors;
pub mod models;
pub mod ports;
pub mod time_alignment;

// Re-export error types for convenient access
pub use errors::{AlignmentError, CouplingError, CouplingResult, ValidationError};
pub use time_alignment::{compute_offset, parse_timestamp};
