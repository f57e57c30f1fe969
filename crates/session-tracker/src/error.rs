//! Session tracker errors

use fgtracker_ports::StoreError;
use thiserror::Error;

/// Failures that abort event processing for the owning peer
///
/// Rejected waypoints and missing flights are not errors; they come back as
/// [`EventOutcome`](crate::EventOutcome) values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
