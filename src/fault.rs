//! Typed fault taxonomy shared by the driver seam and the enrollment workflow.
//!
//! Faults are classified by how far they are allowed to travel:
//!
//! - [`Fault::NotFound`] is absorbed where it happens (a single operation or a
//!   single batch cycle) and reported as a boolean failure plus a log line.
//! - [`Fault::Driver`] means the automation session itself is gone; only this
//!   kind crosses into the supervisor's retry loop.
//! - [`Fault::Session`] and [`Fault::Storage`] end the run.
use std::time::Duration;

/// Result alias for driver and workflow operations.
pub type FaultResult<T> = std::result::Result<T, Fault>;

#[derive(Debug, thiserror::Error)]
pub enum Fault {
    /// An expected element did not appear (or disappear) within its timeout.
    #[error("{what} not found within {}s", .timeout.as_secs())]
    NotFound { what: String, timeout: Duration },

    /// No usable session and the interactive login did not complete.
    #[error("session unavailable: {0}")]
    Session(String),

    /// The automation session crashed, disconnected, or was rejected.
    #[error("driver fault: {0}")]
    Driver(String),

    /// Persisting the ledger or session failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl Fault {
    pub fn not_found(what: impl Into<String>, timeout: Duration) -> Self {
        Fault::NotFound {
            what: what.into(),
            timeout,
        }
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Fault::Driver(message.into())
    }

    /// True for faults the supervisor restarts the whole attempt on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Fault::Driver(_))
    }
}

/// Convert an operation-level `NotFound` into `Ok(false)` with a diagnostic.
///
/// Every other fault propagates unchanged.
pub fn absorb_not_found(result: FaultResult<()>, step: &str) -> FaultResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(Fault::NotFound { what, timeout }) => {
            tracing::warn!(step, %what, timeout_secs = timeout.as_secs(), "element not found");
            Ok(false)
        }
        Err(other) => Err(other),
    }
}
