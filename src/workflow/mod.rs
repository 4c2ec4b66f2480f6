//! Enrollment workflow: session establishment, batch cycles, supervision.
//!
//! Control flow for one process:
//!
//! ```text
//! supervise ─┬─ connect (fresh driver per attempt)
//!            ├─ establish_session (restore cookies or interactive login)
//!            └─ Enroller::run ── locate group ── open member surface
//!                                 └─ up to max_cycles × (batch cycle + submit)
//! ```
//!
//! Only [`crate::fault::Fault::Driver`] makes the supervisor start over.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of members the platform accepts per confirm.
pub const BATCH_THRESHOLD: usize = 5;
/// Default bound on batch cycles per attempt.
pub const DEFAULT_MAX_CYCLES: usize = 50;

mod clock;
mod enroll;
mod login;
mod status;
mod supervisor;
#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use enroll::{Enroller, RunOutcome, RunSummary};
pub use login::establish_session;
pub use status::{render_status, status_report};
pub use supervisor::{supervise, EnrollJob, SupervisorPolicy};

/// What to do with a terminal batch smaller than [`BATCH_THRESHOLD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PartialBatchPolicy {
    /// Leave the selections pending in the UI without confirming.
    #[default]
    Hold,
    /// Confirm the partial batch like a full one.
    Submit,
}

/// Timeouts and settle delays used by the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Wait for the conversation search when locating the group.
    pub group_lookup: Duration,
    /// Default wait for any other element.
    pub element: Duration,
    /// Wait for the main surface after restoring saved cookies.
    pub session_check: Duration,
    /// Wait for the operator to finish the out-of-band login.
    pub login: Duration,
    /// Unconditional hold after login while the app finishes syncing.
    pub login_settle: Duration,
    /// Unconditional hold after selecting a member result.
    pub post_click_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            group_lookup: Duration::from_secs(35),
            element: Duration::from_secs(20),
            session_check: Duration::from_secs(20),
            login: Duration::from_secs(60),
            login_settle: Duration::from_secs(40),
            post_click_settle: Duration::from_secs(2),
        }
    }
}

/// Knobs for a single [`Enroller::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollOptions {
    pub max_cycles: usize,
    pub partial_batch: PartialBatchPolicy,
    pub timing: Timing,
}

impl Default for EnrollOptions {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
            partial_batch: PartialBatchPolicy::default(),
            timing: Timing::default(),
        }
    }
}
