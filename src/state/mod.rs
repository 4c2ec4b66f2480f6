//! Durable state owned by the enrollment workflow.
//!
//! Both stores are constructed once per process and handed to the workflow
//! explicitly; nothing else touches their files.
/// Current schema version for `ledgers/<group>.json`.
pub const LEDGER_SCHEMA_VERSION: u32 = 1;
/// Current schema version for `session.json`.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

mod durable;
mod ledger;
mod paths;
mod session;

pub use durable::{now_epoch_ms, write_json_durable};
pub use ledger::{EntryState, ProgressLedger};
pub use paths::StatePaths;
pub use session::{Cookie, SessionStore, SessionToken};
