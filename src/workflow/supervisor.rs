//! Outer retry loop around whole enrollment attempts.
use super::{establish_session, Clock, EnrollOptions, Enroller, RunSummary};
use crate::contacts::ContactSet;
use crate::driver::UiDriver;
use crate::fault::FaultResult;
use crate::state::{ProgressLedger, SessionStore};
use std::time::Duration;

/// Retry behavior for driver faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorPolicy {
    /// Fixed wait between a failed attempt and the next one.
    pub backoff: Duration,
    /// Stop after this many attempts; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

/// Everything an attempt needs besides the driver and the ledger.
#[derive(Debug)]
pub struct EnrollJob<'a> {
    pub group: &'a str,
    pub contacts: &'a ContactSet,
    pub sessions: &'a SessionStore,
    pub entry_url: &'a str,
    pub options: &'a EnrollOptions,
}

/// Run attempts until one finishes or a non-retryable fault escalates.
///
/// Each attempt gets a fresh driver from `connect`; the previous one is
/// dropped before the backoff. The ledger is shared across attempts, so
/// progress recorded before a fault is kept.
pub fn supervise<D, F, C>(
    mut connect: F,
    clock: &C,
    policy: &SupervisorPolicy,
    job: &EnrollJob<'_>,
    ledger: &mut ProgressLedger,
) -> FaultResult<RunSummary>
where
    D: UiDriver,
    F: FnMut() -> FaultResult<D>,
    C: Clock + ?Sized,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        tracing::info!(attempt, group = job.group, "starting enrollment attempt");
        let fault = match run_attempt(&mut connect, clock, job, ledger) {
            Ok(summary) => return Ok(summary),
            Err(fault) if fault.is_retryable() => fault,
            Err(fault) => return Err(fault),
        };
        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            tracing::error!(attempt, %fault, "giving up after final attempt");
            return Err(fault);
        }
        tracing::warn!(
            attempt,
            %fault,
            backoff_secs = policy.backoff.as_secs(),
            recorded = ledger.len(),
            "attempt failed; retrying after backoff"
        );
        clock.pause(policy.backoff, "retry backoff");
    }
}

fn run_attempt<D, F, C>(
    connect: &mut F,
    clock: &C,
    job: &EnrollJob<'_>,
    ledger: &mut ProgressLedger,
) -> FaultResult<RunSummary>
where
    D: UiDriver,
    F: FnMut() -> FaultResult<D>,
    C: Clock + ?Sized,
{
    let mut driver = connect()?;
    establish_session(
        &mut driver,
        job.sessions,
        clock,
        job.entry_url,
        &job.options.timing,
    )?;
    Enroller::new(&mut driver, clock, job.options).run(job.group, job.contacts, ledger)
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
