use super::*;
use crate::fault::Fault;
use crate::state::EntryState;
use crate::workflow::testing::{FakeDriver, RecordingClock, Surface};
use crate::workflow::RunOutcome;
use std::cell::Cell;

const GROUP: &str = "Book Club";

struct Harness {
    dir: tempfile::TempDir,
    contacts: ContactSet,
    sessions: SessionStore,
    options: EnrollOptions,
}

impl Harness {
    fn new(count: usize) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let sessions = SessionStore::new(dir.path().join("session.json"));
        let contacts = (1..=count)
            .map(|i| (format!("+44 7700 {i:06}"), format!("Member {i}")))
            .collect();
        Self {
            dir,
            contacts,
            sessions,
            options: EnrollOptions::default(),
        }
    }

    fn job(&self) -> EnrollJob<'_> {
        EnrollJob {
            group: GROUP,
            contacts: &self.contacts,
            sessions: &self.sessions,
            entry_url: "https://web.example/",
            options: &self.options,
        }
    }

    fn ledger(&self) -> ProgressLedger {
        ProgressLedger::load(&self.dir.path().join("ledger.json")).expect("load ledger")
    }

    fn directory(&self) -> Vec<(String, String)> {
        self.contacts
            .iter()
            .map(|contact| (contact.phone.clone(), contact.name.clone()))
            .collect()
    }
}

#[test]
fn driver_fault_backs_off_once_and_restarts_with_progress_kept() {
    let harness = Harness::new(8);
    let surface = Surface::with_directory(&harness.directory(), &[GROUP]);
    let clock = RecordingClock::default();
    let connects = Cell::new(0);
    let mut ledger = harness.ledger();

    let summary = supervise(
        || {
            connects.set(connects.get() + 1);
            let mut driver = FakeDriver::new(surface.clone());
            if connects.get() == 1 {
                driver.crash_at_selection = Some(4);
            }
            Ok(driver)
        },
        &clock,
        &SupervisorPolicy::default(),
        &harness.job(),
        &mut ledger,
    )
    .expect("second attempt completes");

    assert_eq!(connects.get(), 2);
    assert_eq!(
        clock.pauses_for("retry backoff"),
        vec![Duration::from_secs(10)]
    );
    assert_eq!(summary.outcome, RunOutcome::Completed);

    let reloaded = harness.ledger();
    let first_three: Vec<String> = harness
        .contacts
        .iter()
        .take(3)
        .map(|contact| contact.phone.clone())
        .collect();
    for phone in &first_three {
        assert_eq!(reloaded.state(phone), Some(EntryState::Provisional));
    }
    assert_eq!(reloaded.confirmed_count(), 5);

    let surface = surface.borrow();
    assert_eq!(surface.selections.len(), 8, "{:?}", surface.selections);
    assert_eq!(surface.members.len(), 5);
}

#[test]
fn second_attempt_reuses_the_saved_session() {
    let harness = Harness::new(2);
    let surface = Surface::with_directory(&harness.directory(), &[GROUP]);
    let clock = RecordingClock::default();
    let connects = Cell::new(0);
    let mut ledger = harness.ledger();

    supervise(
        || {
            connects.set(connects.get() + 1);
            let mut driver = FakeDriver::new(surface.clone());
            if connects.get() == 1 {
                driver.crash_at_selection = Some(1);
            }
            Ok(driver)
        },
        &clock,
        &SupervisorPolicy::default(),
        &harness.job(),
        &mut ledger,
    )
    .expect("run");

    // Only the first attempt needed the interactive login.
    assert_eq!(clock.pauses_for("login settle").len(), 1);
    assert!(harness.sessions.load().expect("load").is_some());
}

#[test]
fn attempt_cap_returns_the_last_driver_fault() {
    let harness = Harness::new(3);
    let clock = RecordingClock::default();
    let connects = Cell::new(0);
    let mut ledger = harness.ledger();
    let policy = SupervisorPolicy {
        max_attempts: Some(3),
        ..SupervisorPolicy::default()
    };

    let err = supervise(
        || -> FaultResult<FakeDriver> {
            connects.set(connects.get() + 1);
            Err(Fault::driver("connection refused"))
        },
        &clock,
        &policy,
        &harness.job(),
        &mut ledger,
    )
    .expect_err("cap reached");

    assert!(matches!(err, Fault::Driver(_)));
    assert_eq!(connects.get(), 3);
    assert_eq!(clock.pauses_for("retry backoff").len(), 2);
}

#[test]
fn session_fault_is_not_retried() {
    let harness = Harness::new(3);
    let surface = Surface::with_directory(&harness.directory(), &[GROUP]);
    surface.borrow_mut().scan_after = None;
    let clock = RecordingClock::default();
    let connects = Cell::new(0);
    let mut ledger = harness.ledger();

    let err = supervise(
        || {
            connects.set(connects.get() + 1);
            Ok(FakeDriver::new(surface.clone()))
        },
        &clock,
        &SupervisorPolicy::default(),
        &harness.job(),
        &mut ledger,
    )
    .expect_err("login never completes");

    assert!(matches!(err, Fault::Session(_)));
    assert_eq!(connects.get(), 1);
    assert!(clock.pauses_for("retry backoff").is_empty());
}
