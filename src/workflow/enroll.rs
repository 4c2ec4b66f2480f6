//! The enrollment state machine.
//!
//! A run resolves the group once, then alternates selection cycles and
//! submissions. Selection is optimistic: each contact is written to the
//! ledger (provisional) right after its result is clicked and before the
//! batch confirm runs, so a crash at any point never reselects it. A
//! successful confirm promotes the batch to confirmed.
use super::{Clock, EnrollOptions, PartialBatchPolicy, BATCH_THRESHOLD};
use crate::contacts::ContactSet;
use crate::driver::{Locator, UiDriver};
use crate::fault::{absorb_not_found, Fault, FaultResult};
use crate::state::ProgressLedger;
use serde::Serialize;

/// Phones selected during one cycle, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub selected: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Confirm and acknowledgement were clicked.
    Confirmed,
    /// Partial batch left pending under [`PartialBatchPolicy::Hold`].
    Held,
    /// No selections to submit.
    Empty,
    /// A confirm control never appeared; selections stay provisional.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every contact is in the ledger.
    Completed,
    /// The cycle bound ran out with contacts still pending.
    CycleLimitReached,
    /// The group or its member panel could not be opened.
    GroupUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub cycles: usize,
    /// Contacts newly recorded during this run.
    pub selected: usize,
    pub confirmed_batches: usize,
    pub aborted_cycles: usize,
    pub failed_submits: usize,
    /// Phones selected in a held partial batch, never confirmed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub held: Vec<String>,
    /// Contacts not yet in the ledger.
    pub remaining: usize,
}

impl RunSummary {
    fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            cycles: 0,
            selected: 0,
            confirmed_batches: 0,
            aborted_cycles: 0,
            failed_submits: 0,
            held: Vec::new(),
            remaining: 0,
        }
    }
}

/// Drives one browser session through the add-members workflow.
pub struct Enroller<'a, D: UiDriver + ?Sized, C: Clock + ?Sized> {
    driver: &'a mut D,
    clock: &'a C,
    options: &'a EnrollOptions,
}

impl<'a, D: UiDriver + ?Sized, C: Clock + ?Sized> Enroller<'a, D, C> {
    pub fn new(driver: &'a mut D, clock: &'a C, options: &'a EnrollOptions) -> Self {
        Self {
            driver,
            clock,
            options,
        }
    }

    /// Select the conversation titled exactly `name`.
    pub fn locate_group(&mut self, name: &str) -> FaultResult<bool> {
        let found = self.select_conversation(name);
        absorb_not_found(found, "locate group")
    }

    fn select_conversation(&mut self, name: &str) -> FaultResult<()> {
        let timing = &self.options.timing;
        let search = self
            .driver
            .wait_for_visible(&Locator::ConversationSearch, timing.group_lookup)?;
        self.driver.click(&search)?;
        self.driver.clear(&search)?;
        self.driver.type_text(&search, name)?;
        let entry = self
            .driver
            .wait_for_visible(&Locator::ConversationTitle(name.to_string()), timing.element)?;
        self.driver.click(&entry)
    }

    /// Open the selected group's details panel.
    pub fn open_member_surface(&mut self) -> FaultResult<bool> {
        let opened = self
            .driver
            .wait_for_clickable(&Locator::GroupDetails, self.options.timing.element)
            .and_then(|details| self.driver.click(&details));
        absorb_not_found(opened, "open member surface")
    }

    /// Select up to [`BATCH_THRESHOLD`] unprocessed contacts in the add-member dialog.
    ///
    /// Each selection is recorded in `ledger` before the next one starts. A
    /// `NotFound` aborts the cycle; selections made so far stay recorded.
    pub fn run_batch_cycle(
        &mut self,
        contacts: &ContactSet,
        ledger: &mut ProgressLedger,
    ) -> FaultResult<BatchResult> {
        let timing = &self.options.timing;
        let add_member = self
            .driver
            .wait_for_clickable(&Locator::AddMemberButton, timing.element)?;
        self.driver.click(&add_member)?;
        let mut search = self
            .driver
            .wait_for_visible(&Locator::MemberSearch, timing.element)?;

        let mut batch = BatchResult::default();
        for contact in contacts.iter() {
            if batch.selected.len() >= BATCH_THRESHOLD {
                break;
            }
            if ledger.contains(&contact.phone) {
                tracing::debug!(phone = %contact.phone, "skipping already processed contact");
                continue;
            }

            self.driver.click(&search)?;
            self.driver.clear(&search)?;
            self.driver.type_text(&search, &contact.phone)?;
            let result = self.driver.wait_for_clickable(
                &Locator::MemberResult(contact.name.clone()),
                timing.element,
            )?;
            self.driver.click(&result)?;
            self.clock.pause(timing.post_click_settle, "post-click settle");

            ledger.record(&contact.phone)?;
            batch.selected.push(contact.phone.clone());
            tracing::info!(
                phone = %contact.phone,
                name = %contact.name,
                in_batch = batch.selected.len(),
                "selected member"
            );

            search = self
                .driver
                .wait_for_visible(&Locator::MemberSearch, timing.element)?;
        }
        Ok(batch)
    }

    /// Finalize a batch through the confirm + acknowledgement controls.
    pub fn submit_batch(&mut self, batch: &BatchResult) -> FaultResult<SubmitOutcome> {
        let count = batch.selected.len();
        if count == 0 {
            return Ok(SubmitOutcome::Empty);
        }
        if count < BATCH_THRESHOLD && self.options.partial_batch == PartialBatchPolicy::Hold {
            tracing::info!(
                count,
                "partial batch left pending without confirm; run with --partial-batch submit to confirm it"
            );
            return Ok(SubmitOutcome::Held);
        }
        let confirmed = self.confirm_selection();
        if absorb_not_found(confirmed, "confirm batch")? {
            tracing::info!(count, "batch confirmed");
            Ok(SubmitOutcome::Confirmed)
        } else {
            Ok(SubmitOutcome::Failed)
        }
    }

    fn confirm_selection(&mut self) -> FaultResult<()> {
        let element_timeout = self.options.timing.element;
        let confirm = self
            .driver
            .wait_for_clickable(&Locator::ConfirmSelection, element_timeout)?;
        self.driver.click(&confirm)?;
        let ack = self
            .driver
            .wait_for_clickable(&Locator::AddMembersAck, element_timeout)?;
        self.driver.click(&ack)?;
        // The members are in once the acknowledgement was clicked; a dialog
        // that lingers is only worth a warning.
        let closed = self
            .driver
            .wait_for_absent(&Locator::AddMembersAck, element_timeout);
        absorb_not_found(closed, "acknowledgement close").map(|_| ())
    }

    /// Enroll every contact not yet in `ledger` into the group titled `group`.
    pub fn run(
        &mut self,
        group: &str,
        contacts: &ContactSet,
        ledger: &mut ProgressLedger,
    ) -> FaultResult<RunSummary> {
        let recorded_before = ledger.len();
        if !self.locate_group(group)? || !self.open_member_surface()? {
            let mut summary = RunSummary::new(RunOutcome::GroupUnavailable);
            summary.remaining = pending_count(contacts, ledger);
            return Ok(summary);
        }
        tracing::info!(group, "group opened");

        let mut summary = RunSummary::new(RunOutcome::CycleLimitReached);
        for cycle in 1..=self.options.max_cycles {
            if pending_count(contacts, ledger) == 0 {
                break;
            }
            summary.cycles = cycle;
            let batch = match self.run_batch_cycle(contacts, ledger) {
                Ok(batch) => batch,
                Err(Fault::NotFound { what, timeout }) => {
                    tracing::warn!(
                        cycle,
                        %what,
                        timeout_secs = timeout.as_secs(),
                        "batch cycle aborted"
                    );
                    summary.aborted_cycles += 1;
                    continue;
                }
                Err(other) => return Err(other),
            };
            match self.submit_batch(&batch)? {
                SubmitOutcome::Confirmed => {
                    ledger.confirm(&batch.selected)?;
                    summary.confirmed_batches += 1;
                }
                SubmitOutcome::Held => summary.held.extend(batch.selected),
                SubmitOutcome::Failed => summary.failed_submits += 1,
                SubmitOutcome::Empty => {}
            }
        }

        summary.selected = ledger.len().saturating_sub(recorded_before);
        summary.remaining = pending_count(contacts, ledger);
        if summary.remaining == 0 {
            summary.outcome = RunOutcome::Completed;
        }
        tracing::info!(
            cycles = summary.cycles,
            selected = summary.selected,
            confirmed = ledger.confirmed_count(),
            remaining = summary.remaining,
            "enrollment run finished"
        );
        Ok(summary)
    }
}

fn pending_count(contacts: &ContactSet, ledger: &ProgressLedger) -> usize {
    contacts
        .iter()
        .filter(|contact| !ledger.contains(&contact.phone))
        .count()
}

#[cfg(test)]
#[path = "enroll_tests.rs"]
mod tests;
