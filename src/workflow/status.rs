//! Read-only progress report for a group's ledger.
use crate::contacts::ContactSet;
use crate::state::{EntryState, ProgressLedger};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub group: String,
    pub ledger_path: String,
    pub total: usize,
    pub confirmed: usize,
    pub provisional: usize,
    pub pending: usize,
    /// Selected in the UI but never confirmed; check these by hand.
    pub provisional_phones: Vec<String>,
    /// Ledger entries with no matching contact in the current file.
    pub untracked: usize,
}

pub fn status_report(group: &str, contacts: &ContactSet, ledger: &ProgressLedger) -> StatusReport {
    let mut report = StatusReport {
        group: group.to_string(),
        ledger_path: ledger.path().display().to_string(),
        total: contacts.len(),
        confirmed: 0,
        provisional: 0,
        pending: 0,
        provisional_phones: Vec::new(),
        untracked: 0,
    };
    for contact in contacts.iter() {
        match ledger.state(&contact.phone) {
            Some(EntryState::Confirmed) => report.confirmed += 1,
            Some(EntryState::Provisional) => report.provisional += 1,
            None => report.pending += 1,
        }
    }
    report.provisional_phones = ledger
        .provisional()
        .filter(|phone| contacts.get(phone).is_some())
        .map(str::to_string)
        .collect();
    report.untracked = ledger.len() - (report.confirmed + report.provisional);
    report
}

pub fn render_status(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "group: {}", report.group);
    let _ = writeln!(out, "ledger: {}", report.ledger_path);
    let _ = writeln!(
        out,
        "contacts: {} (confirmed {}, provisional {}, pending {})",
        report.total, report.confirmed, report.provisional, report.pending
    );
    if report.untracked > 0 {
        let _ = writeln!(out, "ledger entries not in contact file: {}", report.untracked);
    }
    if !report.provisional_phones.is_empty() {
        let _ = writeln!(out, "selected but never confirmed:");
        for phone in &report.provisional_phones {
            let _ = writeln!(out, "  {phone}");
        }
    }
    out
}
