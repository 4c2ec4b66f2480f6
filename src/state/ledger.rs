//! Progress ledger: the phone keys already processed for one group.
//!
//! Entries are recorded as provisional the moment a contact is selected in the
//! UI and promoted to confirmed once the batch confirm completes. Both states
//! count as processed; the ledger only grows.
use super::{now_epoch_ms, write_json_durable, LEDGER_SCHEMA_VERSION};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Selected in the UI; the batch confirm has not (yet) succeeded.
    Provisional,
    /// The batch containing this contact was confirmed.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LedgerEntry {
    pub state: EntryState,
    pub updated_at_epoch_ms: u128,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct LedgerFile {
    schema_version: u32,
    #[serde(default)]
    entries: BTreeMap<String, LedgerEntry>,
}

/// Durable, append-only record of processed phone keys.
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    entries: BTreeMap<String, LedgerEntry>,
}

impl ProgressLedger {
    /// Load the ledger at `path`, or start empty when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = match std::fs::read(path) {
            Ok(bytes) => {
                let file: LedgerFile = serde_json::from_slice(&bytes)
                    .with_context(|| format!("parse ledger {}", path.display()))?;
                if file.schema_version != LEDGER_SCHEMA_VERSION {
                    return Err(anyhow!(
                        "unsupported ledger schema_version {} in {}",
                        file.schema_version,
                        path.display()
                    ));
                }
                file.entries
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("read ledger {}", path.display()));
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the phone was already processed, provisionally or confirmed.
    pub fn contains(&self, phone: &str) -> bool {
        self.entries.contains_key(phone)
    }

    pub fn state(&self, phone: &str) -> Option<EntryState> {
        self.entries.get(phone).map(|entry| entry.state)
    }

    /// Record a freshly selected phone as provisional and flush to disk.
    ///
    /// Returns only after the write is durable. Already-present phones are
    /// left untouched.
    pub fn record(&mut self, phone: &str) -> Result<()> {
        if self.contains(phone) {
            return Ok(());
        }
        self.entries.insert(
            phone.to_string(),
            LedgerEntry {
                state: EntryState::Provisional,
                updated_at_epoch_ms: now_epoch_ms()?,
            },
        );
        self.persist()
    }

    /// Promote recorded phones to confirmed with a single durable write.
    pub fn confirm(&mut self, phones: &[String]) -> Result<()> {
        let now = now_epoch_ms()?;
        let mut changed = false;
        for phone in phones {
            let entry = self
                .entries
                .get_mut(phone)
                .ok_or_else(|| anyhow!("cannot confirm {phone}: not recorded"))?;
            if entry.state != EntryState::Confirmed {
                entry.state = EntryState::Confirmed;
                entry.updated_at_epoch_ms = now;
                changed = true;
            }
        }
        if changed {
            self.persist()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn confirmed_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.state == EntryState::Confirmed)
            .count()
    }

    /// Phones selected in some earlier cycle whose batch never confirmed.
    pub fn provisional(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.state == EntryState::Provisional)
            .map(|(phone, _)| phone.as_str())
    }

    fn persist(&self) -> Result<()> {
        let file = LedgerFile {
            schema_version: LEDGER_SCHEMA_VERSION,
            entries: self.entries.clone(),
        };
        write_json_durable(&self.path, &file)
            .with_context(|| format!("persist ledger {}", self.path.display()))
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
