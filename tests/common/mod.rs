//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scratch state directory plus a contacts file, driving the built binary.
pub struct StateFixture {
    pub dir: TempDir,
}

impl StateFixture {
    pub fn create() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// Write a vCard file with one card per `(phone, name)` pair.
    pub fn write_contacts(&self, contacts: &[(&str, &str)]) -> PathBuf {
        let mut text = String::new();
        for (phone, name) in contacts {
            text.push_str("BEGIN:VCARD\r\nVERSION:3.0\r\n");
            text.push_str(&format!("FN:{name}\r\nTEL;TYPE=CELL:{phone}\r\nEND:VCARD\r\n"));
        }
        let path = self.dir.path().join("contacts.vcf");
        std::fs::write(&path, text).expect("write contacts");
        path
    }

    /// Seed a group ledger in the on-disk format.
    pub fn write_ledger(&self, slug: &str, entries: &[(&str, &str)]) {
        let entries: serde_json::Map<String, Value> = entries
            .iter()
            .map(|(phone, state)| {
                (
                    phone.to_string(),
                    json!({ "state": state, "updated_at_epoch_ms": 1_700_000_000_000u64 }),
                )
            })
            .collect();
        let path = self.state_dir().join("ledgers").join(format!("{slug}.json"));
        std::fs::create_dir_all(path.parent().expect("ledger parent")).expect("create ledgers");
        let doc = json!({ "schema_version": 1, "entries": entries });
        std::fs::write(&path, serde_json::to_vec_pretty(&doc).expect("serialize ledger"))
            .expect("write ledger");
    }

    pub fn run(&self, group: &str, contacts: &Path, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_genroll"))
            .arg(group)
            .arg(contacts)
            .arg("--state-dir")
            .arg(self.state_dir())
            .args(extra)
            .env_remove("RUST_LOG")
            .output()
            .expect("run genroll")
    }
}
