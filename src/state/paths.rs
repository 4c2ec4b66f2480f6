//! Typed paths into the state directory.
use std::path::{Path, PathBuf};

/// Convenience wrapper for locating persisted artifacts.
#[derive(Debug, Clone)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the state root: explicit path, else `<data_local_dir>/genroll`.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path.to_path_buf()));
        }
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow::anyhow!("cannot determine a state directory; pass --state-dir"))?;
        Ok(Self::new(data_dir.join("genroll")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `config.json` path.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Return the `session.json` path.
    pub fn session_path(&self) -> PathBuf {
        self.root.join("session.json")
    }

    /// Return the `ledgers/` directory path.
    pub fn ledgers_dir(&self) -> PathBuf {
        self.root.join("ledgers")
    }

    /// Return the ledger path for one group title.
    pub fn ledger_path(&self, group: &str) -> PathBuf {
        self.ledgers_dir().join(format!("{}.json", group_slug(group)))
    }
}

/// File-name-safe slug for a group title.
///
/// Alphanumerics are kept (lower-cased), runs of anything else collapse to a
/// single `-`. Titles that differ only in punctuation share a slug, so the
/// raw title's byte length is appended to keep them apart in common cases.
pub fn group_slug(group: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in group.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("group");
    }
    format!("{slug}-{}", group.len())
}
