//! Persisted browser session (cookie set) so re-runs skip interactive login.
use super::{now_epoch_ms, write_json_durable, SESSION_SCHEMA_VERSION};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One cookie as reported by the WebDriver `Get All Cookies` command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

/// Opaque authenticated-session artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SessionToken {
    pub cookies: Vec<Cookie>,
}

impl SessionToken {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct SessionFile {
    schema_version: u32,
    saved_at_epoch_ms: u128,
    cookies: SessionToken,
}

/// File-backed store for the [`SessionToken`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved token, `None` when nothing was saved yet.
    pub fn load(&self) -> Result<Option<SessionToken>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("read session {}", self.path.display()))
            }
        };
        let file: SessionFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse session {}", self.path.display()))?;
        if file.schema_version != SESSION_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported session schema_version {} in {}",
                file.schema_version,
                self.path.display()
            ));
        }
        Ok(Some(file.cookies))
    }

    /// Durably overwrite the saved token.
    pub fn save(&self, token: &SessionToken) -> Result<()> {
        let file = SessionFile {
            schema_version: SESSION_SCHEMA_VERSION,
            saved_at_epoch_ms: now_epoch_ms()?,
            cookies: token.clone(),
        };
        write_json_durable(&self.path, &file)
            .with_context(|| format!("persist session {}", self.path.display()))
    }
}
