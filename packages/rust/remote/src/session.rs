//! Persisted login state for the recipe service.
//!
//! The context is loaded once at process start, handed to every client call
//! by `&mut`, and saved back at the end of the run.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use brewsync_shared::{BrewSyncError, Result};

/// Username, page metadata and cookies of an authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub username: Option<String>,

    /// The `window.Grainfather` object of the recipe creator's start page.
    #[serde(default)]
    pub metadata: Option<Value>,

    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

impl SessionContext {
    /// A fresh, unauthenticated context for `username`.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// Read a persisted context. A missing or unreadable file yields `None`.
    pub fn load(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!(?path, error = %e, "no session state");
                return None;
            }
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(context) => {
                info!(?path, "read session state");
                Some(context)
            }
            Err(e) => {
                debug!(?path, error = %e, "invalid session state");
                None
            }
        }
    }

    /// Write the context as pretty JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| BrewSyncError::io(dir, e))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BrewSyncError::session(format!("failed to encode session state: {e}")))?;
        std::fs::write(path, content).map_err(|e| BrewSyncError::io(path, e))?;
        info!(?path, "saved session state");
        Ok(())
    }

    /// Delete a persisted context. Absence is not an error.
    pub fn remove(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!(?path, "removed session state");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BrewSyncError::io(path, e)),
        }
    }

    /// Whether a login has populated the metadata.
    pub fn is_authenticated(&self) -> bool {
        self.metadata.is_some()
    }

    /// Whether the context belongs to `username` (an anonymous context belongs to anybody).
    pub fn belongs_to(&self, username: &str) -> bool {
        self.username.as_deref().is_none_or(|u| u == username)
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("csrfToken")?.as_str()
    }

    pub fn api_token(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("user")?.get("api_token")?.as_str()
    }

    /// Take over every cookie set by a response.
    pub fn absorb_cookies(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let pair = raw.split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    self.cookies.insert(name.to_string(), value.trim().to_string());
                }
            }
        }
    }

    /// The `Cookie` request header value, if any cookie is held.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Forget metadata and cookies, keeping the username.
    pub fn clear(&mut self) {
        self.metadata = None;
        self.cookies.clear();
    }
}
