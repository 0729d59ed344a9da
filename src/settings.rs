//! Persisted client state: the passkey and the theme preference.
//!
//! Stored as a small JSON file at a path the caller chooses.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::client::ClientError;
use crate::options::SecretString;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    passkey: Option<String>,

    #[serde(default)]
    pub dark_theme: bool,
}

impl Settings {
    /// The stored passkey. Empty strings count as absent.
    pub fn passkey(&self) -> Option<SecretString> {
        self.passkey
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(SecretString::from)
    }

    /// Remember a passkey, as the login view does after a successful check.
    pub fn set_passkey(&mut self, passkey: &SecretString) {
        self.passkey = Some(passkey.expose_secret().to_string());
    }

    /// Forget the passkey (logout).
    pub fn clear_passkey(&mut self) {
        self.passkey = None;
    }
}

/// Reads and writes [`Settings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields the defaults.
    pub fn load(&self) -> Result<Settings, ClientError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write settings, creating parent directories as needed.
    pub fn save(&self, settings: &Settings) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(settings)?)?;
        Ok(())
    }
}
