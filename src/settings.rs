//! Application settings.
//!
//! Connection profiles and the default profile id are persisted to a
//! per-user config file. Environment variables override the default
//! profile's target to allow managed deployments to pin the store. The
//! override is applied to a runtime view only and is never written back.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{BackendKind, RepositoryConnection};

const SETTINGS_FILE: &str = "settings.json";
const DEFAULT_DATABASE_FILE: &str = "password-manager.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub connections: Vec<RepositoryConnection>,
    pub default_connection_id: u32,
}

fn env_string_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Per-user application directory (`%APPDATA%\PassKeep` or `~/.passkeep`)
pub fn app_directory() -> PathBuf {
    if cfg!(windows) {
        let appdata = std::env::var_os("APPDATA")
            .unwrap_or_else(|| std::env::var_os("USERPROFILE").unwrap_or_default());
        let mut path = PathBuf::from(appdata);
        path.push("PassKeep");
        path
    } else {
        let home = std::env::var_os("HOME").unwrap_or_default();
        let mut path = PathBuf::from(home);
        path.push(".passkeep");
        path
    }
}

pub fn config_path() -> PathBuf {
    app_directory().join(SETTINGS_FILE)
}

fn default_database_path() -> PathBuf {
    app_directory().join("storage").join(DEFAULT_DATABASE_FILE)
}

/// Default-profile target pinned by `PASSKEEP_BACKEND` and
/// `PASSKEEP_CONNECTION_STRING`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverride {
    pub backend: Option<String>,
    pub connection_string: Option<String>,
}

impl ConnectionOverride {
    pub fn from_env() -> Self {
        Self {
            backend: env_string_opt("PASSKEEP_BACKEND"),
            connection_string: env_string_opt("PASSKEEP_CONNECTION_STRING"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_none() && self.connection_string.is_none()
    }
}

impl AppSettings {
    pub fn defaults() -> Self {
        let local = RepositoryConnection::new(
            1,
            "Local",
            BackendKind::EmbeddedFile,
            default_database_path().to_string_lossy(),
        );
        Self {
            default_connection_id: local.id,
            connections: vec![local],
        }
    }

    /// The settings as the running app sees them, with `pin` applied to the
    /// default profile. The result is for lookups only; persist the
    /// unmodified settings.
    pub fn with_override(&self, pin: &ConnectionOverride) -> Self {
        let mut effective = self.clone();
        if pin.is_empty() {
            return effective;
        }

        let default_id = effective.default_connection_id;
        if let Some(profile) = effective.connections.iter_mut().find(|c| c.id == default_id) {
            if let Some(backend) = &pin.backend {
                profile.backend = backend.clone();
            }
            if let Some(connection_string) = &pin.connection_string {
                profile.connection_string = connection_string.clone();
            }
            debug!(id = default_id, "default connection overridden from environment");
        }
        effective
    }

    /// Reads settings from `path`. A missing file is not an error; a file
    /// that exists but does not parse is.
    pub fn load_from(path: &Path) -> EngineResult<Option<Self>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let settings: Self = serde_json::from_str(&raw)
            .map_err(|e| EngineError::config(format!("Invalid settings file: {}", e)))?;
        settings.validate()?;
        Ok(Some(settings))
    }

    /// Stored settings, or defaults when nothing usable is stored
    pub fn load() -> Self {
        match Self::load_from(&config_path()) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::defaults(),
            Err(e) => {
                warn!(error = %e, "falling back to default settings");
                Self::defaults()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> EngineResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let payload = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::config(format!("Save failed: {}", e)))?;
        fs::write(path, payload)?;
        Ok(())
    }

    /// Writes the settings to `path` if nothing is stored there yet
    pub fn ensure_persisted(&self, path: &Path) -> EngineResult<()> {
        if path.exists() {
            return Ok(());
        }
        self.save_to(path)
    }

    /// Removes the stored file and returns the defaults
    pub fn reset(path: &Path) -> EngineResult<Self> {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self::defaults())
    }

    /// The default profile must exist and ids must be unique
    pub fn validate(&self) -> EngineResult<()> {
        for (index, profile) in self.connections.iter().enumerate() {
            if self.connections[..index].iter().any(|c| c.id == profile.id) {
                return Err(EngineError::config(format!(
                    "Duplicate connection id {}",
                    profile.id
                )));
            }
        }
        self.default_connection().map(|_| ())
    }

    pub fn connection(&self, id: u32) -> Option<&RepositoryConnection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn default_connection(&self) -> EngineResult<&RepositoryConnection> {
        self.connection(self.default_connection_id).ok_or_else(|| {
            EngineError::config(format!(
                "Default connection {} is not configured",
                self.default_connection_id
            ))
        })
    }

    /// Replaces the profile with the same id, or appends it
    pub fn upsert_connection(&mut self, profile: RepositoryConnection) -> EngineResult<()> {
        profile.backend_kind()?;
        match self.connections.iter_mut().find(|c| c.id == profile.id) {
            Some(existing) => *existing = profile,
            None => self.connections.push(profile),
        }
        Ok(())
    }

    pub fn remove_connection(&mut self, id: u32) -> EngineResult<RepositoryConnection> {
        if id == self.default_connection_id {
            return Err(EngineError::config("The default connection cannot be removed"));
        }
        let index = self
            .connections
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| EngineError::config(format!("Connection {} not found", id)))?;
        Ok(self.connections.remove(index))
    }

    pub fn set_default(&mut self, id: u32) -> EngineResult<()> {
        if self.connection(id).is_none() {
            return Err(EngineError::config(format!("Connection {} not found", id)));
        }
        self.default_connection_id = id;
        Ok(())
    }

    /// One past the highest profile id
    pub fn next_connection_id(&self) -> u32 {
        self.connections.iter().map(|c| c.id).max().unwrap_or(0) + 1
    }
}
