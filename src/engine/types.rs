//! Credential data types shared by every backend
//!
//! Field names on the wire (IPC payloads, structured import/export) use the
//! PascalCase names the desktop client has always used (`Name`, `Username`,
//! `Secret`, `Url`, `IsPinned`). Column names in storage are snake_case.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::error::{EngineError, EngineResult};

/// Backend-assigned credential identifier
pub type CredentialId = i64;

/// A stored credential, as returned by a repository.
///
/// `id`, `created_at` and `modified_at` are assigned by the backend and are
/// never taken from callers.
#[derive(Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialRecord {
    pub id: CredentialId,
    pub name: String,
    pub username: String,
    pub secret: String,
    pub url: Option<String>,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("url", &self.url)
            .field("is_pinned", &self.is_pinned)
            .field("created_at", &self.created_at)
            .field("modified_at", &self.modified_at)
            .finish()
    }
}

/// Insertable subset of a credential (everything except id and timestamps)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewCredential {
    pub name: String,
    pub username: String,
    #[serde(alias = "Password")]
    pub secret: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
}

impl NewCredential {
    pub fn new(
        name: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            secret: secret.into(),
            url: None,
            is_pinned: false,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn pinned(mut self, is_pinned: bool) -> Self {
        self.is_pinned = is_pinned;
        self
    }

    /// Checks the required columns before anything reaches storage.
    pub fn validate(&self) -> EngineResult<()> {
        require(CredentialField::Name, &self.name)?;
        require(CredentialField::Username, &self.username)?;
        require(CredentialField::Secret, &self.secret)
    }
}

impl From<&CredentialRecord> for NewCredential {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            name: record.name.clone(),
            username: record.username.clone(),
            secret: record.secret.clone(),
            url: record.url.clone(),
            is_pinned: record.is_pinned,
        }
    }
}

impl fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("url", &self.url)
            .field("is_pinned", &self.is_pinned)
            .finish()
    }
}

fn require(field: CredentialField, value: &str) -> EngineResult<()> {
    if value.trim().is_empty() {
        return Err(EngineError::persistence(format!(
            "{} is required",
            field.key()
        )));
    }
    Ok(())
}

/// The mutable credential fields. This is the complete set of columns an
/// update may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    Name,
    Username,
    Secret,
    Url,
    IsPinned,
}

impl CredentialField {
    pub const ALL: [CredentialField; 5] = [
        CredentialField::Name,
        CredentialField::Username,
        CredentialField::Secret,
        CredentialField::Url,
        CredentialField::IsPinned,
    ];

    /// Storage column name
    pub fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Username => "username",
            Self::Secret => "secret",
            Self::Url => "url",
            Self::IsPinned => "is_pinned",
        }
    }

    /// Wire name used by the client and by import/export payloads
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Username => "Username",
            Self::Secret => "Secret",
            Self::Url => "Url",
            Self::IsPinned => "IsPinned",
        }
    }

    /// Resolves a wire name. `Password` is accepted for `Secret`, older
    /// clients sent that key.
    pub fn from_key(key: &str) -> EngineResult<Self> {
        match key {
            "Name" => Ok(Self::Name),
            "Username" => Ok(Self::Username),
            "Secret" | "Password" => Ok(Self::Secret),
            "Url" => Ok(Self::Url),
            "IsPinned" => Ok(Self::IsPinned),
            other => Err(EngineError::unknown_field(other)),
        }
    }
}

/// Partial update: only the fields that are `Some` are written.
///
/// `url` is doubly optional so that a patch can clear the URL
/// (`Some(None)`) as well as leave it alone (`None`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub url: Option<Option<String>>,
    pub is_pinned: Option<bool>,
}

impl CredentialPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn url(mut self, url: Option<String>) -> Self {
        self.url = Some(url);
        self
    }

    pub fn is_pinned(mut self, is_pinned: bool) -> Self {
        self.is_pinned = Some(is_pinned);
        self
    }

    /// Fields present in this patch, in canonical column order
    pub fn fields(&self) -> Vec<CredentialField> {
        CredentialField::ALL
            .into_iter()
            .filter(|field| match field {
                CredentialField::Name => self.name.is_some(),
                CredentialField::Username => self.username.is_some(),
                CredentialField::Secret => self.secret.is_some(),
                CredentialField::Url => self.url.is_some(),
                CredentialField::IsPinned => self.is_pinned.is_some(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Rejects empty patches and blank values for required fields.
    pub fn validate(&self) -> EngineResult<()> {
        if self.is_empty() {
            return Err(EngineError::invalid_patch("no fields to update"));
        }
        if let Some(name) = &self.name {
            require(CredentialField::Name, name)?;
        }
        if let Some(username) = &self.username {
            require(CredentialField::Username, username)?;
        }
        if let Some(secret) = &self.secret {
            require(CredentialField::Secret, secret)?;
        }
        Ok(())
    }

    /// Builds a patch from an untrusted JSON object, checking every key
    /// against the allowed field set.
    pub fn from_json(value: &serde_json::Value) -> EngineResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| EngineError::invalid_patch("update payload must be an object"))?;

        let mut patch = Self::default();
        for (key, value) in object {
            let field = CredentialField::from_key(key)?;
            match field {
                CredentialField::Name => patch.name = Some(json_string(field, value)?),
                CredentialField::Username => patch.username = Some(json_string(field, value)?),
                CredentialField::Secret => patch.secret = Some(json_string(field, value)?),
                CredentialField::Url => {
                    patch.url = Some(match value {
                        serde_json::Value::Null => None,
                        other => Some(json_string(field, other)?),
                    })
                }
                CredentialField::IsPinned => {
                    patch.is_pinned = Some(value.as_bool().ok_or_else(|| {
                        EngineError::invalid_patch(format!("{} must be a boolean", field.key()))
                    })?)
                }
            }
        }

        Ok(patch)
    }
}

fn json_string(field: CredentialField, value: &serde_json::Value) -> EngineResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EngineError::invalid_patch(format!("{} must be a string", field.key())))
}

/// Storage technology behind a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Local single-file database (SQLite)
    EmbeddedFile,
    /// Database server reached through a DSN (MySQL / MariaDB)
    ClientServer,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmbeddedFile => "embedded-file",
            Self::ClientServer => "client-server",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "embedded-file" | "sqlite" | "SQLite" => Ok(Self::EmbeddedFile),
            "client-server" | "mysql" | "MySQL" => Ok(Self::ClientServer),
            other => Err(EngineError::unsupported_backend(other)),
        }
    }
}

/// A saved connection profile.
///
/// Profiles live in the application settings and are replaced wholesale,
/// never edited in place. The backend is kept as the string the settings
/// file carries and only resolved when the registry binds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConnection {
    /// Stable user-facing identity of the profile
    pub id: u32,
    /// Display label
    pub name: String,
    /// Backend identifier (`embedded-file` or `client-server`)
    pub backend: String,
    /// File path or server DSN
    pub connection_string: String,
}

impl RepositoryConnection {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        backend: BackendKind,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            backend: backend.as_str().to_string(),
            connection_string: connection_string.into(),
        }
    }

    pub fn backend_kind(&self) -> EngineResult<BackendKind> {
        self.backend.parse()
    }
}
