//! Import / export pipeline
//!
//! Moves credentials between the active repository and external files. The
//! pipeline only talks to storage through [`CredentialRepository`], never
//! through backend internals.
//!
//! Two payload formats are supported, picked by file extension:
//! - tabular (`.csv`): header `Name,Username,Secret,Url[,IsPinned]`
//! - structured (`.json`): array of objects with the same field names
//!
//! [`CredentialRepository`]: crate::engine::CredentialRepository

pub mod export;
pub mod import;
pub mod structured;
pub mod tabular;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{CredentialField, NewCredential};

pub use export::{export_file, render};
pub use import::{import_file, import_rows};

/// Payload format, chosen from the file extension only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferFormat {
    Csv,
    Json,
}

impl TransferFormat {
    /// Resolves the format of a file. No content sniffing: an unknown
    /// extension is rejected before the file is opened.
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(EngineError::unsupported_file_type(format!(".{}", other))),
        }
    }
}

/// One import row as read from the payload. Values are kept raw so that a
/// malformed field fails its own row at insert time instead of the whole
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImportRow {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub username: Option<Value>,
    #[serde(default, alias = "Password")]
    pub secret: Option<Value>,
    #[serde(default)]
    pub url: Option<Value>,
    #[serde(default)]
    pub is_pinned: Option<Value>,
}

impl ImportRow {
    /// Maps the row onto the insertable field set. `IsPinned` defaults to
    /// false, empty `Url` cells are treated as absent. A value of the wrong
    /// type is a `Parse` error for this row only.
    pub fn into_credential(self) -> EngineResult<NewCredential> {
        Ok(NewCredential {
            name: text(CredentialField::Name, self.name)?,
            username: text(CredentialField::Username, self.username)?,
            secret: text(CredentialField::Secret, self.secret)?,
            url: Some(text(CredentialField::Url, self.url)?).filter(|url| !url.is_empty()),
            is_pinned: flag(self.is_pinned)?,
        })
    }
}

fn text(field: CredentialField, value: Option<Value>) -> EngineResult<String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text),
        Some(other) => Err(EngineError::parse(format!(
            "{} must be text, got {}",
            field.key(),
            other
        ))),
    }
}

/// Accepts `true/false`, `1/0`, `yes/no` in either payload format
fn flag(value: Option<Value>) -> EngineResult<bool> {
    let parsed = match &value {
        None | Some(Value::Null) => Some(false),
        Some(Value::Bool(value)) => Some(*value),
        Some(Value::Number(number)) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "no" | "0" => Some(false),
            "true" | "yes" | "1" => Some(true),
            _ => None,
        },
        Some(_) => None,
    };

    parsed.ok_or_else(|| {
        let shown = match value {
            Some(Value::String(text)) => text,
            other => other.map(|v| v.to_string()).unwrap_or_default(),
        };
        EngineError::parse(format!("invalid IsPinned value: {}", shown))
    })
}

/// Parses a whole payload. A structural error aborts before a single row
/// is used; field values are checked per row later.
pub fn parse_rows(format: TransferFormat, content: &str) -> EngineResult<Vec<ImportRow>> {
    match format {
        TransferFormat::Csv => tabular::parse_rows(content),
        TransferFormat::Json => structured::parse_rows(content),
    }
}

/// Counts reported by an import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    /// Rows inserted
    pub imported: usize,
    /// Rows skipped because `(Name, Username)` already existed
    pub duplicates: usize,
    /// Rows with an unusable field, or that the repository refused
    pub failed: usize,
}

impl ImportOutcome {
    pub fn processed(&self) -> usize {
        self.imported + self.duplicates + self.failed
    }
}
