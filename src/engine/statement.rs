//! Parameterized UPDATE builder
//!
//! Partial updates touch exactly the columns present in a
//! [`CredentialPatch`], plus `modified_at`. Column names come from the fixed
//! [`CredentialField`] set, never from caller input, and every value is a
//! bind parameter. Both backends use `?` placeholders, so one builder
//! serves both.

use chrono::{DateTime, Utc};

use crate::engine::error::EngineResult;
use crate::engine::schema::CREDENTIALS_TABLE;
use crate::engine::types::{CredentialField, CredentialId, CredentialPatch};

/// A value to bind, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    NullableText(Option<String>),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Id(CredentialId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub sql: String,
    pub values: Vec<BindValue>,
    /// Fields written by this statement, `modified_at` excluded
    pub fields: Vec<CredentialField>,
}

impl UpdateStatement {
    /// Builds `UPDATE credentials SET <fields>, modified_at = ? WHERE id = ?`.
    ///
    /// Fails if the patch is empty or blanks a required field.
    pub fn build(
        id: CredentialId,
        patch: &CredentialPatch,
        modified_at: DateTime<Utc>,
    ) -> EngineResult<Self> {
        patch.validate()?;

        let fields = patch.fields();
        let mut assignments = Vec::with_capacity(fields.len() + 1);
        let mut values = Vec::with_capacity(fields.len() + 2);

        for field in &fields {
            assignments.push(format!("{} = ?", field.column()));
            values.push(match field {
                CredentialField::Name => BindValue::Text(patch.name.clone().unwrap_or_default()),
                CredentialField::Username => {
                    BindValue::Text(patch.username.clone().unwrap_or_default())
                }
                CredentialField::Secret => {
                    BindValue::Text(patch.secret.clone().unwrap_or_default())
                }
                CredentialField::Url => BindValue::NullableText(patch.url.clone().flatten()),
                CredentialField::IsPinned => BindValue::Bool(patch.is_pinned.unwrap_or_default()),
            });
        }

        assignments.push("modified_at = ?".to_string());
        values.push(BindValue::Timestamp(modified_at));
        values.push(BindValue::Id(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            CREDENTIALS_TABLE,
            assignments.join(", ")
        );

        Ok(Self {
            sql,
            values,
            fields,
        })
    }
}
