//! Credential commands
//!
//! CRUD against whichever repository is active.

use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::commands::registry_of;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{CredentialId, CredentialPatch, CredentialRecord, NewCredential};
use crate::SharedState;

/// Response for list operations
#[derive(Debug, Serialize)]
pub struct CredentialListResponse {
    pub success: bool,
    pub records: Vec<CredentialRecord>,
    pub error: Option<String>,
}

/// Response for single-record lookups
#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub success: bool,
    pub record: Option<CredentialRecord>,
    pub error: Option<String>,
}

/// Response for insert, update, delete and lifecycle operations
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub id: Option<CredentialId>,
    pub error: Option<String>,
}

impl MutationResponse {
    fn from_result(result: EngineResult<Option<CredentialId>>) -> Self {
        match result {
            Ok(id) => Self {
                success: true,
                id,
                error: None,
            },
            Err(e) => Self {
                success: false,
                id: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Lists every credential of the active repository
pub async fn get_passwords(state: &SharedState) -> Result<CredentialListResponse, String> {
    let registry = registry_of(state).await;

    let result = async {
        let repository = registry.get_active().await?;
        repository.get_all().await
    }
    .await;

    match result {
        Ok(records) => Ok(CredentialListResponse {
            success: true,
            records,
            error: None,
        }),
        Err(e) => Ok(CredentialListResponse {
            success: false,
            records: Vec::new(),
            error: Some(e.to_string()),
        }),
    }
}

/// Fetches one credential; an unknown id is reported as not found
#[instrument(skip(state))]
pub async fn get_password_by_id(
    state: &SharedState,
    id: CredentialId,
) -> Result<CredentialResponse, String> {
    let registry = registry_of(state).await;

    let result = async {
        let repository = registry.get_active().await?;
        repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found(id))
    }
    .await;

    match result {
        Ok(record) => Ok(CredentialResponse {
            success: true,
            record: Some(record),
            error: None,
        }),
        Err(e) => Ok(CredentialResponse {
            success: false,
            record: None,
            error: Some(e.to_string()),
        }),
    }
}

#[instrument(skip_all)]
pub async fn insert_password(
    state: &SharedState,
    credential: NewCredential,
) -> Result<MutationResponse, String> {
    let registry = registry_of(state).await;

    let result = async {
        let repository = registry.get_active().await?;
        repository.insert(&credential).await.map(Some)
    }
    .await;

    Ok(MutationResponse::from_result(result))
}

#[instrument(skip(state, patch), fields(fields = patch.fields().len()))]
pub async fn update_password(
    state: &SharedState,
    id: CredentialId,
    patch: CredentialPatch,
) -> Result<MutationResponse, String> {
    let registry = registry_of(state).await;

    let result = async {
        let repository = registry.get_active().await?;
        repository.update(id, &patch).await.map(|()| Some(id))
    }
    .await;

    Ok(MutationResponse::from_result(result))
}

/// Updates from an untrusted JSON object keyed by field name.
///
/// A key outside the allowed field set is rejected as malformed input.
pub async fn update_password_json(
    state: &SharedState,
    id: CredentialId,
    patch: Value,
) -> Result<MutationResponse, String> {
    let patch = CredentialPatch::from_json(&patch).map_err(|e| e.to_string())?;
    update_password(state, id, patch).await
}

#[instrument(skip(state))]
pub async fn delete_password(
    state: &SharedState,
    id: CredentialId,
) -> Result<MutationResponse, String> {
    let registry = registry_of(state).await;

    let result = async {
        let repository = registry.get_active().await?;
        repository.delete(id).await.map(|()| Some(id))
    }
    .await;

    Ok(MutationResponse::from_result(result))
}

/// Creates (or reuses) the repository for a target and ensures its schema
#[instrument(skip_all, fields(backend = %backend))]
pub async fn create_database(
    state: &SharedState,
    backend: String,
    connection_string: String,
) -> Result<MutationResponse, String> {
    let registry = registry_of(state).await;
    let result = registry
        .create(&backend, &connection_string)
        .await
        .map(|_| None);

    Ok(MutationResponse::from_result(result))
}

/// Releases the active repository
pub async fn close_database(state: &SharedState) -> Result<MutationResponse, String> {
    let registry = registry_of(state).await;
    Ok(MutationResponse::from_result(registry.close().await.map(|()| None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::state_in;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn insert_then_fetch() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;

        let inserted = insert_password(&state, NewCredential::new("Bank", "alice", "s3cr3t"))
            .await
            .unwrap();
        assert!(inserted.success);
        let id = inserted.id.expect("assigned id");

        let fetched = get_password_by_id(&state, id).await.unwrap();
        let record = fetched.record.expect("record");
        assert_eq!(record.name, "Bank");
        assert!(!record.is_pinned);

        let listed = get_passwords(&state).await.unwrap();
        assert_eq!(listed.records.len(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_reported_not_found() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;

        let response = get_password_by_id(&state, 42).await.unwrap();
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some(EngineError::not_found(42).to_string().as_str())
        );
    }

    #[tokio::test]
    async fn json_patch_updates_listed_fields() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;
        let id = insert_password(&state, NewCredential::new("Bank", "alice", "s3cr3t"))
            .await
            .unwrap()
            .id
            .unwrap();

        let response = update_password_json(&state, id, json!({"Name": "X", "IsPinned": true}))
            .await
            .unwrap();
        assert!(response.success);

        let record = get_password_by_id(&state, id).await.unwrap().record.unwrap();
        assert_eq!(record.name, "X");
        assert_eq!(record.username, "alice");
        assert!(record.is_pinned);
    }

    #[tokio::test]
    async fn json_patch_with_foreign_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;

        let err = update_password_json(&state, 1, json!({"id; DROP TABLE credentials": 1}))
            .await
            .expect_err("unknown key");
        assert!(err.contains("id; DROP TABLE credentials"));
    }

    #[tokio::test]
    async fn missing_required_field_reports_failure() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;

        let response = insert_password(&state, NewCredential::new("Bank", "", "s3cr3t"))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(get_passwords(&state).await.unwrap().records.is_empty());
    }

    #[tokio::test]
    async fn closed_database_reports_not_initialized() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;

        assert!(close_database(&state).await.unwrap().success);
        let response = get_passwords(&state).await.unwrap();
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some(EngineError::NotInitialized.to_string().as_str())
        );

        let db = dir.path().join("storage").join("vault.db");
        let reopened = create_database(
            &state,
            "embedded-file".into(),
            db.to_string_lossy().into_owned(),
        )
        .await
        .unwrap();
        assert!(reopened.success);
        assert!(get_passwords(&state).await.unwrap().success);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;
        let id = insert_password(&state, NewCredential::new("Bank", "alice", "s3cr3t"))
            .await
            .unwrap()
            .id
            .unwrap();

        assert!(delete_password(&state, id).await.unwrap().success);
        assert!(delete_password(&state, id).await.unwrap().success);
        assert!(!get_password_by_id(&state, id).await.unwrap().success);
    }
}
