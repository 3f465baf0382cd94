//! SQLite Driver
//!
//! Implements the CredentialRepository trait for the embedded-file backend
//! using SQLx.
//!
//! The connection string is either a plain file path, `:memory:`, or a
//! `sqlite:` URL. The file is opened lazily on first use and the pool never
//! holds more than one connection, so every operation runs on the same
//! handle.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::schema::{CREDENTIALS_TABLE, CREDENTIAL_COLUMNS, SQLITE_SCHEMA};
use crate::engine::statement::{BindValue, UpdateStatement};
use crate::engine::traits::CredentialRepository;
use crate::engine::types::{
    BackendKind, CredentialId, CredentialPatch, CredentialRecord, NewCredential,
};

/// Embedded-file repository
pub struct SqliteRepository {
    connection_string: String,
    /// On-disk location, `None` for in-memory and URL-style locators
    database_path: Option<PathBuf>,
    /// `None` once closed
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteRepository {
    const ACQUIRE_TIMEOUT_SECS: u64 = 30;

    /// Creates the repository without touching the file yet.
    pub fn new(connection_string: &str) -> EngineResult<Self> {
        let locator = connection_string.trim();
        if locator.is_empty() {
            return Err(EngineError::persistence(
                "embedded-file connection string is empty",
            ));
        }

        let (options, database_path) = Self::build_connect_options(locator)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_secs(Self::ACQUIRE_TIMEOUT_SECS))
            .connect_lazy_with(options);

        Ok(Self {
            connection_string: locator.to_string(),
            database_path,
            pool: RwLock::new(Some(pool)),
        })
    }

    /// Builds connect options from a locator
    fn build_connect_options(
        locator: &str,
    ) -> EngineResult<(SqliteConnectOptions, Option<PathBuf>)> {
        if locator == ":memory:" {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
            return Ok((options, None));
        }

        if locator.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(locator)?.create_if_missing(true);
            return Ok((options, None));
        }

        let path = PathBuf::from(locator);
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        Ok((options, Some(path)))
    }

    async fn get_pool(&self) -> EngineResult<SqlitePool> {
        self.pool.read().await.clone().ok_or(EngineError::Closed)
    }

    /// Helper to bind a statement value to a SQLite query
    fn bind_value<'q>(
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
        value: &'q BindValue,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match value {
            BindValue::Text(s) => query.bind(s),
            BindValue::NullableText(s) => query.bind(s),
            BindValue::Bool(b) => query.bind(b),
            BindValue::Timestamp(ts) => query.bind(ts),
            BindValue::Id(id) => query.bind(id),
        }
    }
}

#[async_trait]
impl CredentialRepository for SqliteRepository {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::EmbeddedFile
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    #[instrument(skip(self), fields(path = %self.connection_string))]
    async fn create_database(&self) -> EngineResult<()> {
        let pool = self.get_pool().await?;

        if let Some(parent) = self.database_path.as_ref().and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        for stmt in SQLITE_SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }

        debug!("embedded-file schema ensured");
        Ok(())
    }

    async fn get_all(&self) -> EngineResult<Vec<CredentialRecord>> {
        let pool = self.get_pool().await?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id",
            CREDENTIAL_COLUMNS, CREDENTIALS_TABLE
        );

        let records = sqlx::query_as::<_, CredentialRecord>(&sql)
            .fetch_all(&pool)
            .await?;
        Ok(records)
    }

    async fn get_by_id(&self, id: CredentialId) -> EngineResult<Option<CredentialRecord>> {
        let pool = self.get_pool().await?;
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            CREDENTIAL_COLUMNS, CREDENTIALS_TABLE
        );

        let record = sqlx::query_as::<_, CredentialRecord>(&sql)
            .bind(id)
            .fetch_optional(&pool)
            .await?;
        Ok(record)
    }

    async fn insert(&self, credential: &NewCredential) -> EngineResult<CredentialId> {
        credential.validate()?;
        let pool = self.get_pool().await?;
        let sql = format!(
            "INSERT INTO {} (name, username, secret, url, is_pinned) VALUES (?, ?, ?, ?, ?)",
            CREDENTIALS_TABLE
        );

        let result = sqlx::query(&sql)
            .bind(&credential.name)
            .bind(&credential.username)
            .bind(&credential.secret)
            .bind(&credential.url)
            .bind(credential.is_pinned)
            .execute(&pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    async fn update(&self, id: CredentialId, patch: &CredentialPatch) -> EngineResult<()> {
        let stmt = UpdateStatement::build(id, patch, Utc::now())?;
        let pool = self.get_pool().await?;

        let mut query = sqlx::query(&stmt.sql);
        for value in &stmt.values {
            query = Self::bind_value(query, value);
        }

        // changes() does not count rows touched by the maintenance trigger
        let result = query.execute(&pool).await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(id));
        }

        Ok(())
    }

    async fn delete(&self, id: CredentialId) -> EngineResult<()> {
        let pool = self.get_pool().await?;
        let sql = format!("DELETE FROM {} WHERE id = ?", CREDENTIALS_TABLE);

        sqlx::query(&sql).bind(id).execute(&pool).await?;
        Ok(())
    }

    async fn close(&self) -> EngineResult<()> {
        let pool = self.pool.write().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            debug!(path = %self.connection_string, "embedded-file repository closed");
        }
        Ok(())
    }

    async fn is_closed(&self) -> bool {
        self.pool.read().await.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn open_repository(dir: &tempfile::TempDir) -> SqliteRepository {
        let path = dir.path().join("vault.db");
        let repo = SqliteRepository::new(path.to_str().expect("utf-8 path"))
            .expect("should create repository");
        repo.create_database().await.expect("schema should be created");
        repo
    }

    fn bank() -> NewCredential {
        NewCredential::new("Bank", "alice", "s3cr3t").with_url("bank.example")
    }

    #[tokio::test]
    async fn first_insert_gets_id_one_and_is_not_pinned() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;

        let id = repo.insert(&bank()).await.expect("insert should succeed");
        assert_eq!(id, 1);

        let record = repo.get_by_id(id).await.unwrap().expect("record should exist");
        assert_eq!(record.name, "Bank");
        assert_eq!(record.username, "alice");
        assert_eq!(record.secret, "s3cr3t");
        assert_eq!(record.url.as_deref(), Some("bank.example"));
        assert!(!record.is_pinned);
        assert!(record.modified_at >= record.created_at);
    }

    #[tokio::test]
    async fn update_changes_only_supplied_field_and_advances_modified_at() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;
        let id = repo.insert(&bank()).await.unwrap();
        let before = repo.get_by_id(id).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        repo.update(id, &CredentialPatch::new().name("X"))
            .await
            .expect("update should succeed");

        let after = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(after.name, "X");
        assert_eq!(after.username, before.username);
        assert_eq!(after.secret, before.secret);
        assert_eq!(after.url, before.url);
        assert_eq!(after.is_pinned, before.is_pinned);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.modified_at > before.modified_at);
    }

    #[tokio::test]
    async fn update_can_clear_url() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;
        let id = repo.insert(&bank()).await.unwrap();

        repo.update(id, &CredentialPatch::new().url(None).is_pinned(true))
            .await
            .unwrap();

        let record = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.url, None);
        assert!(record.is_pinned);
    }

    #[tokio::test]
    async fn update_of_missing_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;

        let err = repo
            .update(42, &CredentialPatch::new().name("X"))
            .await
            .expect_err("no such record");
        assert!(matches!(err, EngineError::NotFound { id: 42 }));
    }

    #[tokio::test]
    async fn trigger_refreshes_modified_at_for_direct_updates() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;
        let id = repo.insert(&bank()).await.unwrap();
        let before = repo.get_by_id(id).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let pool = repo.get_pool().await.unwrap();
        sqlx::query("UPDATE credentials SET is_pinned = 1 WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let after = repo.get_by_id(id).await.unwrap().unwrap();
        assert!(after.is_pinned);
        assert!(after.modified_at > before.modified_at);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;
        let id = repo.insert(&bank()).await.unwrap();

        repo.delete(id).await.expect("delete should succeed");
        assert!(repo.get_by_id(id).await.unwrap().is_none());
        repo.delete(id).await.expect("second delete should also succeed");
    }

    #[tokio::test]
    async fn insert_without_required_field_fails_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;

        let err = repo
            .insert(&NewCredential::new("Bank", "alice", ""))
            .await
            .expect_err("secret is required");
        assert!(matches!(err, EngineError::Persistence { .. }));
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_all_returns_records_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;

        for name in ["a", "b", "c"] {
            repo.insert(&NewCredential::new(name, "u", "p")).await.unwrap();
        }

        let names: Vec<String> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn create_database_is_idempotent_and_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;
        repo.insert(&bank()).await.unwrap();

        repo.create_database().await.expect("second call should succeed");
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_database_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage").join("nested").join("vault.db");
        let repo = SqliteRepository::new(path.to_str().unwrap()).unwrap();

        repo.create_database().await.expect("should create parents");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn in_memory_locator_is_supported() {
        let repo = SqliteRepository::new(":memory:").unwrap();
        repo.create_database().await.unwrap();

        let id = repo.insert(&bank()).await.unwrap();
        assert!(repo.get_by_id(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn closed_repository_rejects_operations() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repository(&dir).await;

        repo.close().await.expect("close should succeed");
        repo.close().await.expect("closing twice is a no-op");
        assert!(repo.is_closed().await);

        let err = repo.get_all().await.expect_err("repository is closed");
        assert!(matches!(err, EngineError::Closed));
        let err = repo.insert(&bank()).await.expect_err("repository is closed");
        assert!(matches!(err, EngineError::Closed));
    }

    #[test]
    fn empty_locator_is_rejected() {
        let err = SqliteRepository::new("   ").err().expect("empty locator");
        assert!(matches!(err, EngineError::Persistence { .. }));
    }
}
