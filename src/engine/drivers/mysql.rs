//! MySQL Driver
//!
//! Implements the CredentialRepository trait for the client-server backend
//! (MySQL / MariaDB) using SQLx.
//!
//! The connection string is a `mysql://` (or `mariadb://`) DSN. One pooled
//! connection is established lazily on first use; the pool is capped at a
//! single connection so operations serialize on it.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::query::Query;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::schema::{CREDENTIALS_TABLE, CREDENTIAL_COLUMNS, MYSQL_SCHEMA};
use crate::engine::statement::{BindValue, UpdateStatement};
use crate::engine::traits::CredentialRepository;
use crate::engine::types::{
    BackendKind, CredentialId, CredentialPatch, CredentialRecord, NewCredential,
};

/// Client-server repository
pub struct MySqlRepository {
    connection_string: String,
    /// `None` once closed
    pool: RwLock<Option<MySqlPool>>,
}

impl MySqlRepository {
    const ACQUIRE_TIMEOUT_SECS: u64 = 30;

    /// Validates the DSN and prepares a lazy pool. No network I/O happens
    /// here.
    pub fn new(connection_string: &str) -> EngineResult<Self> {
        let dsn = connection_string.trim();
        let options = Self::build_connect_options(dsn)?;

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_secs(Self::ACQUIRE_TIMEOUT_SECS))
            .connect_lazy_with(options);

        Ok(Self {
            connection_string: dsn.to_string(),
            pool: RwLock::new(Some(pool)),
        })
    }

    fn build_connect_options(dsn: &str) -> EngineResult<MySqlConnectOptions> {
        if !(dsn.starts_with("mysql://") || dsn.starts_with("mariadb://")) {
            return Err(EngineError::persistence(
                "client-server connection string must be a mysql:// DSN",
            ));
        }

        MySqlConnectOptions::from_str(dsn)
            .map_err(|e| EngineError::persistence(format!("Invalid DSN: {}", e)))
    }

    async fn get_pool(&self) -> EngineResult<MySqlPool> {
        self.pool.read().await.clone().ok_or(EngineError::Closed)
    }

    /// Helper to bind a statement value to a MySQL query
    fn bind_value<'q>(
        query: Query<'q, MySql, MySqlArguments>,
        value: &'q BindValue,
    ) -> Query<'q, MySql, MySqlArguments> {
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
impl CredentialRepository for MySqlRepository {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::ClientServer
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    // The DSN carries the server password, keep it out of the span
    #[instrument(skip(self))]
    async fn create_database(&self) -> EngineResult<()> {
        let pool = self.get_pool().await?;

        for stmt in MYSQL_SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }

        debug!("client-server schema ensured");
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

        CredentialId::try_from(result.last_insert_id())
            .map_err(|_| EngineError::persistence("auto-increment id out of range"))
    }

    async fn update(&self, id: CredentialId, patch: &CredentialPatch) -> EngineResult<()> {
        let stmt = UpdateStatement::build(id, patch, Utc::now())?;
        let pool = self.get_pool().await?;

        let mut query = sqlx::query(&stmt.sql);
        for value in &stmt.values {
            query = Self::bind_value(query, value);
        }

        let result = query.execute(&pool).await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        // MySQL reports changed rows, not matched rows; a zero count alone
        // does not prove the id is absent.
        let sql = format!("SELECT id FROM {} WHERE id = ?", CREDENTIALS_TABLE);
        let existing: Option<CredentialId> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&pool)
            .await?;

        match existing {
            Some(_) => Ok(()),
            None => Err(EngineError::not_found(id)),
        }
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
            debug!("client-server repository closed");
        }
        Ok(())
    }

    async fn is_closed(&self) -> bool {
        self.pool.read().await.is_none()
    }
}
