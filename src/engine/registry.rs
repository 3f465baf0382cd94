//! Repository Registry
//!
//! Holds the single active repository for the process. This is the SINGLE
//! SOURCE OF TRUTH for which backend the application reads and writes.
//!
//! Readers take a [`RepositoryGuard`] (the read side of one lock) for the
//! duration of an operation; `create`, `switch_to` and `close` take the
//! write side. A switch therefore waits for in-flight operations, and no
//! operation can reach an instance once it has been replaced. Drop any
//! guard before switching from the same task.

use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{info, instrument, warn};

use crate::engine::drivers::mysql::MySqlRepository;
use crate::engine::drivers::sqlite::SqliteRepository;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::CredentialRepository;
use crate::engine::types::BackendKind;

/// The repository currently bound, with the target it was created for
pub struct ActiveRepository {
    pub backend: BackendKind,
    pub connection_string: String,
    pub repository: Arc<dyn CredentialRepository>,
}

/// Shared access to the active repository, held for one operation
pub type RepositoryGuard =
    OwnedRwLockReadGuard<Option<ActiveRepository>, Arc<dyn CredentialRepository>>;

pub struct RepositoryRegistry {
    active: Arc<RwLock<Option<ActiveRepository>>>,
}

impl RepositoryRegistry {
    const CLOSE_TIMEOUT_MS: u64 = 5000;

    /// Creates a registry with no active repository
    pub fn new() -> Self {
        Self {
            active: Arc::new(RwLock::new(None)),
        }
    }

    /// Instantiates a backend for the given target
    fn instantiate(
        backend: BackendKind,
        connection_string: &str,
    ) -> EngineResult<Arc<dyn CredentialRepository>> {
        let repository: Arc<dyn CredentialRepository> = match backend {
            BackendKind::EmbeddedFile => Arc::new(SqliteRepository::new(connection_string)?),
            BackendKind::ClientServer => Arc::new(MySqlRepository::new(connection_string)?),
        };
        Ok(repository)
    }

    /// Creates (or reuses) the repository for a target and makes it active.
    ///
    /// The active repository is reused when it already targets the same
    /// backend and connection string; any other target replaces it.
    #[instrument(skip_all, fields(backend = %backend))]
    pub async fn create(
        &self,
        backend: &str,
        connection_string: &str,
    ) -> EngineResult<Arc<dyn CredentialRepository>> {
        let kind: BackendKind = backend.parse()?;
        let mut slot = self.active.write().await;

        if let Some(active) = slot.as_ref() {
            let same_target =
                active.backend == kind && active.connection_string == connection_string.trim();
            if same_target && !active.repository.is_closed().await {
                active.repository.create_database().await?;
                return Ok(Arc::clone(&active.repository));
            }
        }

        Self::replace(&mut slot, kind, connection_string).await
    }

    /// Closes the active repository (if any) and activates a new one.
    #[instrument(skip_all, fields(backend = %backend))]
    pub async fn switch_to(
        &self,
        backend: &str,
        connection_string: &str,
    ) -> EngineResult<Arc<dyn CredentialRepository>> {
        let kind: BackendKind = backend.parse()?;
        let mut slot = self.active.write().await;
        Self::replace(&mut slot, kind, connection_string).await
    }

    /// Swaps the slot content. Must be called with the write lock held.
    ///
    /// The previous instance is closed before the new one is created, so two
    /// live handles never coexist. If the new instance cannot be set up the
    /// slot is left empty.
    async fn replace(
        slot: &mut Option<ActiveRepository>,
        kind: BackendKind,
        connection_string: &str,
    ) -> EngineResult<Arc<dyn CredentialRepository>> {
        if let Some(previous) = slot.take() {
            Self::close_quietly(previous).await;
        }

        let repository = Self::instantiate(kind, connection_string)?;
        if let Err(e) = repository.create_database().await {
            if let Err(close_err) = repository.close().await {
                warn!(
                    backend = %kind,
                    error = %close_err,
                    "failed to close repository after failed setup"
                );
            }
            return Err(e);
        }

        info!(backend = %kind, "repository activated");
        *slot = Some(ActiveRepository {
            backend: kind,
            connection_string: repository.connection_string().to_string(),
            repository: Arc::clone(&repository),
        });

        Ok(repository)
    }

    /// Closes a replaced repository. Failures and timeouts are logged, never
    /// propagated.
    async fn close_quietly(previous: ActiveRepository) {
        let close = previous.repository.close();
        match timeout(Duration::from_millis(Self::CLOSE_TIMEOUT_MS), close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(backend = %previous.backend, error = %e, "failed to close previous repository")
            }
            Err(_) => warn!(
                backend = %previous.backend,
                timeout_ms = Self::CLOSE_TIMEOUT_MS,
                "timed out closing previous repository"
            ),
        }
    }

    /// Returns the active repository for one operation
    ///
    /// Fails with `NotInitialized` if no repository has been created yet.
    pub async fn get_active(&self) -> EngineResult<RepositoryGuard> {
        let guard = self.active.clone().read_owned().await;
        OwnedRwLockReadGuard::try_map(guard, |slot| slot.as_ref().map(|a| &a.repository))
            .map_err(|_| EngineError::NotInitialized)
    }

    /// Returns the backend and connection string of the active repository
    pub async fn active_target(&self) -> Option<(BackendKind, String)> {
        let slot = self.active.read().await;
        slot.as_ref()
            .map(|active| (active.backend, active.connection_string.clone()))
    }

    /// Closes and clears the active repository
    #[instrument(skip(self))]
    pub async fn close(&self) -> EngineResult<()> {
        let mut slot = self.active.write().await;
        if let Some(active) = slot.take() {
            active.repository.close().await?;
            info!(backend = %active.backend, "repository closed");
        }
        Ok(())
    }

    /// Returns true if a repository is active
    pub async fn is_initialized(&self) -> bool {
        self.active.read().await.is_some()
    }
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
