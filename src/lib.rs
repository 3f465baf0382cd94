// PassKeep - local-first password manager
// Core library

pub mod commands;
pub mod engine;
pub mod observability;
pub mod settings;
pub mod transfer;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use engine::{EngineResult, RepositoryRegistry};
use settings::{AppSettings, ConnectionOverride};

pub type SharedState = Arc<Mutex<AppState>>;
pub struct AppState {
    pub registry: Arc<RepositoryRegistry>,
    /// Settings as stored on disk
    pub settings: AppSettings,
    /// Environment pin on the default profile, kept out of `settings`
    pub connection_override: ConnectionOverride,
    /// Where settings changes are persisted
    pub settings_path: PathBuf,
}

impl AppState {
    /// Persists first-run settings and activates the default profile, with
    /// `connection_override` applied to it.
    pub async fn bootstrap(
        settings: AppSettings,
        connection_override: ConnectionOverride,
        settings_path: PathBuf,
    ) -> EngineResult<Self> {
        settings.ensure_persisted(&settings_path)?;

        let registry = Arc::new(RepositoryRegistry::new());
        let effective = settings.with_override(&connection_override);
        let default = effective.default_connection()?;
        registry
            .create(&default.backend, &default.connection_string)
            .await?;
        info!(id = default.id, backend = %default.backend, "default repository registered");

        Ok(Self {
            registry,
            settings,
            connection_override,
            settings_path,
        })
    }

    /// Stored settings with the environment pin applied
    pub fn effective_settings(&self) -> AppSettings {
        self.settings.with_override(&self.connection_override)
    }
}

/// Initializes logging, loads settings and opens the default repository.
pub async fn start() -> EngineResult<SharedState> {
    observability::init_tracing();

    let state = AppState::bootstrap(
        AppSettings::load(),
        ConnectionOverride::from_env(),
        settings::config_path(),
    )
    .await?;
    Ok(Arc::new(Mutex::new(state)))
}
