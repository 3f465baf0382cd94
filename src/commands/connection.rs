//! Connection commands
//!
//! Commands for managing connection profiles and switching the active
//! repository between them.

use serde::Serialize;
use tracing::{info, instrument};

use crate::commands::registry_of;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::RepositoryConnection;
use crate::engine::RepositoryRegistry;
use crate::settings::AppSettings;
use crate::SharedState;

/// Response for connection operations
#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub success: bool,
    pub connection: Option<RepositoryConnection>,
    pub error: Option<String>,
}

impl ConnectionResponse {
    fn from_result(result: EngineResult<Option<RepositoryConnection>>) -> Self {
        match result {
            Ok(connection) => Self {
                success: true,
                connection,
                error: None,
            },
            Err(e) => Self {
                success: false,
                connection: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Profile list for the connection picker
#[derive(Debug, Serialize)]
pub struct ConnectionListResponse {
    pub connections: Vec<RepositoryConnection>,
    pub default_connection_id: u32,
    pub active_connection_id: Option<u32>,
}

/// Profile whose target is the one the registry currently holds
async fn active_profile(
    registry: &RepositoryRegistry,
    settings: &AppSettings,
) -> Option<RepositoryConnection> {
    let (backend, connection_string) = registry.active_target().await?;
    settings
        .connections
        .iter()
        .find(|profile| {
            profile.backend_kind().ok() == Some(backend)
                && profile.connection_string.trim() == connection_string
        })
        .cloned()
}

/// Applies a settings change to the stored settings and persists it. State
/// is only updated once the file has been written. The environment pin is
/// never part of what gets written.
async fn update_settings<F, T>(state: &SharedState, change: F) -> EngineResult<T>
where
    F: FnOnce(&mut AppSettings) -> EngineResult<T>,
{
    let mut state = state.lock().await;
    let mut settings = state.settings.clone();
    let value = change(&mut settings)?;
    settings.save_to(&state.settings_path)?;
    state.settings = settings;
    Ok(value)
}

pub async fn list_connections(state: &SharedState) -> Result<ConnectionListResponse, String> {
    let (registry, settings) = {
        let state = state.lock().await;
        (state.registry.clone(), state.effective_settings())
    };

    let active_connection_id = active_profile(&registry, &settings)
        .await
        .map(|profile| profile.id);

    Ok(ConnectionListResponse {
        connections: settings.connections,
        default_connection_id: settings.default_connection_id,
        active_connection_id,
    })
}

/// Returns the profile of the active repository, if it matches one
pub async fn active_connection(state: &SharedState) -> Result<ConnectionResponse, String> {
    let (registry, settings) = {
        let state = state.lock().await;
        (state.registry.clone(), state.effective_settings())
    };

    if !registry.is_initialized().await {
        return Ok(ConnectionResponse::from_result(Err(
            EngineError::NotInitialized,
        )));
    }

    let profile = active_profile(&registry, &settings).await;
    Ok(ConnectionResponse::from_result(Ok(profile)))
}

/// Closes the active repository and activates the one described by profile
/// `id`, honouring the environment pin on the default profile
#[instrument(skip(state))]
pub async fn switch_connection(state: &SharedState, id: u32) -> Result<ConnectionResponse, String> {
    let (registry, profile) = {
        let state = state.lock().await;
        (
            state.registry.clone(),
            state.effective_settings().connection(id).cloned(),
        )
    };

    let Some(profile) = profile else {
        return Ok(ConnectionResponse::from_result(Err(EngineError::config(
            format!("Connection {} not found", id),
        ))));
    };

    let result = registry
        .switch_to(&profile.backend, &profile.connection_string)
        .await
        .map(|_| {
            info!(id = profile.id, backend = %profile.backend, "switched connection");
            Some(profile)
        });

    Ok(ConnectionResponse::from_result(result))
}

/// Adds or replaces a profile. Id 0 asks for a fresh id.
#[instrument(skip_all, fields(id = profile.id, backend = %profile.backend))]
pub async fn save_connection(
    state: &SharedState,
    mut profile: RepositoryConnection,
) -> Result<ConnectionResponse, String> {
    if profile.name.trim().is_empty() {
        return Err("Connection name is required".to_string());
    }
    if profile.connection_string.trim().is_empty() {
        return Err("Connection string is required".to_string());
    }

    let result = update_settings(state, |settings| {
        if profile.id == 0 {
            profile.id = settings.next_connection_id();
        }
        settings.upsert_connection(profile.clone())?;
        Ok(Some(profile))
    })
    .await;

    Ok(ConnectionResponse::from_result(result))
}

/// Removes a profile. If it is the active one the repository is closed.
#[instrument(skip(state))]
pub async fn delete_connection(state: &SharedState, id: u32) -> Result<ConnectionResponse, String> {
    let registry = registry_of(state).await;

    let result = update_settings(state, |settings| settings.remove_connection(id)).await;
    let removed = match result {
        Ok(removed) => removed,
        Err(e) => return Ok(ConnectionResponse::from_result(Err(e))),
    };

    let was_active = registry.active_target().await.is_some_and(|(backend, target)| {
        removed.backend_kind().ok() == Some(backend)
            && removed.connection_string.trim() == target
    });
    if was_active {
        if let Err(e) = registry.close().await {
            return Ok(ConnectionResponse::from_result(Err(e)));
        }
    }

    Ok(ConnectionResponse::from_result(Ok(Some(removed))))
}

#[instrument(skip(state))]
pub async fn set_default_connection(
    state: &SharedState,
    id: u32,
) -> Result<ConnectionResponse, String> {
    let result = update_settings(state, |settings| {
        settings.set_default(id)?;
        Ok(settings.connection(id).cloned())
    })
    .await;

    Ok(ConnectionResponse::from_result(result))
}
