//! Commands
//!
//! Entry points the IPC layer calls. Every command takes the shared state,
//! reports domain failures inside its response (`success: false` plus an
//! error message) and reserves the outer `Err` for malformed input.

pub mod connection;
pub mod credentials;
pub mod settings;
pub mod transfer;

use std::sync::Arc;

use crate::engine::RepositoryRegistry;
use crate::SharedState;

/// Clones the registry handle so the state lock is not held across I/O
async fn registry_of(state: &SharedState) -> Arc<RepositoryRegistry> {
    let state = state.lock().await;
    Arc::clone(&state.registry)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use tempfile::TempDir;
    use tokio::sync::Mutex;

    use crate::engine::types::{BackendKind, RepositoryConnection};
    use crate::settings::{AppSettings, ConnectionOverride};
    use crate::{AppState, SharedState};

    /// Settings whose only profile points into `dir`
    pub fn settings_in(dir: &TempDir) -> AppSettings {
        let local = RepositoryConnection::new(
            1,
            "Local",
            BackendKind::EmbeddedFile,
            dir.path().join("storage").join("vault.db").to_string_lossy(),
        );
        AppSettings {
            default_connection_id: 1,
            connections: vec![local],
        }
    }

    pub async fn state_in(dir: &TempDir) -> SharedState {
        pinned_state_in(dir, ConnectionOverride::default()).await
    }

    /// State whose default profile is pinned as if by the environment
    pub async fn pinned_state_in(dir: &TempDir, pin: ConnectionOverride) -> SharedState {
        let path = dir.path().join("settings.json");
        let state = AppState::bootstrap(settings_in(dir), pin, path)
            .await
            .expect("bootstrap");
        Arc::new(Mutex::new(state))
    }
}
