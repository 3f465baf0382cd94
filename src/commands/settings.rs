//! Settings commands.

use serde::Serialize;

use crate::settings::AppSettings;
use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: Option<AppSettings>,
    pub error: Option<String>,
}

/// Returns the stored settings. The environment pin is not included, so a
/// settings editor never writes it back.
pub async fn get_settings(state: &SharedState) -> Result<SettingsResponse, String> {
    let state = state.lock().await;
    Ok(SettingsResponse {
        success: true,
        settings: Some(state.settings.clone()),
        error: None,
    })
}

/// Replaces the stored settings. The active repository is left alone until
/// the next switch.
pub async fn save_settings(
    state: &SharedState,
    settings: AppSettings,
) -> Result<SettingsResponse, String> {
    let mut state = state.lock().await;
    if let Err(err) = settings.save_to(&state.settings_path) {
        return Ok(SettingsResponse {
            success: false,
            settings: None,
            error: Some(err.to_string()),
        });
    }

    state.settings = settings.clone();
    Ok(SettingsResponse {
        success: true,
        settings: Some(settings),
        error: None,
    })
}

/// Drops the stored settings file and falls back to defaults.
pub async fn reset_settings(state: &SharedState) -> Result<SettingsResponse, String> {
    let mut state = state.lock().await;
    match AppSettings::reset(&state.settings_path) {
        Ok(defaults) => {
            state.settings = defaults.clone();
            Ok(SettingsResponse {
                success: true,
                settings: Some(defaults),
                error: None,
            })
        }
        Err(err) => Ok(SettingsResponse {
            success: false,
            settings: None,
            error: Some(err.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::state_in;
    use tempfile::TempDir;

    #[tokio::test]
    async fn bootstrap_persists_settings() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;

        let path = state.lock().await.settings_path.clone();
        assert!(path.exists());

        let current = get_settings(&state).await.unwrap().settings.unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap(), Some(current));
    }

    #[tokio::test]
    async fn invalid_settings_are_not_saved() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;

        let mut broken = get_settings(&state).await.unwrap().settings.unwrap();
        broken.default_connection_id = 7;

        let response = save_settings(&state, broken).await.unwrap();
        assert!(!response.success);
        assert_eq!(
            get_settings(&state).await.unwrap().settings.unwrap().default_connection_id,
            1
        );
    }

    #[tokio::test]
    async fn reset_removes_stored_file() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir).await;

        let response = reset_settings(&state).await.unwrap();
        assert!(response.success);
        assert!(!state.lock().await.settings_path.exists());
        assert_eq!(response.settings.unwrap().connections.len(), 1);
    }
}
