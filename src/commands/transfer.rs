//! Import / export commands

use std::path::Path;

use serde::Serialize;
use tracing::instrument;

use crate::commands::registry_of;
use crate::transfer;
use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub file_name: String,
    pub imported_count: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ExportReport {
    pub success: bool,
    pub file_name: String,
    pub exported_count: usize,
    pub message: String,
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Imports a `.csv` or `.json` file into the active repository
#[instrument(skip(state))]
pub async fn import_file(state: &SharedState, path: String) -> Result<ImportReport, String> {
    let path = Path::new(&path);
    let file_name = file_name_of(path);
    let registry = registry_of(state).await;

    let result = async {
        let repository = registry.get_active().await?;
        transfer::import_file(&**repository, path).await
    }
    .await;

    match result {
        Ok(outcome) => Ok(ImportReport {
            success: true,
            file_name,
            imported_count: outcome.imported,
            duplicates: outcome.duplicates,
            failed: outcome.failed,
            message: format!("Successfully imported {} records", outcome.imported),
        }),
        Err(e) => Ok(ImportReport {
            success: false,
            file_name,
            imported_count: 0,
            duplicates: 0,
            failed: 0,
            message: e.to_string(),
        }),
    }
}

/// Writes every credential of the active repository to a `.csv` or `.json`
/// file
#[instrument(skip(state))]
pub async fn export_file(state: &SharedState, path: String) -> Result<ExportReport, String> {
    let path = Path::new(&path);
    let file_name = file_name_of(path);
    let registry = registry_of(state).await;

    let result = async {
        let repository = registry.get_active().await?;
        transfer::export_file(&**repository, path).await
    }
    .await;

    match result {
        Ok(count) => Ok(ExportReport {
            success: true,
            file_name,
            exported_count: count,
            message: "Export Successful".to_string(),
        }),
        Err(e) => Ok(ExportReport {
            success: false,
            file_name,
            exported_count: 0,
            message: e.to_string(),
        }),
    }
}
