//! Export: snapshot the repository and write it out

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::CredentialRepository;
use crate::engine::types::CredentialRecord;
use crate::transfer::{structured, tabular, TransferFormat};

/// Serializes records in the given format
pub fn render(records: &[CredentialRecord], format: TransferFormat) -> EngineResult<String> {
    match format {
        TransferFormat::Csv => tabular::render(records),
        TransferFormat::Json => structured::render(records),
    }
}

/// Writes every record to `path` and returns how many were written.
///
/// The payload goes to a sibling temp file first and is renamed into place,
/// so a failed export never leaves a truncated destination behind.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn export_file(repository: &dyn CredentialRepository, path: &Path) -> EngineResult<usize> {
    let format = TransferFormat::from_path(path)?;
    let records = repository.get_all().await?;
    let payload = render(&records, format)?;

    write_atomically(path, payload.as_bytes()).await?;

    info!(count = records.len(), "export finished");
    Ok(records.len())
}

fn staging_path(path: &Path) -> EngineResult<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a file path", path.display()),
        ))
    })?;

    let mut staged = OsString::from(".");
    staged.push(file_name);
    staged.push(".partial");
    Ok(path.with_file_name(staged))
}

/// Writes `bytes` to a sibling staging file and renames it over `path`. The
/// staging file never outlives a failed write or rename.
async fn write_atomically(path: &Path, bytes: &[u8]) -> EngineResult<()> {
    let staged = staging_path(path)?;

    let result = match tokio::fs::write(&staged, bytes).await {
        Ok(()) => tokio::fs::rename(&staged, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        discard_staged(&staged).await;
        return Err(e.into());
    }
    Ok(())
}

async fn discard_staged(staged: &Path) {
    match tokio::fs::remove_file(staged).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, "failed to remove staged export"),
    }
}
