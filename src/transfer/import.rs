//! Import: parse a payload, skip duplicates, insert the rest

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::engine::error::EngineResult;
use crate::engine::traits::CredentialRepository;
use crate::transfer::{parse_rows, ImportOutcome, ImportRow, TransferFormat};

/// Inserts parsed rows one at a time.
///
/// A row whose `(Name, Username)` pair already exists, either in the store
/// or earlier in the same payload, is counted as a duplicate. A row with an
/// unusable field, or one the repository refuses, is counted as failed and
/// the run continues.
pub async fn import_rows(
    repository: &dyn CredentialRepository,
    rows: Vec<ImportRow>,
) -> EngineResult<ImportOutcome> {
    // The existing set is read once and then kept current with every
    // successful insert, which yields the same result as re-reading per row.
    let mut seen: HashSet<(String, String)> = repository
        .get_all()
        .await?
        .into_iter()
        .map(|record| (record.name, record.username))
        .collect();

    let mut outcome = ImportOutcome::default();
    for row in rows {
        let credential = match row.into_credential() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "failed to read import record");
                outcome.failed += 1;
                continue;
            }
        };
        let key = (credential.name.clone(), credential.username.clone());

        if seen.contains(&key) {
            debug!(name = %key.0, username = %key.1, "skipping duplicate record");
            outcome.duplicates += 1;
            continue;
        }

        match repository.insert(&credential).await {
            Ok(id) => {
                debug!(id, name = %key.0, "imported record");
                seen.insert(key);
                outcome.imported += 1;
            }
            Err(e) => {
                warn!(name = %key.0, error = %e, "failed to import record");
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}

/// Imports a `.csv` or `.json` file into the repository.
///
/// The extension is checked before the file is read, and the whole payload
/// is parsed before any row is inserted.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn import_file(
    repository: &dyn CredentialRepository,
    path: &Path,
) -> EngineResult<ImportOutcome> {
    let format = TransferFormat::from_path(path)?;
    let content = tokio::fs::read_to_string(path).await?;
    let rows = parse_rows(format, &content)?;

    let outcome = import_rows(repository, rows).await?;
    info!(
        imported = outcome.imported,
        duplicates = outcome.duplicates,
        failed = outcome.failed,
        "import finished"
    );
    Ok(outcome)
}
