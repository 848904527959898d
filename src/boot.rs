//! Boot loading: register every persisted definition. A bad file is logged and skipped.

use crate::config::ModelDefinition;
use crate::error::{AppError, StorageError};
use crate::publish::PublishOrchestrator;
use crate::store::with_timeout;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BootReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

/// Load all definition files. Only a failure to list the directory aborts boot.
pub async fn load_persisted(publisher: &PublishOrchestrator) -> Result<BootReport, StorageError> {
    let timeout = publisher.registry().storage_timeout();
    let files = with_timeout("list_definition_files", timeout, publisher.files().list_definition_files()).await?;

    let mut report = BootReport::default();
    for path in files {
        match load_one(publisher, &path).await {
            Ok(name) => report.loaded.push(name),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping model definition");
                report.skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }
    tracing::info!(loaded = report.loaded.len(), skipped = report.skipped.len(), "model definitions loaded");
    Ok(report)
}

async fn load_one(publisher: &PublishOrchestrator, path: &std::path::Path) -> Result<String, AppError> {
    let timeout = publisher.registry().storage_timeout();
    let json = with_timeout("read_definition", timeout, publisher.files().read_definition(path)).await?;
    let definition = ModelDefinition::from_json(json)?;
    let validated = publisher.registry().validate(&definition)?;
    let entry = publisher.register_existing(validated).await?;
    Ok(entry.name().to_string())
}
