//! Publishing a definition: validate, persist to the File Store, then register.

use crate::config::{ModelDefinition, ValidatedDefinition};
use crate::error::{AppError, StorageError};
use crate::registry::{RegistryEntry, SchemaRegistry};
use crate::store::{with_timeout, FileStore};
use std::sync::Arc;

pub struct PublishOrchestrator {
    registry: Arc<SchemaRegistry>,
    files: Arc<dyn FileStore>,
}

impl PublishOrchestrator {
    pub fn new(registry: Arc<SchemaRegistry>, files: Arc<dyn FileStore>) -> Self {
        PublishOrchestrator { registry, files }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn files(&self) -> &Arc<dyn FileStore> {
        &self.files
    }

    /// Persist and register under the model's name lock, so concurrent publishes of one name
    /// leave disk and registry agreeing on the last writer.
    ///
    /// A persist failure registers nothing. A registration failure after a successful persist is
    /// reported as `PartialPublish`: the file holds the new definition while the registry still
    /// serves the previous one, until the definition is republished.
    pub async fn publish(&self, definition: &ModelDefinition) -> Result<Arc<RegistryEntry>, AppError> {
        let validated = self.registry.validate(definition)?;
        let locked = self.registry.lock(validated).await;
        let model = locked.name().to_string();

        let json = locked.definition().to_json();
        let path = with_timeout(
            "write_definition",
            self.registry.storage_timeout(),
            self.files.write_definition(&model, &json),
        )
        .await?;
        tracing::debug!(model = %model, path = %path.display(), "definition persisted");

        match self.registry.register_locked(locked).await {
            Ok(entry) => {
                tracing::info!(model = %model, revision = entry.revision, "model published");
                Ok(entry)
            }
            Err(source) => {
                tracing::error!(model = %model, error = %source, "definition persisted but not registered");
                Err(AppError::PartialPublish { model, source })
            }
        }
    }

    /// Register a definition that is already persisted (boot path).
    pub async fn register_existing(&self, definition: ValidatedDefinition) -> Result<Arc<RegistryEntry>, StorageError> {
        self.registry.register(definition).await
    }
}
