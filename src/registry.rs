//! Schema registry: model name -> active definition, storage binding, and handler set.
//!
//! Writes are serialized per model name; the map itself is only write-locked for the final
//! swap, so readers never wait on another name's storage binding. An entry handed out by
//! [`SchemaRegistry::lookup`] stays valid after it is superseded.

use crate::config::{validate, ModelDefinition, StorageBinding, ValidatedDefinition};
use crate::error::{StorageError, ValidationError};
use crate::service::{CrudService, HandlerSet};
use crate::store::{with_timeout, TableStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// An active model: its definition plus the handlers generated for it.
pub struct RegistryEntry {
    pub definition: Arc<ValidatedDefinition>,
    pub handlers: HandlerSet,
    /// 1 on first registration, +1 on each redefinition.
    pub revision: u64,
    pub registered_at: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn binding(&self) -> &StorageBinding {
        &self.handlers.model().binding
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.definition.name)
            .field("revision", &self.revision)
            .field("fields", &self.definition.fields.len())
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

/// A definition together with the exclusive right to register its name,
/// see [`SchemaRegistry::lock`]. The name registered is always the one locked.
pub struct LockedDefinition {
    definition: ValidatedDefinition,
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

impl LockedDefinition {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ValidatedDefinition {
        &self.definition
    }
}

pub struct SchemaRegistry {
    entries: RwLock<HashMap<String, Arc<RegistryEntry>>>,
    name_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    store: Arc<dyn TableStore>,
    storage_timeout: Duration,
}

impl SchemaRegistry {
    pub fn new(store: Arc<dyn TableStore>, storage_timeout: Duration) -> Self {
        SchemaRegistry {
            entries: RwLock::new(HashMap::new()),
            name_locks: Mutex::new(HashMap::new()),
            store,
            storage_timeout,
        }
    }

    pub fn storage_timeout(&self) -> Duration {
        self.storage_timeout
    }

    pub fn validate(&self, definition: &ModelDefinition) -> Result<ValidatedDefinition, ValidationError> {
        validate(definition)
    }

    fn name_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.name_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Hold the write lock for the definition's name. Registrations of other names are unaffected.
    pub async fn lock(&self, definition: ValidatedDefinition) -> LockedDefinition {
        let lock = self.name_lock(&definition.name);
        LockedDefinition {
            definition,
            _guard: lock.lock_owned().await,
        }
    }

    /// Bind storage for the definition, build its handlers, and swap it in.
    /// On failure the previous entry for the name, if any, stays active.
    pub async fn register(&self, definition: ValidatedDefinition) -> Result<Arc<RegistryEntry>, StorageError> {
        let locked = self.lock(definition).await;
        self.register_locked(locked).await
    }

    /// [`register`](Self::register) for a definition already locked. The lock is released on return.
    pub async fn register_locked(&self, locked: LockedDefinition) -> Result<Arc<RegistryEntry>, StorageError> {
        let LockedDefinition { definition, _guard } = locked;
        let binding = StorageBinding::for_definition(&definition);
        with_timeout(
            "ensure_table",
            self.storage_timeout,
            self.store.ensure_table(&binding),
        )
        .await
        .map_err(|e| {
            tracing::warn!(model = %definition.name, error = %e, "storage binding failed");
            e
        })?;

        let revision = self.lookup(&definition.name).map(|e| e.revision + 1).unwrap_or(1);
        let definition = Arc::new(definition);
        let handlers = CrudService::generate(
            Arc::clone(&definition),
            binding,
            Arc::clone(&self.store),
            self.storage_timeout,
        );
        let entry = Arc::new(RegistryEntry {
            definition,
            handlers,
            revision,
            registered_at: Utc::now(),
        });
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.name().to_string(), Arc::clone(&entry));
        tracing::info!(model = %entry.name(), revision, fields = entry.definition.fields.len(), "model registered");
        Ok(entry)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Active definitions, in no particular order.
    pub fn list(&self) -> Vec<Arc<ValidatedDefinition>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|e| Arc::clone(&e.definition))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
