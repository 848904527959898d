//! Blueprint SDK: a runtime schema registry serving permission-gated CRUD for models
//! published at runtime.

pub mod boot;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod permission;
pub mod publish;
pub mod registry;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use boot::{load_persisted, BootReport, SkippedFile};
pub use config::{
    validate, Action, FieldDefinition, FieldType, ModelDefinition, PermissionMatrix, PermissionSet, Role, Settings,
    StorageBackend, StorageBinding, ValidatedDefinition,
};
pub use error::{AppError, ConfigError, StorageError, ValidationError};
pub use migration::{map_type, ColumnType};
pub use permission::is_allowed;
pub use publish::PublishOrchestrator;
pub use registry::{RegistryEntry, SchemaRegistry};
pub use response::{success_many, success_one};
pub use routes::{app_router, common_routes, common_routes_with_ready, entity_routes, model_routes};
pub use service::{CrudService, Operation};
pub use state::AppState;
pub use store::{ensure_database_exists, DirFileStore, FileStore, MemoryTableStore, PgTableStore, TableStore};
