//! Generated CRUD handlers: for each registered model, one permission-checked handler per
//! operation, bound to the model's definition, storage binding, and Table Store.

use crate::config::{Action, Role, StorageBinding, ValidatedDefinition};
use crate::error::AppError;
use crate::permission::is_allowed;
use crate::service::RequestValidator;
use crate::store::{with_timeout, Row, TableStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The five operations exposed per model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    ListAll,
    GetById,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::ListAll,
        Operation::GetById,
        Operation::Update,
        Operation::Delete,
    ];

    /// The permission an operation requires.
    pub fn action(self) -> Action {
        match self {
            Operation::Create => Action::Create,
            Operation::ListAll | Operation::GetById => Action::Read,
            Operation::Update => Action::Update,
            Operation::Delete => Action::Delete,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::ListAll => "list",
            Operation::GetById => "get",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Operation-specific payload: a record id, a JSON body, both, or neither.
#[derive(Clone, Debug, Default)]
pub struct OperationInput {
    pub id: Option<String>,
    pub body: Option<Value>,
}

impl OperationInput {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        OperationInput {
            id: Some(id.into()),
            body: None,
        }
    }

    pub fn with_body(body: Value) -> Self {
        OperationInput {
            id: None,
            body: Some(body),
        }
    }

    pub fn with_id_and_body(id: impl Into<String>, body: Value) -> Self {
        OperationInput {
            id: Some(id.into()),
            body: Some(body),
        }
    }

    fn require_id(&self) -> Result<&str, AppError> {
        self.id.as_deref().ok_or_else(|| AppError::BadRequest("record id required".into()))
    }

    fn take_object(&mut self) -> Result<Row, AppError> {
        match self.body.take() {
            Some(Value::Object(m)) => Ok(m),
            _ => Err(AppError::BadRequest("body must be a JSON object".into())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OperationOutput {
    Created(Row),
    Rows(Vec<Row>),
    Row(Row),
    Deleted,
}

#[async_trait]
pub trait OperationHandler: Send + Sync {
    fn operation(&self) -> Operation;

    async fn handle(&self, role: Role, input: OperationInput) -> Result<OperationOutput, AppError>;
}

/// Everything a handler needs from one registration. Shared by the five handlers of an entry.
pub struct BoundModel {
    pub definition: Arc<ValidatedDefinition>,
    pub binding: StorageBinding,
    store: Arc<dyn TableStore>,
    timeout: Duration,
}

impl BoundModel {
    /// Deny before any storage access.
    fn authorize(&self, role: Role, action: Action) -> Result<(), AppError> {
        if is_allowed(&self.definition.permissions, role, action) {
            Ok(())
        } else {
            tracing::debug!(model = %self.definition.name, %role, %action, "permission denied");
            Err(AppError::PermissionDenied {
                model: self.definition.name.clone(),
                action,
                role,
            })
        }
    }

    fn not_found(&self, id: &str) -> AppError {
        AppError::NotFound(format!("{} {}", self.definition.name, id))
    }
}

struct CreateHandler(Arc<BoundModel>);
struct ListAllHandler(Arc<BoundModel>);
struct GetByIdHandler(Arc<BoundModel>);
struct UpdateHandler(Arc<BoundModel>);
struct DeleteHandler(Arc<BoundModel>);

#[async_trait]
impl OperationHandler for CreateHandler {
    fn operation(&self) -> Operation {
        Operation::Create
    }

    async fn handle(&self, role: Role, mut input: OperationInput) -> Result<OperationOutput, AppError> {
        let m = &self.0;
        m.authorize(role, Action::Create)?;
        let row = RequestValidator::validate_create(&m.definition, input.take_object()?)?;
        let created = with_timeout("insert", m.timeout, m.store.insert(&m.binding, row)).await?;
        Ok(OperationOutput::Created(created))
    }
}

#[async_trait]
impl OperationHandler for ListAllHandler {
    fn operation(&self) -> Operation {
        Operation::ListAll
    }

    async fn handle(&self, role: Role, _input: OperationInput) -> Result<OperationOutput, AppError> {
        let m = &self.0;
        m.authorize(role, Action::Read)?;
        let rows = with_timeout("select_all", m.timeout, m.store.select_all(&m.binding)).await?;
        Ok(OperationOutput::Rows(rows))
    }
}

#[async_trait]
impl OperationHandler for GetByIdHandler {
    fn operation(&self) -> Operation {
        Operation::GetById
    }

    async fn handle(&self, role: Role, input: OperationInput) -> Result<OperationOutput, AppError> {
        let m = &self.0;
        m.authorize(role, Action::Read)?;
        let id = input.require_id()?;
        let row = with_timeout("select_by_id", m.timeout, m.store.select_by_id(&m.binding, id))
            .await?
            .ok_or_else(|| m.not_found(id))?;
        Ok(OperationOutput::Row(row))
    }
}

#[async_trait]
impl OperationHandler for UpdateHandler {
    fn operation(&self) -> Operation {
        Operation::Update
    }

    async fn handle(&self, role: Role, mut input: OperationInput) -> Result<OperationOutput, AppError> {
        let m = &self.0;
        m.authorize(role, Action::Update)?;
        let patch = RequestValidator::validate_patch(&m.definition, input.take_object()?)?;
        let id = input.require_id()?;
        let row = with_timeout("update_by_id", m.timeout, m.store.update_by_id(&m.binding, id, patch))
            .await?
            .ok_or_else(|| m.not_found(id))?;
        Ok(OperationOutput::Row(row))
    }
}

#[async_trait]
impl OperationHandler for DeleteHandler {
    fn operation(&self) -> Operation {
        Operation::Delete
    }

    async fn handle(&self, role: Role, input: OperationInput) -> Result<OperationOutput, AppError> {
        let m = &self.0;
        m.authorize(role, Action::Delete)?;
        let id = input.require_id()?;
        if with_timeout("delete_by_id", m.timeout, m.store.delete_by_id(&m.binding, id)).await? {
            Ok(OperationOutput::Deleted)
        } else {
            Err(m.not_found(id))
        }
    }
}

/// Operation table for one registry entry.
pub struct HandlerSet {
    model: Arc<BoundModel>,
    handlers: HashMap<Operation, Arc<dyn OperationHandler>>,
}

impl HandlerSet {
    pub fn get(&self, operation: Operation) -> Option<&Arc<dyn OperationHandler>> {
        self.handlers.get(&operation)
    }

    pub fn model(&self) -> &BoundModel {
        &self.model
    }

    pub async fn dispatch(&self, operation: Operation, role: Role, input: OperationInput) -> Result<OperationOutput, AppError> {
        let handler = self
            .get(operation)
            .ok_or_else(|| AppError::BadRequest(format!("{} not available", operation)))?;
        handler.handle(role, input).await
    }
}

pub struct CrudService;

impl CrudService {
    /// Build the five handlers for a definition. Called once per registration.
    pub fn generate(
        definition: Arc<ValidatedDefinition>,
        binding: StorageBinding,
        store: Arc<dyn TableStore>,
        timeout: Duration,
    ) -> HandlerSet {
        let model = Arc::new(BoundModel {
            definition,
            binding,
            store,
            timeout,
        });
        let mut handlers: HashMap<Operation, Arc<dyn OperationHandler>> = HashMap::with_capacity(Operation::ALL.len());
        handlers.insert(Operation::Create, Arc::new(CreateHandler(Arc::clone(&model))));
        handlers.insert(Operation::ListAll, Arc::new(ListAllHandler(Arc::clone(&model))));
        handlers.insert(Operation::GetById, Arc::new(GetByIdHandler(Arc::clone(&model))));
        handlers.insert(Operation::Update, Arc::new(UpdateHandler(Arc::clone(&model))));
        handlers.insert(Operation::Delete, Arc::new(DeleteHandler(Arc::clone(&model))));
        HandlerSet { model, handlers }
    }
}
