//! Handler generation for registered models, plus payload validation.

mod crud;
mod validation;
pub use crud::{BoundModel, CrudService, HandlerSet, Operation, OperationHandler, OperationInput, OperationOutput};
pub use validation::{canonical_date, coerce_value, RequestValidator};
