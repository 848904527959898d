//! HTTP handlers for entity CRUD and model definitions.

pub mod entity;
pub mod models;
