//! Storage contract for resources, with a PostgreSQL and an in-memory implementation.

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use crate::config::{BelongsTo, ResourceSchema};
use crate::sql::{BuildError, EncodeError};
use crate::value::{DecodeError, Filter, Row, Value};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("no rows affected")]
    NoRowsAffected,
    #[error("key already exists: {0}")]
    Conflict(String),
    #[error("primary key value is missing")]
    MissingPrimaryKey,
    #[error("{table} has no field '{field}'")]
    UnknownField { table: String, field: String },
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("encode: {0}")]
    Encode(#[from] EncodeError),
    #[error("database: {0}")]
    Driver(#[from] sqlx::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

impl From<BuildError> for RepositoryError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::UnknownField { table, field } => RepositoryError::UnknownField { table, field },
            BuildError::MissingPrimaryKey => RepositoryError::MissingPrimaryKey,
            BuildError::Encode(e) => RepositoryError::Encode(e),
        }
    }
}

/// Persistence for rows of any resource, driven entirely by its schema.
///
/// Rows whose soft-delete field is set are invisible to every operation.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Live row with this key, or `None`.
    async fn find(&self, schema: &ResourceSchema, id: &Value) -> Result<Option<Row>, RepositoryError>;

    /// Store a new row. Returns the key only when the store assigns it (auto-increment).
    async fn insert(&self, schema: &ResourceSchema, row: &Row) -> Result<Option<Value>, RepositoryError>;

    /// Overwrite the fields present in `row` on the live row named by its primary key. Returns affected rows.
    async fn update(&self, schema: &ResourceSchema, row: &Row) -> Result<u64, RepositoryError>;

    /// Soft delete when the resource has a soft-delete field, hard delete otherwise.
    /// `NoRowsAffected` when no live row has this key.
    async fn delete(&self, schema: &ResourceSchema, id: &Value) -> Result<(), RepositoryError>;

    /// Live rows matching the filter, ordered by primary key.
    async fn search(&self, schema: &ResourceSchema, filter: &Filter) -> Result<Vec<Row>, RepositoryError>;

    /// Rows whose foreign field equals `id`.
    async fn find_by_foreign_key(
        &self,
        schema: &ResourceSchema,
        id: &Value,
        association: &BelongsTo,
    ) -> Result<Vec<Row>, RepositoryError> {
        let mut filter = Filter::new();
        filter.insert(association.field.clone(), vec![id.clone()]);
        self.search(schema, &filter).await
    }
}
