//! PostgreSQL repository: dynamic parameterized SQL through a sqlx pool.

use crate::config::ResourceSchema;
use crate::repository::{Repository, RepositoryError};
use crate::sql::{self, QueryBuf};
use crate::value::{decode, Filter, RawValue, Row, Value};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgQueryResult, PgRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

#[derive(Clone, Debug)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        PgRepository { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<PgRow>, RepositoryError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        query.fetch_all(&self.pool).await.map_err(classify)
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<PgRow>, RepositoryError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        query.fetch_optional(&self.pool).await.map_err(classify)
    }

    async fn execute(&self, q: &QueryBuf) -> Result<PgQueryResult, RepositoryError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        query.execute(&self.pool).await.map_err(classify)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn find(&self, schema: &ResourceSchema, id: &Value) -> Result<Option<Row>, RepositoryError> {
        let q = sql::select_by_key(schema, id)?;
        self.fetch_optional(&q).await?.as_ref().map(row_to_row).transpose()
    }

    async fn insert(&self, schema: &ResourceSchema, row: &Row) -> Result<Option<Value>, RepositoryError> {
        let q = sql::insert(schema, row)?;
        if !schema.auto_increment() {
            self.execute(&q).await?;
            return Ok(None);
        }
        let returned = self.fetch_optional(&q).await?.ok_or(RepositoryError::NoRowsAffected)?;
        Ok(Some(decode(raw_cell(&returned, 0)?)?))
    }

    async fn update(&self, schema: &ResourceSchema, row: &Row) -> Result<u64, RepositoryError> {
        let q = sql::update(schema, row)?;
        Ok(self.execute(&q).await?.rows_affected())
    }

    async fn delete(&self, schema: &ResourceSchema, id: &Value) -> Result<(), RepositoryError> {
        let q = match sql::soft_delete(schema, id)? {
            Some(q) => q,
            None => sql::delete(schema, id)?,
        };
        if self.execute(&q).await?.rows_affected() == 0 {
            return Err(RepositoryError::NoRowsAffected);
        }
        Ok(())
    }

    async fn search(&self, schema: &ResourceSchema, filter: &Filter) -> Result<Vec<Row>, RepositoryError> {
        let q = sql::select_where(schema, filter)?;
        self.fetch_all(&q).await?.iter().map(row_to_row).collect()
    }
}

/// Unique violations become `Conflict`; everything else stays a driver error.
fn classify(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(db.constraint().unwrap_or("unique constraint").to_string());
        }
    }
    RepositoryError::Driver(e)
}

fn row_to_row(row: &PgRow) -> Result<Row, RepositoryError> {
    let mut out = Row::new();
    for col in row.columns() {
        let value = decode(raw_cell(row, col.ordinal())?)?;
        out.insert(col.name().to_string(), value);
    }
    Ok(out)
}

/// Read one cell as the driver's native type for its column type.
fn raw_cell(row: &PgRow, i: usize) -> Result<RawValue, sqlx::Error> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(RawValue::Null);
    }
    let type_name = raw.type_info().name().to_string();
    Ok(match type_name.as_str() {
        "INT2" => RawValue::I16(row.try_get(i)?),
        "INT4" => RawValue::I32(row.try_get(i)?),
        "INT8" => RawValue::I64(row.try_get(i)?),
        "FLOAT4" => RawValue::F32(row.try_get(i)?),
        "FLOAT8" => RawValue::F64(row.try_get(i)?),
        "BOOL" => RawValue::Bool(row.try_get(i)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => RawValue::Text(row.try_get_unchecked(i)?),
        "UUID" => RawValue::Uuid(row.try_get(i)?),
        "TIMESTAMPTZ" => RawValue::Timestamp(row.try_get(i)?),
        "TIMESTAMP" => RawValue::NaiveTimestamp(row.try_get(i)?),
        "DATE" => RawValue::Date(row.try_get(i)?),
        "JSON" | "JSONB" => RawValue::Json(row.try_get(i)?),
        "BYTEA" => RawValue::Bytes(row.try_get(i)?),
        _ => RawValue::Unsupported(type_name),
    })
}
