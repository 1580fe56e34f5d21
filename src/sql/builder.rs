//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resource schema.
//! SQL text only ever contains identifiers from the schema; every value is a `$n` parameter.

use crate::config::ResourceSchema;
use crate::sql::params::{EncodeError, PgBindValue};
use crate::value::{Filter, Row, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("{table} has no field '{field}'")]
    UnknownField { table: String, field: String },
    #[error("primary key value is missing")]
    MissingPrimaryKey,
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Table name, schema-qualified when the resource declares a schema.
fn qualified_table(schema: &ResourceSchema) -> String {
    match schema.schema() {
        Some(s) => format!("{}.{}", quoted(s), quoted(schema.table())),
        None => quoted(schema.table()),
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Placeholder for `v` bound to `column`: `$n` (cast when the column declares a type), or `NULL`.
    fn bind(&mut self, schema: &ResourceSchema, column: &str, v: &Value) -> Result<String, BuildError> {
        if v.is_null() {
            return Ok("NULL".to_string());
        }
        self.params.push(PgBindValue::encode(v)?);
        let n = self.params.len();
        Ok(schema
            .field(column)
            .and_then(|f| f.sql_type.as_deref())
            .map(|t| format!("${}::{}", n, t))
            .unwrap_or_else(|| format!("${}", n)))
    }
}

fn known_field(schema: &ResourceSchema, field: &str) -> Result<(), BuildError> {
    if schema.has_field(field) {
        Ok(())
    } else {
        Err(BuildError::UnknownField {
            table: schema.table().to_string(),
            field: field.to_string(),
        })
    }
}

/// SELECT list: each column as-is, except custom enum (schema.typename), numeric and array columns as col::text
/// so they decode as text.
fn select_column_list(schema: &ResourceSchema) -> String {
    schema
        .fields()
        .map(|(name, f)| {
            let q = quoted(name);
            let sql_type = f.sql_type.as_deref().unwrap_or("");
            if sql_type.contains('.') || sql_type == "numeric" || sql_type.ends_with("[]") {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// ` AND "deleted_at" IS NULL` for soft-deleting resources, empty otherwise.
fn live_condition(schema: &ResourceSchema) -> String {
    schema
        .soft_delete_field()
        .map(|f| format!(" AND {} IS NULL", quoted(f)))
        .unwrap_or_default()
}

/// SELECT one live row by primary key.
pub fn select_by_key(schema: &ResourceSchema, id: &Value) -> Result<QueryBuf, BuildError> {
    if id.is_null() {
        return Err(BuildError::MissingPrimaryKey);
    }
    let mut q = QueryBuf::new();
    let pk = schema.primary_key();
    let ph = q.bind(schema, pk, id)?;
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}{} LIMIT 1",
        select_column_list(schema),
        qualified_table(schema),
        quoted(pk),
        ph,
        live_condition(schema)
    );
    Ok(q)
}

/// SELECT live rows matching the filter, ORDER BY pk. OR within a field's values, AND across fields.
/// A field with no values matches nothing.
pub fn select_where(schema: &ResourceSchema, filter: &Filter) -> Result<QueryBuf, BuildError> {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for (field, values) in filter {
        known_field(schema, field)?;
        let part = match values.as_slice() {
            [] => "1 = 0".to_string(),
            [single] => format!("{} = {}", quoted(field), q.bind(schema, field, single)?),
            many => {
                let placeholders = many
                    .iter()
                    .map(|v| q.bind(schema, field, v))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{} IN ({})", quoted(field), placeholders.join(", "))
            }
        };
        where_parts.push(part);
    }
    let where_clause = if where_parts.is_empty() {
        "TRUE".to_string()
    } else {
        where_parts.join(" AND ")
    };
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}{} ORDER BY {}",
        select_column_list(schema),
        qualified_table(schema),
        where_clause,
        live_condition(schema),
        quoted(schema.primary_key())
    );
    Ok(q)
}

/// INSERT the declared fields present in `row`. A store-assigned key is never inserted; it is
/// returned instead.
pub fn insert(schema: &ResourceSchema, row: &Row) -> Result<QueryBuf, BuildError> {
    let mut q = QueryBuf::new();
    let pk = schema.primary_key();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, val) in row {
        known_field(schema, name)?;
        if schema.auto_increment() && name == pk {
            continue;
        }
        placeholders.push(q.bind(schema, name, val)?);
        cols.push(quoted(name));
    }
    let table = qualified_table(schema);
    let values = if cols.is_empty() {
        " DEFAULT VALUES".to_string()
    } else {
        format!(" ({}) VALUES ({})", cols.join(", "), placeholders.join(", "))
    };
    let returning = if schema.auto_increment() {
        format!(" RETURNING {}", quoted(pk))
    } else {
        String::new()
    };
    q.sql = format!("INSERT INTO {}{}{}", table, values, returning);
    Ok(q)
}

/// UPDATE the live row whose key is in `row`: SET only the other fields present in `row`.
pub fn update(schema: &ResourceSchema, row: &Row) -> Result<QueryBuf, BuildError> {
    let pk = schema.primary_key();
    let id = row.get(pk).filter(|v| !v.is_null()).ok_or(BuildError::MissingPrimaryKey)?;
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (name, val) in row {
        known_field(schema, name)?;
        if name == pk {
            continue;
        }
        let rhs = q.bind(schema, name, val)?;
        sets.push(format!("{} = {}", quoted(name), rhs));
    }
    if sets.is_empty() {
        sets.push(format!("{} = {}", quoted(pk), quoted(pk)));
    }
    let id_ph = q.bind(schema, pk, id)?;
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}{}",
        qualified_table(schema),
        sets.join(", "),
        quoted(pk),
        id_ph,
        live_condition(schema)
    );
    Ok(q)
}

/// DELETE by key.
pub fn delete(schema: &ResourceSchema, id: &Value) -> Result<QueryBuf, BuildError> {
    if id.is_null() {
        return Err(BuildError::MissingPrimaryKey);
    }
    let mut q = QueryBuf::new();
    let pk = schema.primary_key();
    let ph = q.bind(schema, pk, id)?;
    q.sql = format!("DELETE FROM {} WHERE {} = {}", qualified_table(schema), quoted(pk), ph);
    Ok(q)
}

/// Soft delete: stamp the soft-delete field of a live row. `None` when the resource has no such field.
pub fn soft_delete(schema: &ResourceSchema, id: &Value) -> Result<Option<QueryBuf>, BuildError> {
    let Some(field) = schema.soft_delete_field() else {
        return Ok(None);
    };
    if id.is_null() {
        return Err(BuildError::MissingPrimaryKey);
    }
    let mut q = QueryBuf::new();
    let pk = schema.primary_key();
    let ph = q.bind(schema, pk, id)?;
    q.sql = format!(
        "UPDATE {} SET {} = NOW() WHERE {} = {} AND {} IS NULL",
        qualified_table(schema),
        quoted(field),
        quoted(pk),
        ph,
        quoted(field)
    );
    Ok(Some(q))
}
