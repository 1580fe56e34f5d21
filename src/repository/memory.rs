//! In-memory repository with the same matching semantics as the SQL backend. Used for tests and demos.

use crate::config::ResourceSchema;
use crate::repository::{Repository, RepositoryError};
use crate::value::{Filter, Row, Value};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Table {
    /// Canonical text of the primary key -> row.
    rows: HashMap<String, Row>,
    last_id: i64,
}

/// All tables behind one lock; every operation sees a consistent store.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row of the resource, soft-deleted ones included, ordered by key.
    pub fn all_rows(&self, schema: &ResourceSchema) -> Result<Vec<Row>, RepositoryError> {
        let mut tables = self.lock()?;
        let table = tables.entry(table_key(schema)).or_default();
        Ok(sorted(schema, table.rows.values().cloned().collect()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Table>>, RepositoryError> {
        self.tables.lock().map_err(|_| RepositoryError::Poisoned)
    }
}

fn table_key(schema: &ResourceSchema) -> String {
    match schema.schema() {
        Some(s) => format!("{}.{}", s, schema.table()),
        None => schema.table().to_string(),
    }
}

fn is_live(schema: &ResourceSchema, row: &Row) -> bool {
    match schema.soft_delete_field() {
        Some(f) => row.get(f).map(Value::is_null).unwrap_or(true),
        None => true,
    }
}

fn check_fields<'a>(schema: &ResourceSchema, mut names: impl Iterator<Item = &'a String>) -> Result<(), RepositoryError> {
    match names.find(|name| !schema.has_field(name)) {
        Some(name) => Err(RepositoryError::UnknownField {
            table: schema.table().to_string(),
            field: name.clone(),
        }),
        None => Ok(()),
    }
}

fn storage_key(id: &Value) -> Result<String, RepositoryError> {
    id.canonical_text().ok_or(RepositoryError::MissingPrimaryKey)
}

fn sorted(schema: &ResourceSchema, mut rows: Vec<Row>) -> Vec<Row> {
    let pk = schema.primary_key();
    rows.sort_by(|a, b| {
        let a = a.get(pk).unwrap_or(&Value::Null);
        let b = b.get(pk).unwrap_or(&Value::Null);
        a.key_order(b)
    });
    rows
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find(&self, schema: &ResourceSchema, id: &Value) -> Result<Option<Row>, RepositoryError> {
        let key = storage_key(id)?;
        let tables = self.lock()?;
        Ok(tables
            .get(&table_key(schema))
            .and_then(|t| t.rows.get(&key))
            .filter(|row| is_live(schema, row))
            .cloned())
    }

    async fn insert(&self, schema: &ResourceSchema, row: &Row) -> Result<Option<Value>, RepositoryError> {
        check_fields(schema, row.keys())?;
        let pk = schema.primary_key();
        let mut tables = self.lock()?;
        let table = tables.entry(table_key(schema)).or_default();

        let mut stored: Row = schema.field_names().map(|f| (f.to_string(), Value::Null)).collect();
        stored.extend(row.iter().map(|(k, v)| (k.clone(), v.clone())));

        let key = if schema.auto_increment() {
            let next = table.last_id + 1;
            stored.insert(pk.to_string(), Value::Int(next));
            Value::Int(next)
        } else {
            stored.get(pk).cloned().unwrap_or(Value::Null)
        };
        let storage = storage_key(&key)?;
        if table.rows.contains_key(&storage) {
            return Err(RepositoryError::Conflict(format!("{}_pkey", schema.table())));
        }
        if let Value::Int(n) = key {
            table.last_id = table.last_id.max(n);
        }
        table.rows.insert(storage, stored);
        Ok(schema.auto_increment().then_some(key))
    }

    async fn update(&self, schema: &ResourceSchema, row: &Row) -> Result<u64, RepositoryError> {
        check_fields(schema, row.keys())?;
        let pk = schema.primary_key();
        let key = storage_key(row.get(pk).unwrap_or(&Value::Null))?;
        let mut tables = self.lock()?;
        let Some(stored) = tables
            .get_mut(&table_key(schema))
            .and_then(|t| t.rows.get_mut(&key))
            .filter(|r| is_live(schema, r))
        else {
            return Ok(0);
        };
        for (name, value) in row {
            if name != pk {
                stored.insert(name.clone(), value.clone());
            }
        }
        Ok(1)
    }

    async fn delete(&self, schema: &ResourceSchema, id: &Value) -> Result<(), RepositoryError> {
        let key = storage_key(id)?;
        let mut tables = self.lock()?;
        let table = tables.get_mut(&table_key(schema)).ok_or(RepositoryError::NoRowsAffected)?;
        if !table.rows.get(&key).map(|r| is_live(schema, r)).unwrap_or(false) {
            return Err(RepositoryError::NoRowsAffected);
        }
        match schema.soft_delete_field() {
            Some(f) => {
                if let Some(row) = table.rows.get_mut(&key) {
                    row.insert(f.to_string(), Value::Timestamp(Utc::now()));
                }
            }
            None => {
                table.rows.remove(&key);
            }
        }
        Ok(())
    }

    async fn search(&self, schema: &ResourceSchema, filter: &Filter) -> Result<Vec<Row>, RepositoryError> {
        check_fields(schema, filter.keys())?;
        let tables = self.lock()?;
        let Some(table) = tables.get(&table_key(schema)) else {
            return Ok(Vec::new());
        };
        let matches = |row: &Row| {
            filter.iter().all(|(field, values)| {
                let cell = row.get(field).unwrap_or(&Value::Null);
                values.iter().any(|v| cell.loosely_eq(v))
            })
        };
        let rows = table
            .rows
            .values()
            .filter(|row| is_live(schema, row) && matches(*row))
            .cloned()
            .collect();
        Ok(sorted(schema, rows))
    }
}
