//! Generic CRUD pipeline: schema policy first, then the repository.

use crate::config::ResourceSchema;
use crate::error::AppError;
use crate::repository::{Repository, RepositoryError};
use crate::service::validation::{ValidationErrors, Validator};
use crate::value::{self, DecodeError, Filter, Row, Value};
use chrono::Utc;
use std::sync::Arc;

/// PUT replaces the whole record, PATCH only the supplied fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    Partial,
    Replace,
}

/// One resource's operations. Holds no request state; share it behind `Arc`.
pub struct CrudService {
    schema: Arc<ResourceSchema>,
    validator: Arc<dyn Validator>,
    repository: Arc<dyn Repository>,
}

impl CrudService {
    pub fn new(schema: Arc<ResourceSchema>, validator: Arc<dyn Validator>, repository: Arc<dyn Repository>) -> Self {
        CrudService {
            schema,
            validator,
            repository,
        }
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// Insert a new record and return its primary key.
    pub async fn create(&self, mut body: Row) -> Result<Value, AppError> {
        let s = &*self.schema;
        let pk = s.primary_key();
        let mut errors = self.unknown_fields(&body);

        let key = if s.auto_increment() {
            if body.get(pk).is_some_and(|v| !v.is_null()) {
                errors.insert(pk, "is assigned by the store and can not be supplied");
            }
            body.remove(pk);
            None
        } else {
            let key = s.generate_primary_key();
            body.insert(pk.to_string(), key.clone());
            Some(key)
        };

        let now = Value::Timestamp(Utc::now());
        if let Some(f) = s.created_at_field() {
            body.insert(f.to_string(), now.clone());
        }
        if let Some(f) = s.updated_at_field() {
            body.insert(f.to_string(), now);
        }
        if let Some(f) = s.soft_delete_field() {
            body.insert(f.to_string(), Value::Null);
        }

        errors.merge(s.validate_all_fields(self.validator.as_ref(), &body));
        errors.into_result()?;

        let assigned = self.repository.insert(s, &body).await.map_err(|e| self.fault("create", e))?;
        key.or(assigned)
            .ok_or_else(|| self.fault("create", RepositoryError::MissingPrimaryKey))
    }

    pub async fn retrieve(&self, id: &str) -> Result<Row, AppError> {
        let id = self.key_from_path(id)?;
        self.repository
            .find(&self.schema, &id)
            .await
            .map_err(|e| self.fault("retrieve", e))?
            .ok_or(AppError::NotFound)
    }

    /// Update the record named by the body's primary key. Returns the number of affected records.
    pub async fn update(&self, mut body: Row, mode: UpdateMode) -> Result<u64, AppError> {
        let s = &*self.schema;
        let pk = s.primary_key();
        if body.get(pk).map_or(true, Value::is_null) {
            return Err(AppError::invalid(pk, "is required"));
        }

        let mut errors = self.unknown_fields(&body);
        for name in body.keys() {
            if name != pk && s.is_client_immutable(name) {
                errors.insert(name.clone(), "can not be changed");
            }
        }

        if let Some(f) = s.updated_at_field() {
            body.insert(f.to_string(), Value::Timestamp(Utc::now()));
        }
        if mode == UpdateMode::Replace {
            let absent: Vec<String> = s
                .field_names()
                .filter(|name| *name != pk && !s.is_client_immutable(name) && !body.contains_key(*name))
                .map(str::to_string)
                .collect();
            for name in absent {
                body.insert(name, Value::Null);
            }
        }

        errors.merge(s.validate_fields(self.validator.as_ref(), &body));
        errors.into_result()?;

        let affected = self.repository.update(s, &body).await.map_err(|e| self.fault("update", e))?;
        if affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(affected)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let id = self.key_from_path(id)?;
        self.repository.delete(&self.schema, &id).await.map_err(|e| self.fault("delete", e))
    }

    /// Records whose fields equal one of the given values. Every key must be a searchable field.
    /// Text values are read as the field's column type before they are checked and matched.
    pub async fn search(&self, filter: Filter) -> Result<Vec<Row>, AppError> {
        let s = &*self.schema;
        let mut errors = ValidationErrors::new();
        let mut typed = Filter::new();
        for (field, values) in filter {
            if !s.is_searchable(&field) {
                errors.insert(field, "is not searchable");
                continue;
            }
            let mut converted = Vec::with_capacity(values.len());
            for v in values {
                let v = match typed_value(s, &field, v) {
                    Ok(v) => v,
                    Err(e) => {
                        errors.insert(field.clone(), e.to_string());
                        continue;
                    }
                };
                if let Err(message) = s.validate_field(self.validator.as_ref(), &field, &v) {
                    errors.insert(field.clone(), message);
                }
                converted.push(v);
            }
            typed.insert(field, converted);
        }
        errors.into_result()?;
        self.repository.search(s, &typed).await.map_err(|e| self.fault("search", e))
    }

    /// Records of this resource that belong to the `related_table` record with key `id`.
    pub async fn belongs_to(&self, related_table: &str, id: &str) -> Result<Vec<Row>, AppError> {
        let s = &*self.schema;
        let association = s.association(related_table).ok_or_else(|| {
            AppError::BadRequest(format!("{} does not belong to {}", s.table(), related_table))
        })?;
        // The related key is checked with this resource's own key rule.
        let _ = self.key_from_path(id)?;
        let value = path_value(s, &association.field, id);
        self.repository
            .find_by_foreign_key(s, &value, association)
            .await
            .map_err(|e| self.fault("belongs_to", e))
    }

    fn unknown_fields(&self, body: &Row) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for name in body.keys().filter(|name| !self.schema.has_field(name)) {
            errors.insert(name.clone(), format!("is not a field of {}", self.schema.table()));
        }
        errors
    }

    /// Primary key from a path segment, checked against the key's rule.
    fn key_from_path(&self, id: &str) -> Result<Value, AppError> {
        let pk = self.schema.primary_key();
        if id.is_empty() {
            return Err(AppError::invalid(pk, "is required"));
        }
        let value = path_value(&self.schema, pk, id);
        self.schema
            .validate_field(self.validator.as_ref(), pk, &value)
            .map_err(|message| AppError::invalid(pk, message))?;
        Ok(value)
    }

    fn fault(&self, op: &'static str, e: RepositoryError) -> AppError {
        let err = AppError::from(e);
        match &err {
            AppError::Infrastructure(detail) => {
                tracing::error!(table = %self.schema.table(), op, error = %detail, "storage failure")
            }
            AppError::Conflict(constraint) => {
                tracing::warn!(table = %self.schema.table(), op, constraint = %constraint, "duplicate key")
            }
            _ => {}
        }
        err
    }
}

/// Column type used to read request text for `field`. A store-assigned key is an integer.
fn column_type<'a>(schema: &'a ResourceSchema, field: &str) -> Option<&'a str> {
    schema
        .field(field)
        .and_then(|f| f.sql_type.as_deref())
        .or_else(|| (field == schema.primary_key() && schema.auto_increment()).then_some("bigint"))
}

/// Text query values read as the field's column type; other values pass through.
fn typed_value(schema: &ResourceSchema, field: &str, v: Value) -> Result<Value, DecodeError> {
    match (v, column_type(schema, field)) {
        (Value::Text(text), Some(t)) => value::from_text(&text, t),
        (v, _) => Ok(v),
    }
}

/// Path segments arrive as text; integer keys are read as integers.
/// Anything else stays text so the key rule reports it.
fn path_value(schema: &ResourceSchema, field: &str, raw: &str) -> Value {
    match column_type(schema, field) {
        Some(t) if value::is_integer_type(t) => {
            value::from_text(raw, t).unwrap_or_else(|_| Value::Text(raw.to_string()))
        }
        _ => Value::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldConfig, KeyGenerator};
    use crate::repository::MemoryRepository;
    use crate::service::{NoopValidator, RuleValidator};

    fn events() -> Arc<ResourceSchema> {
        Arc::new(
            ResourceSchema::builder("events", "id")
                .auto_increment()
                .rule("id", "numeric")
                .rule("name", "required")
                .field(
                    "user_id",
                    FieldConfig {
                        sql_type: Some("integer".into()),
                        ..FieldConfig::default()
                    },
                )
                .belongs_to("users", "user_id")
                .build()
                .unwrap(),
        )
    }

    fn service(schema: Arc<ResourceSchema>) -> CrudService {
        CrudService::new(schema, Arc::new(RuleValidator), Arc::new(MemoryRepository::new()))
    }

    fn body(json: serde_json::Value) -> Row {
        json.as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v).unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn auto_increment_key_is_assigned_and_never_supplied() {
        let svc = service(events());
        let key = svc.create(body(serde_json::json!({"name": "launch"}))).await.unwrap();
        assert_eq!(key, Value::Int(1));

        let err = svc.create(body(serde_json::json!({"id": 9, "name": "x"}))).await.unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.get("id").is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn integer_keys_from_path() {
        let svc = service(events());
        svc.create(body(serde_json::json!({"name": "launch", "user_id": 7}))).await.unwrap();
        let row = svc.retrieve("1").await.unwrap();
        assert_eq!(row["name"], Value::from("launch"));
        assert_eq!(path_value(svc.schema(), "user_id", "7"), Value::Int(7));
        assert_eq!(path_value(svc.schema(), "name", "7"), Value::from("7"));
        assert_eq!(svc.belongs_to("users", "7").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_id_is_required() {
        let svc = service(events());
        assert!(matches!(svc.retrieve("").await, Err(AppError::Validation(_))));
        assert!(matches!(svc.delete("").await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn belongs_to_requires_declared_association() {
        let svc = service(events());
        assert!(matches!(svc.belongs_to("vehicles", "1").await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn update_requires_primary_key() {
        let svc = service(events());
        let err = svc
            .update(body(serde_json::json!({"name": "x"})), UpdateMode::Partial)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_key_is_a_conflict() {
        let schema = ResourceSchema::builder("tokens", "code")
            .rule("code", "required")
            .key_generator(KeyGenerator::new(|| Value::from("fixed")))
            .build()
            .unwrap();
        let svc = service(Arc::new(schema));
        svc.create(Row::new()).await.unwrap();
        assert!(matches!(svc.create(Row::new()).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn noop_validator_skips_rules() {
        let svc = CrudService::new(events(), Arc::new(NoopValidator), Arc::new(MemoryRepository::new()));
        assert!(svc.create(Row::new()).await.is_ok());
    }
}
