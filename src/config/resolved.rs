//! Resolved resource schema: config validated and flattened for runtime use.

use crate::case::to_kebab_case;
use crate::config::{BelongsToConfig, FieldConfig, ResourceConfig, RouteOmissions};
use crate::error::ConfigError;
use crate::service::{ValidationErrors, Validator};
use crate::value::{Row, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldSpec {
    pub validator: String,
    pub searchable: bool,
    pub immutable: bool,
    pub sql_type: Option<String>,
}

impl From<&FieldConfig> for FieldSpec {
    fn from(c: &FieldConfig) -> Self {
        FieldSpec {
            validator: c.validator.clone(),
            searchable: !c.unsearchable,
            immutable: c.immutable,
            sql_type: c.sql_type.clone(),
        }
    }
}

/// Many-to-one relation: `field` of this resource references a row of `table`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BelongsTo {
    pub table: String,
    pub field: String,
}

impl From<&BelongsToConfig> for BelongsTo {
    fn from(c: &BelongsToConfig) -> Self {
        BelongsTo {
            table: c.table.clone(),
            field: c.field.clone(),
        }
    }
}

/// Produces primary keys for resources whose key is not assigned by the store.
#[derive(Clone)]
pub struct KeyGenerator(Arc<dyn Fn() -> Value + Send + Sync>);

impl KeyGenerator {
    pub fn new(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        KeyGenerator(Arc::new(f))
    }

    pub fn generate(&self) -> Value {
        (self.0)()
    }
}

impl Default for KeyGenerator {
    /// Random UUID v4 string.
    fn default() -> Self {
        KeyGenerator::new(|| Value::Text(uuid::Uuid::new_v4().to_string()))
    }
}

impl fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyGenerator")
    }
}

/// Read-only description of one resource. Built once at startup and shared across requests.
#[derive(Clone, Debug)]
pub struct ResourceSchema {
    table: String,
    schema: Option<String>,
    primary_key: String,
    auto_increment: bool,
    fields: BTreeMap<String, FieldSpec>,
    soft_delete_field: Option<String>,
    created_at_field: Option<String>,
    updated_at_field: Option<String>,
    belongs_to: Vec<BelongsTo>,
    key_generator: KeyGenerator,
    omit: RouteOmissions,
}

impl ResourceSchema {
    /// Build from a config that already passed `config::validate`.
    pub(crate) fn from_validated(config: &ResourceConfig) -> Self {
        ResourceSchema {
            table: config.table.clone(),
            schema: config.schema.clone(),
            primary_key: config.primary_key.clone(),
            auto_increment: config.incremental_pk,
            fields: config.fields.iter().map(|(k, f)| (k.clone(), FieldSpec::from(f))).collect(),
            soft_delete_field: config.soft_delete_field.clone(),
            created_at_field: config.created_at_field.clone(),
            updated_at_field: config.updated_at_field.clone(),
            belongs_to: config.belongs_to_fields.iter().map(BelongsTo::from).collect(),
            key_generator: KeyGenerator::default(),
            omit: config.omit,
        }
    }

    pub fn builder(table: impl Into<String>, primary_key: impl Into<String>) -> ResourceSchemaBuilder {
        ResourceSchemaBuilder {
            config: ResourceConfig::new(table, primary_key),
            key_generator: None,
        }
    }

    pub fn with_key_generator(mut self, generator: KeyGenerator) -> Self {
        self.key_generator = generator;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Declared field names in sorted order; this is the column order of every SELECT.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn soft_delete_field(&self) -> Option<&str> {
        self.soft_delete_field.as_deref()
    }

    pub fn created_at_field(&self) -> Option<&str> {
        self.created_at_field.as_deref()
    }

    pub fn updated_at_field(&self) -> Option<&str> {
        self.updated_at_field.as_deref()
    }

    pub fn belongs_to(&self) -> &[BelongsTo] {
        &self.belongs_to
    }

    pub fn association(&self, table: &str) -> Option<&BelongsTo> {
        self.belongs_to.iter().find(|b| b.table == table)
    }

    pub fn omissions(&self) -> RouteOmissions {
        self.omit
    }

    /// Route segment for the resource: the table name in kebab case.
    pub fn route_name(&self) -> String {
        to_kebab_case(&self.table)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// False for unknown fields.
    pub fn is_searchable(&self, name: &str) -> bool {
        self.fields.get(name).map(|f| f.searchable).unwrap_or(false)
    }

    /// Fields a client may never change: declared immutable, plus the created-at and soft-delete fields.
    pub fn is_client_immutable(&self, name: &str) -> bool {
        self.fields.get(name).map(|f| f.immutable).unwrap_or(false)
            || self.created_at_field.as_deref() == Some(name)
            || self.soft_delete_field.as_deref() == Some(name)
    }

    /// Validate one value against the field's rule. No-op when the field has no rule.
    pub fn validate_field(&self, validator: &dyn Validator, name: &str, value: &Value) -> Result<(), String> {
        match self.fields.get(name) {
            Some(spec) if !spec.validator.is_empty() => validator.validate_one(value, &spec.validator),
            _ => Ok(()),
        }
    }

    /// Validate only the declared fields present in `row` (partial updates).
    pub fn validate_fields(&self, validator: &dyn Validator, row: &Row) -> ValidationErrors {
        let rules = self.rules(|name| row.contains_key(name));
        validator.validate_batch(row, &rules)
    }

    /// Validate every declared field, absent ones as null, so required fields are enforced on create.
    /// A store-assigned primary key is skipped since the caller never supplies it.
    pub fn validate_all_fields(&self, validator: &dyn Validator, row: &Row) -> ValidationErrors {
        let rules = self.rules(|name| !(self.auto_increment && name == self.primary_key));
        validator.validate_batch(row, &rules)
    }

    fn rules(&self, include: impl Fn(&str) -> bool) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|(name, spec)| !spec.validator.is_empty() && include(name.as_str()))
            .map(|(name, spec)| (name.clone(), spec.validator.clone()))
            .collect()
    }

    pub fn generate_primary_key(&self) -> Value {
        self.key_generator.generate()
    }
}

/// Code-side construction; goes through the same validation as JSON configs.
pub struct ResourceSchemaBuilder {
    config: ResourceConfig,
    key_generator: Option<KeyGenerator>,
}

impl ResourceSchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, field: FieldConfig) -> Self {
        self.config.fields.insert(name.into(), field);
        self
    }

    /// Field with only a validation rule.
    pub fn rule(self, name: impl Into<String>, validator: impl Into<String>) -> Self {
        self.field(
            name,
            FieldConfig {
                validator: validator.into(),
                ..FieldConfig::default()
            },
        )
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.schema = Some(schema.into());
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.config.incremental_pk = true;
        self
    }

    pub fn soft_delete(mut self, field: impl Into<String>) -> Self {
        self.config.soft_delete_field = Some(field.into());
        self
    }

    pub fn created_at(mut self, field: impl Into<String>) -> Self {
        self.config.created_at_field = Some(field.into());
        self
    }

    pub fn updated_at(mut self, field: impl Into<String>) -> Self {
        self.config.updated_at_field = Some(field.into());
        self
    }

    pub fn belongs_to(mut self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.config.belongs_to_fields.push(BelongsToConfig {
            table: table.into(),
            field: field.into(),
        });
        self
    }

    pub fn omit(mut self, omit: RouteOmissions) -> Self {
        self.config.omit = omit;
        self
    }

    pub fn key_generator(mut self, generator: KeyGenerator) -> Self {
        self.key_generator = Some(generator);
        self
    }

    pub fn build(self) -> Result<ResourceSchema, ConfigError> {
        let schema = crate::config::resolve(&self.config)?;
        Ok(match self.key_generator {
            Some(g) => schema.with_key_generator(g),
            None => schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::RuleValidator;

    fn users() -> ResourceSchema {
        ResourceSchema::builder("users", "uuid")
            .rule("uuid", "uuid4")
            .rule("first_name", "required,min=4,max=20")
            .field(
                "phone",
                FieldConfig {
                    unsearchable: true,
                    ..FieldConfig::default()
                },
            )
            .field("created_at", FieldConfig::default())
            .field("deleted_at", FieldConfig::default())
            .created_at("created_at")
            .soft_delete("deleted_at")
            .build()
            .unwrap()
    }

    #[test]
    fn field_queries() {
        let s = users();
        assert!(s.has_field("phone"));
        assert!(!s.has_field("email"));
        assert!(s.is_searchable("first_name"));
        assert!(!s.is_searchable("phone"));
        assert!(!s.is_searchable("email"));
        assert!(s.is_client_immutable("created_at"));
        assert!(s.is_client_immutable("deleted_at"));
        assert!(!s.is_client_immutable("first_name"));
        assert_eq!(
            s.field_names().collect::<Vec<_>>(),
            vec!["created_at", "deleted_at", "first_name", "phone", "uuid"]
        );
    }

    #[test]
    fn validate_field_without_rule_is_noop() {
        let s = users();
        assert!(s.validate_field(&RuleValidator, "phone", &Value::Null).is_ok());
        assert!(s.validate_field(&RuleValidator, "first_name", &Value::from("Jo")).is_err());
    }

    #[test]
    fn validate_fields_checks_only_present_keys() {
        let s = users();
        let mut row = Row::new();
        row.insert("phone".into(), Value::from("123"));
        assert!(s.validate_fields(&RuleValidator, &row).is_empty());
    }

    #[test]
    fn validate_all_fields_enforces_required() {
        let s = users();
        let mut row = Row::new();
        row.insert("uuid".into(), Value::from(uuid::Uuid::new_v4().to_string()));
        let errors = s.validate_all_fields(&RuleValidator, &row);
        assert_eq!(errors.len(), 1);
        assert!(errors.get("first_name").is_some());
    }

    #[test]
    fn default_key_generator_yields_uuid_strings() {
        let key = users().generate_primary_key();
        let text = key.as_str().unwrap();
        assert!(uuid::Uuid::parse_str(text).is_ok());
    }

    #[test]
    fn custom_key_generator() {
        let s = ResourceSchema::builder("tokens", "id")
            .rule("id", "")
            .key_generator(KeyGenerator::new(|| Value::from("fixed")))
            .build()
            .unwrap();
        assert_eq!(s.generate_primary_key(), Value::from("fixed"));
    }

    #[test]
    fn route_name_is_kebab_case() {
        let s = ResourceSchema::builder("rent_events", "uuid").rule("uuid", "").build().unwrap();
        assert_eq!(s.route_name(), "rent-events");
    }
}
