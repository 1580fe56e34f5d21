//! Config validation: identifiers, primary key and special-field references.

use crate::config::ResourceConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

const IDENTIFIER: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const SQL_TYPE: &str = r"^[A-Za-z_][A-Za-z0-9_ ]*(\.[A-Za-z_][A-Za-z0-9_]*)?(\[\])?$";

fn is_match(cell: &'static OnceLock<Option<Regex>>, pattern: &str, s: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .map(|re| re.is_match(s))
        .unwrap_or(false)
}

/// Plain SQL identifier. Identifiers end up in SQL text, so nothing else is accepted.
pub fn is_identifier(s: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    is_match(&RE, IDENTIFIER, s)
}

fn is_sql_type(s: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    is_match(&RE, SQL_TYPE, s)
}

fn identifier(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}

pub fn validate(config: &ResourceConfig) -> Result<(), ConfigError> {
    identifier("table", &config.table)?;
    if let Some(schema) = &config.schema {
        identifier("schema", schema)?;
    }
    if config.fields.is_empty() {
        return Err(ConfigError::Validation(format!("{}: at least one field required", config.table)));
    }
    for (name, field) in &config.fields {
        identifier("field", name)?;
        if let Some(t) = &field.sql_type {
            if !is_sql_type(t) {
                return Err(ConfigError::InvalidIdentifier {
                    kind: "sql_type",
                    name: t.clone(),
                });
            }
        }
    }

    if !config.fields.contains_key(&config.primary_key) {
        return Err(ConfigError::InvalidPrimaryKey {
            table: config.table.clone(),
            column: config.primary_key.clone(),
        });
    }

    let mut special = HashSet::new();
    for (kind, field) in [
        ("soft_delete_field", &config.soft_delete_field),
        ("created_at_field", &config.created_at_field),
        ("updated_at_field", &config.updated_at_field),
    ] {
        let Some(name) = field else { continue };
        if !config.fields.contains_key(name) {
            return Err(ConfigError::UnknownField {
                table: config.table.clone(),
                kind,
                field: name.clone(),
            });
        }
        if *name == config.primary_key || !special.insert(name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "{}: field '{}' used for more than one role",
                config.table, name
            )));
        }
    }

    for b in &config.belongs_to_fields {
        identifier("table", &b.table)?;
        if !config.fields.contains_key(&b.field) {
            return Err(ConfigError::UnknownField {
                table: config.table.clone(),
                kind: "belongs_to field",
                field: b.field.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BelongsToConfig, FieldConfig};

    fn users() -> ResourceConfig {
        let mut c = ResourceConfig::new("users", "uuid");
        for f in ["uuid", "first_name", "created_at", "deleted_at"] {
            c.fields.insert(f.into(), FieldConfig::default());
        }
        c.created_at_field = Some("created_at".into());
        c.soft_delete_field = Some("deleted_at".into());
        c
    }

    #[test]
    fn accepts_consistent_config() {
        assert!(validate(&users()).is_ok());
    }

    #[test]
    fn primary_key_must_be_declared() {
        let mut c = users();
        c.primary_key = "id".into();
        assert!(matches!(validate(&c), Err(ConfigError::InvalidPrimaryKey { .. })));
    }

    #[test]
    fn special_fields_must_be_declared_and_distinct() {
        let mut c = users();
        c.updated_at_field = Some("updated_at".into());
        assert!(matches!(validate(&c), Err(ConfigError::UnknownField { kind: "updated_at_field", .. })));

        let mut c = users();
        c.updated_at_field = Some("created_at".into());
        assert!(matches!(validate(&c), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn identifiers_reject_sql_text() {
        let mut c = users();
        c.fields.insert("name; DROP TABLE users".into(), FieldConfig::default());
        assert!(matches!(validate(&c), Err(ConfigError::InvalidIdentifier { kind: "field", .. })));

        let mut c = users();
        c.table = "users\"--".into();
        assert!(matches!(validate(&c), Err(ConfigError::InvalidIdentifier { kind: "table", .. })));
    }

    #[test]
    fn belongs_to_field_must_be_declared() {
        let mut c = users();
        c.belongs_to_fields.push(BelongsToConfig {
            table: "accounts".into(),
            field: "account_id".into(),
        });
        assert!(matches!(validate(&c), Err(ConfigError::UnknownField { .. })));
    }

    #[test]
    fn sql_types_are_checked() {
        assert!(is_sql_type("timestamptz"));
        assert!(is_sql_type("double precision"));
        assert!(is_sql_type("app.status"));
        assert!(is_sql_type("text[]"));
        assert!(!is_sql_type("int); DELETE FROM x; --"));
    }
}
