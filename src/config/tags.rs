//! Resource configs derived from a typed record's field annotations.
//!
//! A record lists its fields with struct-tag style annotations, parsed once at startup:
//!
//! ```
//! use simple_rest::config::TaggedRecord;
//!
//! struct RentEvent;
//!
//! impl TaggedRecord for RentEvent {
//!     const TYPE_NAME: &'static str = "RentEvent";
//!     const FIELDS: &'static [(&'static str, &'static str)] = &[
//!         ("uuid", r#"pk:"true" validate:"uuid4""#),
//!         ("user_id", r#"belongs_to:"users""#),
//!         ("hours", r#"validate:"positive" sql_type:"integer""#),
//!         ("created_at", r#"created_at:"true""#),
//!         ("deleted_at", r#"soft_delete:"true""#),
//!     ];
//! }
//!
//! let schema = simple_rest::ResourceSchema::from_record::<RentEvent>().unwrap();
//! assert_eq!(schema.table(), "rent_event");
//! ```

use crate::case::to_snake_case;
use crate::config::{resolve, BelongsToConfig, FieldConfig, ResourceConfig, ResourceSchema};
use crate::error::ConfigError;

/// A record type whose fields describe a resource.
pub trait TaggedRecord {
    /// The table is the snake_case form of this name.
    const TYPE_NAME: &'static str;
    /// `(field name, tags)` in declaration order.
    const FIELDS: &'static [(&'static str, &'static str)];
}

/// Parse `key:"value" key2:"value2"` into pairs.
pub fn parse_tags(tags: &str) -> Result<Vec<(&str, &str)>, ConfigError> {
    let mut out = Vec::new();
    let mut rest = tags.trim_start();
    while !rest.is_empty() {
        let (key, after) = rest
            .split_once(':')
            .ok_or_else(|| ConfigError::Validation(format!("malformed tag near '{}'", rest)))?;
        let after = after
            .strip_prefix('"')
            .ok_or_else(|| ConfigError::Validation(format!("tag '{}' value must be quoted", key)))?;
        let (value, after) = after
            .split_once('"')
            .ok_or_else(|| ConfigError::Validation(format!("tag '{}' value is not terminated", key)))?;
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(format!("malformed tag key '{}'", key)));
        }
        out.push((key, value));
        rest = after.trim_start();
    }
    Ok(out)
}

pub fn config_from_tags(type_name: &str, fields: &[(&str, &str)]) -> Result<ResourceConfig, ConfigError> {
    let table = to_snake_case(type_name);
    let mut primary_key = None;
    let mut config = ResourceConfig::new(table, String::new());

    for (field_name, tags) in fields {
        let tags = parse_tags(tags)?;
        let tag = |k: &str| tags.iter().find(|(key, _)| *key == k).map(|(_, v)| *v);

        let name = match tag("db").or_else(|| tag("json")) {
            Some("-") => continue,
            Some(n) if !n.is_empty() => n.to_string(),
            _ => to_snake_case(field_name),
        };

        match tag("pk").or_else(|| tag("primary_key")) {
            Some("true") => primary_key = Some(name.clone()),
            Some("autoincremental") => {
                primary_key = Some(name.clone());
                config.incremental_pk = true;
            }
            _ => {}
        }
        if tag("soft_delete") == Some("true") {
            config.soft_delete_field = Some(name.clone());
        }
        if tag("created_at") == Some("true") {
            config.created_at_field = Some(name.clone());
        }
        if tag("updated_at") == Some("true") {
            config.updated_at_field = Some(name.clone());
        }
        if let Some(table) = tag("belongs_to").filter(|t| !t.is_empty()) {
            config.belongs_to_fields.push(BelongsToConfig {
                table: table.to_string(),
                field: name.clone(),
            });
        }
        let field = FieldConfig {
            validator: tag("validate").unwrap_or_default().to_string(),
            unsearchable: tag("unsearchable") == Some("true"),
            immutable: tag("immutable") == Some("true"),
            sql_type: tag("sql_type").map(str::to_string),
        };
        if config.fields.insert(name.clone(), field).is_some() {
            return Err(ConfigError::Validation(format!("{}: duplicate field '{}'", type_name, name)));
        }
    }

    config.primary_key = primary_key
        .ok_or_else(|| ConfigError::Validation(format!("{}: no field tagged pk", type_name)))?;
    Ok(config)
}

impl ResourceSchema {
    /// Derive the schema from a tagged record. Tags are read here once; nothing later looks at them again.
    pub fn from_record<T: TaggedRecord>() -> Result<ResourceSchema, ConfigError> {
        resolve(&config_from_tags(T::TYPE_NAME, T::FIELDS)?)
    }
}
