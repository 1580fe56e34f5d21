//! Load resource configs from JSON strings, files or a directory of files.

use crate::config::resolved::ResourceSchema;
use crate::config::types::ResourceConfig;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashSet;
use std::path::Path;

/// Build a resource schema from config (validates first).
pub fn resolve(config: &ResourceConfig) -> Result<ResourceSchema, ConfigError> {
    validate(config)?;
    Ok(ResourceSchema::from_validated(config))
}

pub fn from_json_str(json: &str) -> Result<ResourceSchema, ConfigError> {
    let config: ResourceConfig = serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
    resolve(&config)
}

pub async fn load_from_file(path: impl AsRef<Path>) -> Result<ResourceSchema, ConfigError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    from_json_str(&text).map_err(|e| match e {
        ConfigError::Load(msg) => ConfigError::Load(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Load every `*.json` file in `dir`, in file-name order. Route names must be unique.
pub async fn load_from_dir(dir: impl AsRef<Path>) -> Result<Vec<ResourceSchema>, ConfigError> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", dir.display(), e)))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        } else {
            tracing::warn!(path = %path.display(), "skipping non-json file in resources directory");
        }
    }
    paths.sort();

    let mut schemas = Vec::with_capacity(paths.len());
    let mut routes = HashSet::new();
    for path in paths {
        let schema = load_from_file(&path).await?;
        if !routes.insert(schema.route_name()) {
            return Err(ConfigError::DuplicateRoute(schema.route_name()));
        }
        tracing::info!(table = %schema.table(), path = %path.display(), "loaded resource");
        schemas.push(schema);
    }
    Ok(schemas)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = r#"{
        "table": "users",
        "primary_key": "uuid",
        "fields": {
            "uuid": {"validator": "uuid4"},
            "first_name": {"validator": "required,min=4,max=20"},
            "phone": {"unsearchable": true},
            "created_at": {"sql_type": "timestamptz"},
            "deleted_at": {"sql_type": "timestamptz"}
        },
        "soft_delete_field": "deleted_at",
        "created_at_field": "created_at",
        "updated_at_field": null,
        "belongs_to_fields": [],
        "omit_delete_route": true
    }"#;

    #[test]
    fn loads_json_descriptor() {
        let s = from_json_str(USERS).unwrap();
        assert_eq!(s.table(), "users");
        assert_eq!(s.primary_key(), "uuid");
        assert!(!s.auto_increment());
        assert_eq!(s.soft_delete_field(), Some("deleted_at"));
        assert_eq!(s.created_at_field(), Some("created_at"));
        assert_eq!(s.updated_at_field(), None);
        assert!(!s.is_searchable("phone"));
        assert_eq!(s.field("created_at").unwrap().sql_type.as_deref(), Some("timestamptz"));
        assert!(s.omissions().delete);
        assert!(!s.omissions().create);
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        assert!(matches!(from_json_str("{\"table\": 1}"), Err(ConfigError::Load(_))));
    }

    #[test]
    fn inconsistent_json_is_rejected() {
        let json = USERS.replace("\"primary_key\": \"uuid\"", "\"primary_key\": \"id\"");
        assert!(matches!(from_json_str(&json), Err(ConfigError::InvalidPrimaryKey { .. })));
    }

    #[tokio::test]
    async fn loads_directory_in_name_order() {
        let dir = std::env::temp_dir().join(format!("simple-rest-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("b_users.json"), USERS).await.unwrap();
        tokio::fs::write(
            dir.join("a_events.json"),
            r#"{"table": "events", "primary_key": "id", "incremental_pk": true, "fields": {"id": {}}}"#,
        )
        .await
        .unwrap();
        tokio::fs::write(dir.join("README.md"), "ignored").await.unwrap();

        let schemas = load_from_dir(&dir).await.unwrap();
        let tables: Vec<_> = schemas.iter().map(|s| s.table().to_string()).collect();
        assert_eq!(tables, vec!["events", "users"]);
        assert!(schemas[0].auto_increment());

        tokio::fs::write(dir.join("c_users.json"), USERS).await.unwrap();
        assert!(matches!(load_from_dir(&dir).await, Err(ConfigError::DuplicateRoute(_))));
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
