//! Raw resource config types matching the JSON descriptor format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Comma-separated validation rules, e.g. `required,min=4,max=20`. Empty means no rule.
    #[serde(default)]
    pub validator: String,
    /// Field can not be used as a search query parameter.
    #[serde(default)]
    pub unsearchable: bool,
    /// Field can be set on create but never changed afterwards.
    #[serde(default)]
    pub immutable: bool,
    /// PostgreSQL type name used to cast bound parameters (e.g. "timestamptz", "integer", "uuid").
    #[serde(default)]
    pub sql_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BelongsToConfig {
    /// Table of the other resource that this resource belongs to.
    pub table: String,
    /// Field of this resource holding the foreign key to that table.
    pub field: String,
}

/// Routes the HTTP binding should not mount for a resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOmissions {
    #[serde(default, rename = "omit_create_route")]
    pub create: bool,
    #[serde(default, rename = "omit_retrieve_route")]
    pub retrieve: bool,
    #[serde(default, rename = "omit_update_route")]
    pub update: bool,
    #[serde(default, rename = "omit_delete_route")]
    pub delete: bool,
    #[serde(default, rename = "omit_search_route")]
    pub search: bool,
    #[serde(default, rename = "omit_belongs_to_routes")]
    pub belongs_to: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub primary_key: String,
    /// Primary key is assigned by the store and never supplied on insert.
    #[serde(default)]
    pub incremental_pk: bool,
    pub fields: BTreeMap<String, FieldConfig>,
    #[serde(default)]
    pub soft_delete_field: Option<String>,
    #[serde(default)]
    pub created_at_field: Option<String>,
    #[serde(default)]
    pub updated_at_field: Option<String>,
    #[serde(default)]
    pub belongs_to_fields: Vec<BelongsToConfig>,
    #[serde(flatten)]
    pub omit: RouteOmissions,
}

impl ResourceConfig {
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        ResourceConfig {
            table: table.into(),
            schema: None,
            primary_key: primary_key.into(),
            incremental_pk: false,
            fields: BTreeMap::new(),
            soft_delete_field: None,
            created_at_field: None,
            updated_at_field: None,
            belongs_to_fields: Vec::new(),
            omit: RouteOmissions::default(),
        }
    }
}
