//! Simple REST: schema-driven CRUD engine exposing relational tables as REST resources.

pub mod case;
pub mod config;
pub mod error;
pub mod handlers;
pub mod repository;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod value;

pub use config::{
    from_json_str, load_from_dir, load_from_file, resolve, BelongsTo, KeyGenerator, ResourceConfig, ResourceSchema,
    TaggedRecord,
};
pub use error::{AppError, ConfigError};
pub use repository::{MemoryRepository, PgRepository, Repository, RepositoryError};
pub use routes::{common_routes, common_routes_with_ready, resource_routes};
pub use service::{CrudService, NoopValidator, RuleValidator, UpdateMode, ValidationErrors, Validator};
pub use settings::Settings;
pub use value::{Filter, Row, Value};
