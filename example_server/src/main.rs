//! Example server: users and vehicles from JSON descriptors, rent events from a tagged record.
//!
//! Run from this directory: `cargo run` (in-memory store), or with `DATABASE_URL` set
//! after applying `schema.sql`.

use simple_rest::{
    common_routes, common_routes_with_ready, load_from_dir, resource_routes, CrudService, MemoryRepository,
    PgRepository, Repository, ResourceSchema, RuleValidator, Settings, TaggedRecord,
};
use std::sync::Arc;
use tokio::net::TcpListener;

struct RentEvents;

impl TaggedRecord for RentEvents {
    const TYPE_NAME: &'static str = "RentEvents";
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("UUID", r#"json:"uuid" primary_key:"true" validate:"uuid4""#),
        ("UserID", r#"json:"user_id" belongs_to:"users" validate:"required,uuid4" immutable:"true""#),
        ("VehicleID", r#"json:"vehicle_id" belongs_to:"vehicles" validate:"required,uuid4" immutable:"true""#),
        ("StartingTime", r#"json:"starting_time" validate:"required,datetime" sql_type:"timestamptz""#),
        ("Hours", r#"json:"hours" validate:"required,positive" sql_type:"integer""#),
        ("CheckinTime", r#"json:"checkin_time" validate:"datetime" sql_type:"timestamptz""#),
        ("DropoffTime", r#"json:"dropoff_time" validate:"datetime" sql_type:"timestamptz""#),
        ("CancelTime", r#"json:"cancel_time" validate:"datetime" sql_type:"timestamptz""#),
        ("CreatedAt", r#"json:"created_at" created_at:"true" sql_type:"timestamptz""#),
        ("UpdatedAt", r#"json:"updated_at" updated_at:"true" sql_type:"timestamptz""#),
        ("DeletedAt", r#"json:"deleted_at" soft_delete:"true" sql_type:"timestamptz""#),
    ];
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("simple_rest=info,example_server=info")),
        )
        .init();

    let settings = Settings::from_env()?;

    let mut schemas = load_from_dir(&settings.resources_path).await?;
    schemas.push(ResourceSchema::from_record::<RentEvents>()?);

    let (repository, base) = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(url)
                .await?;
            let repository: Arc<dyn Repository> = Arc::new(PgRepository::new(pool.clone()));
            (repository, common_routes_with_ready(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let repository: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
            (repository, common_routes())
        }
    };

    let services: Vec<Arc<CrudService>> = schemas
        .into_iter()
        .map(|schema| {
            tracing::info!(route = %format!("/{}", schema.route_name()), table = %schema.table(), "mounting resource");
            Arc::new(CrudService::new(Arc::new(schema), Arc::new(RuleValidator), repository.clone()))
        })
        .collect();

    let app = base.merge(resource_routes(&services));
    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
