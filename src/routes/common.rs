//! Service routes that sit beside the resources: liveness, database readiness, build info.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Serialize)]
struct Status {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'static str>,
}

impl Status {
    const fn up() -> Self {
        Status {
            status: "ok",
            database: None,
        }
    }
}

#[derive(Serialize)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
}

async fn health() -> Json<Status> {
    Json(Status::up())
}

async fn ready(State(pool): State<PgPool>) -> (StatusCode, Json<Status>) {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(Status {
                database: Some("ok"),
                ..Status::up()
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Status {
                    status: "degraded",
                    database: Some("unavailable"),
                }),
            )
        }
    }
}

async fn version() -> Json<BuildInfo> {
    Json(BuildInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /health` and `GET /version`. Needs no store.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}

/// [`common_routes`] plus `GET /ready`, answering 503 while the database is unreachable.
pub fn common_routes_with_ready(pool: PgPool) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .with_state(pool)
        .merge(common_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_body_omits_database() {
        assert_eq!(serde_json::to_string(&Status::up()).unwrap(), r#"{"status":"ok"}"#);
    }
}
