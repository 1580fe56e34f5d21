//! Resource handlers: translate path, query and body into pipeline calls and outcomes into responses.

use crate::error::AppError;
use crate::response::{key_body, success_many, success_one};
use crate::service::{UpdateMode, ValidationErrors};
use crate::state::{BelongsToState, ResourceState};
use crate::value::{Filter, Row, Value};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

fn body_to_row(body: &[u8]) -> Result<Row, AppError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?;
    let serde_json::Value::Object(map) = value else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    let mut row = Row::new();
    let mut errors = ValidationErrors::new();
    for (k, v) in map {
        match Value::from_json(&v) {
            Ok(value) => {
                row.insert(k, value);
            }
            Err(_) => errors.insert(k, "must be a scalar value"),
        }
    }
    errors.into_result()?;
    Ok(row)
}

/// Repeated keys OR together: `?first_name=Joe&first_name=Ann`.
fn query_to_filter(params: Vec<(String, String)>) -> Filter {
    let mut filter = Filter::new();
    for (k, v) in params {
        filter.entry(k).or_default().push(Value::Text(v));
    }
    filter
}

pub async fn create(State(service): State<ResourceState>, body: Bytes) -> Result<Json<Row>, AppError> {
    let row = body_to_row(&body)?;
    let key = service.create(row).await?;
    Ok(Json(key_body(service.schema().primary_key(), key)))
}

pub async fn retrieve(
    State(service): State<ResourceState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Row>), AppError> {
    Ok(success_one(service.retrieve(&id).await?))
}

/// PUT: absent fields are cleared.
pub async fn replace(State(service): State<ResourceState>, body: Bytes) -> Result<StatusCode, AppError> {
    service.update(body_to_row(&body)?, UpdateMode::Replace).await?;
    Ok(StatusCode::OK)
}

/// PATCH: absent fields are left alone.
pub async fn patch(State(service): State<ResourceState>, body: Bytes) -> Result<StatusCode, AppError> {
    service.update(body_to_row(&body)?, UpdateMode::Partial).await?;
    Ok(StatusCode::OK)
}

pub async fn delete(State(service): State<ResourceState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    service.delete(&id).await?;
    Ok(StatusCode::OK)
}

/// 204 when nothing matches.
pub async fn search(
    State(service): State<ResourceState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let rows = service.search(query_to_filter(params)).await?;
    if rows.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(success_many(rows).into_response())
}

/// 404 when the related record has none.
pub async fn belongs_to(
    State(state): State<BelongsToState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Vec<Row>>), AppError> {
    let rows = state.service.belongs_to(&state.related_table, &id).await?;
    if rows.is_empty() {
        return Err(AppError::NotFound);
    }
    Ok(success_many(rows))
}

/// Omitted routes.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_must_be_objects_of_scalars() {
        assert!(matches!(body_to_row(b"[1, 2]"), Err(AppError::BadRequest(_))));
        assert!(matches!(body_to_row(b"{nope"), Err(AppError::BadRequest(_))));
        assert!(matches!(body_to_row(br#"{"tags": ["a"]}"#), Err(AppError::Validation(_))));
        let row = body_to_row(br#"{"first_name": "Fulano", "age": 30, "phone": null}"#).unwrap();
        assert_eq!(row["age"], Value::Int(30));
        assert_eq!(row["phone"], Value::Null);
    }

    #[test]
    fn repeated_query_keys_collect_values() {
        let filter = query_to_filter(vec![
            ("first_name".into(), "Joe".into()),
            ("age".into(), "30".into()),
            ("first_name".into(), "Ann".into()),
        ]);
        assert_eq!(filter["first_name"], vec![Value::from("Joe"), Value::from("Ann")]);
        assert_eq!(filter["age"], vec![Value::from("30")]);
    }
}
