//! Response body helpers.

use crate::value::{Row, Value};
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// `{"error": message}`
pub fn error_body(message: impl Into<String>) -> ErrorBody {
    ErrorBody { error: message.into() }
}

/// `{"<pk>": key}` returned by create.
pub fn key_body(primary_key: &str, key: Value) -> Row {
    let mut body = Row::new();
    body.insert(primary_key.to_string(), key);
    body
}

pub fn success_one(row: Row) -> (StatusCode, Json<Row>) {
    (StatusCode::OK, Json(row))
}

pub fn success_many(rows: Vec<Row>) -> (StatusCode, Json<Vec<Row>>) {
    (StatusCode::OK, Json(rows))
}
