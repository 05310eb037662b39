//! Maps `VertexError` onto an HTTP response (spec.md §7): only validation errors are meant to
//! reach this surface as a client-visible failure; anything else indicates a bug in how a
//! handler constructed its error; the response exposes the error's `kind` and `message` either
//! way, e.g. `{"kind":"Validation","message":"..."}`.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use vertex_core::{ErrorKind, VertexError};

pub struct ApiError(pub VertexError);

#[derive(Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Cancelled => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody { kind: format!("{:?}", self.0.kind), message: self.0.message };
        (status, Json(body)).into_response()
    }
}

impl From<VertexError> for ApiError {
    fn from(err: VertexError) -> Self {
        Self(err)
    }
}

impl From<vertex_persistence::StoreError> for ApiError {
    fn from(err: vertex_persistence::StoreError) -> Self {
        Self(VertexError::from(err))
    }
}
