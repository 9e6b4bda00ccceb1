//! HTTP surface.

pub mod handlers;
pub mod routes;

pub use routes::create_router;

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use std::sync::Arc;
use crate::service::{SessionRegistry, VariationService};
use crate::CatalogError;

#[derive(Clone)]
pub struct AppState {
    pub service: VariationService,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(service: VariationService) -> Self { Self { service, sessions: Arc::new(SessionRegistry::new()) } }
}

impl CatalogError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidCombination(_) | Self::EmptyCart => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicateValue(_) | Self::DuplicateCombination(_) => StatusCode::CONFLICT,
            Self::GroupNotFound(_) | Self::ValueNotFound(_) | Self::VariationNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Stale => StatusCode::GONE,
            Self::Upload(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() { tracing::error!("{}", self); }
        (status, Json(serde_json::json!({ "error": self.to_string(), "validation": self.is_validation() }))).into_response()
    }
}
