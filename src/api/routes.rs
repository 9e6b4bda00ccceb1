use axum::{extract::DefaultBodyLimit, routing::{delete, get, post}, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::api::{handlers, AppState};
use crate::store::MAX_IMAGE_BYTES;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-catalog"})) }))
        .route("/api/v1/stores/:store_id/attributes", get(handlers::list_attributes))
        .route("/api/v1/sessions", post(handlers::open_session))
        .route("/api/v1/sessions/:id", get(handlers::get_session).delete(handlers::close_session))
        .route("/api/v1/sessions/:id/commands", post(handlers::apply_command))
        .route("/api/v1/sessions/:id/refresh", post(handlers::refresh_session))
        .route("/api/v1/sessions/:id/save", post(handlers::save_session))
        .route("/api/v1/sessions/:id/variations/:variation_id", delete(handlers::delete_variation))
        .route(
            "/api/v1/sessions/:id/variations/:variation_id/image",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 1024)),
        )
        .route("/api/v1/products/:id/variations", get(handlers::product_variations))
        .route("/api/v1/images/:id", get(handlers::get_image))
        .route("/api/v1/orders", post(handlers::place_order))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}
