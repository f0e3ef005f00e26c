use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod error;
mod state;
mod types;

pub use state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::search_handler,
        api::update_search_handler,
        api::get_image_handler,
        api::upload_image_handler,
    ),
    components(schemas(
        types::SearchCreate,
        types::SearchUpdate,
        types::UploadForm,
        types::ImageResponse,
        crate::db::SearchRecord,
    ))
)]
struct ApiDoc;

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(api::search_handler))
        .route("/search/{id}", patch(api::update_search_handler))
        .route("/images/{*uri}", get(api::get_image_handler))
        .route("/images", post(api::upload_image_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
