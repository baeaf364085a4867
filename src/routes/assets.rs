use std::path::Path;

use axum::handler::HandlerWithoutStateExt;
use axum::http::{header, HeaderValue};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::error::AppError;
use crate::state::AppState;

/// GET /assets/{*path} — uploaded pictures from the storage directory
pub fn router(uploads_dir: &Path) -> Router<AppState> {
    let files = ServeDir::new(uploads_dir)
        .append_index_html_on_directories(false)
        .not_found_service(asset_not_found.into_service());

    Router::new().nest_service(
        "/assets",
        ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=86400"),
            ))
            .service(files),
    )
}

async fn asset_not_found() -> AppError {
    AppError::NotFound("Asset not found".into())
}
