pub mod dto;
pub mod errors;
pub mod handlers;
pub mod page;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    db::ReadingStore,
    ingest::IngestionGateway,
    query::QueryService,
    readings::{Schema, SensorLimits},
    timezone::ZonePolicy,
};
use handlers::ApiDoc;

/// Shared by every request. Holds nothing mutable beyond the store handle.
#[derive(Clone)]
pub struct AppState {
    pub ingest: IngestionGateway,
    pub query: QueryService,
    pub query_limit: u32,
    pub query_limit_max: u32,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        schema: Schema,
        limits: SensorLimits,
        zone: ZonePolicy,
        query_limit: u32,
        query_limit_max: u32,
    ) -> Self {
        Self {
            ingest: IngestionGateway::new(store.clone(), schema, limits, zone),
            query: QueryService::new(store, zone),
            query_limit,
            query_limit_max,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/data", post(handlers::post_data))
        .route("/api/datos", get(handlers::get_datos))
        .route("/datos", get(handlers::get_datos_page))
        .with_state(state)
        .split_for_parts();

    router
        .route("/", get(handlers::index))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        // Browser dashboards on other origins read /api/datos directly.
        .layer(CorsLayer::permissive())
}
