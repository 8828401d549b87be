use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::OpenApi;

use super::{
    dto::{ErrorBody, IngestRequest, IngestResponse, ReadingDto},
    errors::AppError,
    page, AppState,
};

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Store one reading pushed by a device.
#[utoipa::path(
    post,
    path = "/api/data",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Reading stored", body = IngestResponse),
        (status = 400, description = "Malformed JSON or missing/invalid fields", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
    ),
    tag = "readings"
)]
pub async fn post_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, AppError> {
    // Parsed by hand so a bad body still gets a JSON `{error}` response.
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))?;

    let id = state.ingest.ingest(&payload).await?;

    Ok(Json(IngestResponse {
        message: "Reading stored".to_owned(),
        id,
    }))
}

/// The most recent readings, newest first.
#[utoipa::path(
    get,
    path = "/api/datos",
    params(
        ("limit" = Option<u32>, Query, description = "Number of readings (defaults to the deployment's limit)"),
    ),
    responses(
        (status = 200, description = "Recent readings", body = Vec<ReadingDto>),
        (status = 400, description = "Malformed query string", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
    ),
    tag = "readings"
)]
pub async fn get_datos(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let Query(params) = params?;
    Ok(Json(recent(&state, params.limit).await?))
}

/// HTML table of the most recent readings.
#[utoipa::path(
    get,
    path = "/datos",
    params(
        ("limit" = Option<u32>, Query, description = "Number of readings (defaults to the deployment's limit)"),
    ),
    responses(
        (status = 200, description = "HTML table", body = String, content_type = "text/html"),
        (status = 400, description = "Malformed query string", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
    ),
    tag = "readings"
)]
pub async fn get_datos_page(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> Result<Html<String>, AppError> {
    let Query(params) = params?;
    let readings = recent(&state, params.limit).await?;
    Ok(Html(page::render_table(&readings)))
}

async fn recent(state: &AppState, limit: Option<u32>) -> Result<Vec<ReadingDto>, AppError> {
    let limit = limit
        .unwrap_or(state.query_limit)
        .clamp(1, state.query_limit_max);
    let views = state.query.recent_readings(limit).await?;
    Ok(views.into_iter().map(Into::into).collect())
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

/// Returns `200 OK` with a plain-text banner while the server is running.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is up", body = String),
    ),
    tag = "system"
)]
pub async fn index() -> &'static str {
    "Environmental telemetry API running"
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(post_data, get_datos, get_datos_page, index),
    components(schemas(ReadingDto, IngestRequest, IngestResponse, ErrorBody)),
    tags(
        (name = "readings", description = "Sensor reading endpoints"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Environmental Telemetry API",
        version = "0.1.0",
        description = "Ingests, simulates and serves environmental sensor readings"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
