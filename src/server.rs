//! HTTP front door.
//!
//! Two routes:
//!
//! * `GET /` — liveness, `{"message":"API entry"}`.
//! * `GET /convert?url=…&conversion_type=pdf|pptx|images_zip&quality=hd|sd`
//!   — runs one conversion. `quality` defaults to `hd`.
//!
//! Failures are rendered as `{success:false, error:true, detail}` with the
//! status code taken from the error's [`StatusClass`](crate::StatusClass).

use crate::convert::Converter;
use crate::error::PipelineError;
use crate::output::{ConversionResponse, ConversionType, ErrorResponse, QualityTier};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Raw `/convert` query; every field optional so missing values get our own error body.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertParams {
    pub url: Option<String>,
    pub conversion_type: Option<String>,
    pub quality: Option<String>,
}

/// A `/convert` query that passed parameter validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertRequest {
    pub url: String,
    pub conversion_type: ConversionType,
    pub quality: QualityTier,
}

impl ConvertParams {
    pub fn into_request(self) -> Result<ConvertRequest, PipelineError> {
        let url = self.url.unwrap_or_default();
        if url.trim().is_empty() {
            return Err(PipelineError::EmptyUrl);
        }
        let conversion_type = match self.conversion_type.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(PipelineError::InvalidParameter(
                    "Invalid query parameters: conversion_type is required".to_string(),
                ))
            }
            Some(raw) => raw.parse()?,
        };
        let quality = match self.quality.as_deref().map(str::trim) {
            None | Some("") => QualityTier::default(),
            Some(raw) => raw.parse()?,
        };
        Ok(ConvertRequest {
            url,
            conversion_type,
            quality,
        })
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Conversion failed ({}): {:?}", status, self);
        } else {
            warn!("Conversion rejected ({}): {}", status, self);
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

/// Build the router around a shared [`Converter`].
pub fn create_router(converter: Converter) -> Router {
    Router::new()
        .route("/", get(api_entry))
        .route("/convert", get(convert_handler))
        .with_state(converter)
        .layer(TraceLayer::new_for_http())
}

async fn api_entry() -> Json<serde_json::Value> {
    Json(json!({ "message": "API entry" }))
}

async fn convert_handler(
    State(converter): State<Converter>,
    params: Result<Query<ConvertParams>, QueryRejection>,
) -> Result<Json<ConversionResponse>, PipelineError> {
    let Query(params) = params.map_err(|e| {
        PipelineError::InvalidParameter(format!("Invalid query parameters: {e}"))
    })?;
    let request = params.into_request()?;
    let response = converter
        .convert(&request.url, request.conversion_type, request.quality)
        .await?;
    Ok(Json(response))
}

/// Listen on `addr` until `shutdown` resolves.
pub async fn serve<F>(converter: Converter, addr: SocketAddr, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(converter);
    let listener = TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}
