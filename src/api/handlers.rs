use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics::gather_metrics;
use crate::ml::{CrimeTypeInfo, HealthStatus, LocationInfo, ModelInfo};
use crate::models::{CrimeReport, SeverityAssessment};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthStatus>> {
    Ok(Json(state.service.health(state.uptime_seconds())))
}

/// Loaded model, features and supported values
pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfo>> {
    Ok(Json(state.service.model_info()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrimeTypesResponse {
    pub crime_types: Vec<CrimeTypeInfo>,
}

pub async fn crime_types(State(state): State<AppState>) -> Result<Json<CrimeTypesResponse>> {
    Ok(Json(CrimeTypesResponse {
        crime_types: state.service.crime_types(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationsResponse {
    pub locations: Vec<LocationInfo>,
}

pub async fn locations(State(state): State<AppState>) -> Result<Json<LocationsResponse>> {
    Ok(Json(LocationsResponse {
        locations: state.service.locations(),
    }))
}

/// Assess the severity of a crime report.
///
/// Scoring is CPU-bound, so it runs on the blocking pool. Body rejections
/// are answered with the same JSON error envelope as validation failures.
pub async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CrimeReport>, JsonRejection>,
) -> Result<Json<SeverityAssessment>> {
    let Json(report) = payload?;
    let service = state.service.clone();
    let assessment = tokio::task::spawn_blocking(move || service.predict(&report))
        .await
        .map_err(|e| AppError::Internal(format!("Prediction task failed: {}", e)))??;

    Ok(Json(assessment))
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}
