use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::services::check_in::{decode_payload, ScanSubject};
use crate::services::{PassValidation, ScanOutcome};
use crate::utils::geo::Coordinates;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePassRequest {
    pub qr_data: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

fn location(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinates> {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
        _ => None,
    }
}

/// Feed a scanned code to one scanner; it checks the rider in or out
pub async fn scan(
    State(state): State<AppState>,
    Path(scanner_id): Path<String>,
    Json(payload): Json<ScanRequest>,
) -> AppResult<Json<ScanOutcome>> {
    let scanner = state.scanners.scanner(&scanner_id).await?;
    let outcome = scanner
        .scan(&payload.payload, location(payload.latitude, payload.longitude))
        .await?;
    Ok(Json(outcome))
}

/// Validate a pass QR directly, without going through a scanner
pub async fn validate_pass(
    State(state): State<AppState>,
    Json(payload): Json<ValidatePassRequest>,
) -> AppResult<Json<PassValidation>> {
    let token = match decode_payload(&payload.qr_data, chrono::Utc::now())? {
        ScanSubject::Pass(token) => token,
        ScanSubject::Rider(_) => {
            return Err(AppError::InvalidQr("Invalid pass QR code".to_string()));
        }
    };

    let validation = state
        .passes
        .validate(&token, location(payload.latitude, payload.longitude))
        .await?;
    Ok(Json(validation))
}
