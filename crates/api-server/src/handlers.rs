//! HTTP request handlers for API endpoints

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use receipt_common::AnalysisResult;
use receipt_fusion::FusionError;
use tracing::{info, warn};

use crate::{
    types::{ErrorResponse, HealthResponse},
    ApiState,
};

/// Multipart part carrying the image
const FILE_FIELD: &str = "file";

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(detail: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(detail)))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Analyze one uploaded receipt image
///
/// The upload's file name (trimmed) is the lookup key for ground truth.
pub async fn analyze_receipt(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let identifier = field.file_name().unwrap_or_default().trim().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read upload: {e}")))?;
        upload = Some((identifier, bytes));
        break;
    }

    let Some((identifier, bytes)) = upload else {
        return Err(bad_request("Missing multipart field 'file'"));
    };
    info!("Analyze request for {:?} ({} bytes)", identifier, bytes.len());

    match state.pipeline.analyze(&identifier, &bytes).await {
        Ok(result) => Ok(Json(result)),
        Err(e @ FusionError::NotFound { .. }) => {
            warn!("{}", e);
            Err((StatusCode::NOT_FOUND, Json(ErrorResponse::new(e.to_string()))))
        }
    }
}
