//! REST API Server for receipt analysis
//!
//! `POST /analyze` takes a multipart upload and runs the fusion pipeline on it.
//! `GET /health` reports liveness and the crate version.

mod config;
mod handlers;
mod types;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use receipt_cloud_extraction::CloudExtractionConfig;
use receipt_fusion::{FusionConfig, FusionPipeline, SourceSettings};
use receipt_object_detection::ObjectDetectionConfig;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use config::{ConfigError, ServerConfig};
pub use handlers::*;
pub use types::*;

/// Largest accepted upload
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Read-only pipeline shared by every request
    pub pipeline: Arc<FusionPipeline>,
}

impl ApiState {
    #[must_use]
    pub fn new(pipeline: FusionPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Load every source named in the configuration
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(FusionPipeline::load(&source_settings(config)))
    }
}

/// Translate server configuration into pipeline source settings
#[must_use]
pub fn source_settings(config: &ServerConfig) -> SourceSettings {
    let mut detector = ObjectDetectionConfig::default();
    if !config.class_names.is_empty() {
        detector = detector.with_class_names(config.class_names.iter().cloned());
    }

    let cloud = match (&config.azure_endpoint, &config.azure_key) {
        (Some(endpoint), Some(key)) => Some(CloudExtractionConfig::new(endpoint, key)),
        _ => None,
    };

    SourceSettings {
        annotations_path: Some(config.annotations_path.clone()),
        model_path: Some(config.model_path.clone()),
        detector,
        cloud,
        fusion: FusionConfig {
            cloud_timeout: Some(config.cloud_timeout),
        },
    }
}

/// CORS for the listed browser origins, with credentials
///
/// Methods and headers mirror the preflight request, since wildcards are not
/// allowed together with credentials.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/analyze", post(analyze_receipt))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Start the API server
pub async fn start_server(
    addr: &str,
    state: ApiState,
    cors_origins: &[String],
) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state, cors_origins);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
