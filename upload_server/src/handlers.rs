//! HTTP endpoints and router assembly.
//!
//! The upload handler is a thin transport adapter: it spools multipart
//! parts to the temp directory, hands the descriptors to the blocking
//! upload pipeline and translates the outcome back to JSON.

use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use upload_core::{
    Extension, Required, Size, UploadCoordinator, UploadError, UploadInfo, UploadOptions,
    UploadResult, UploadedFile, UploadedFiles, Validator,
};

use crate::config::UploadConfig;
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Extra room for multipart boundaries and non-file fields on top of the
/// configured file size ceiling.
const BODY_LIMIT_HEADROOM: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes() as usize + BODY_LIMIT_HEADROOM;

    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload_files))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
        "uploads_enabled": state.config.upload.enabled,
    }))
}

pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    if !state.config.upload.enabled {
        return Err(ApiError::UploadsDisabled);
    }

    let mut spooled: Vec<PathBuf> = Vec::new();
    let input = match spool_multipart(&mut multipart, &state.config.upload, &mut spooled).await {
        Ok(input) => input,
        Err(err) => {
            remove_spooled(&spooled).await;
            return Err(err);
        }
    };

    let field = state.config.upload.field.clone();
    let storage = state.storage.clone();
    let validator = build_validator(&state.config.upload);

    let outcome = tokio::task::spawn_blocking(move || {
        let options = UploadOptions {
            validator: Some(validator),
            factory: None,
        };
        let mut coordinator = UploadCoordinator::with_options(field, storage, &input, options)?;
        let processed = coordinator.process()?;
        Ok::<_, UploadError>((processed, coordinator))
    })
    .await;

    remove_spooled(&spooled).await;

    let (processed, coordinator) = outcome.map_err(|err| {
        tracing::error!("Upload task failed to complete: {}", err);
        ApiError::Internal
    })??;

    if !processed {
        tracing::debug!("Upload rejected by validation: {:?}", coordinator.errors());
        let status = StatusCode::UNPROCESSABLE_ENTITY;
        let body = Json(json!({
            "errors": coordinator.errors(),
            "status": status.as_u16(),
        }));
        return Ok((status, body).into_response());
    }

    let results = coordinator.info().results();
    tracing::info!(
        "Upload of field {} stored {} file(s)",
        state.config.upload.field,
        results.len()
    );

    let uploaded = match coordinator.info() {
        UploadInfo::Single(result) => serde_json::to_value(result),
        UploadInfo::Multiple(results) => serde_json::to_value(results),
        UploadInfo::NotProcessed => serde_json::to_value(Vec::<UploadResult>::new()),
    }
    .map_err(|err| {
        tracing::error!("Failed to serialize upload results: {}", err);
        ApiError::Internal
    })?;

    let body = Json(json!({
        "uploaded": uploaded,
        "count": results.len(),
        "uploaded_at": chrono::Utc::now().to_rfc3339(),
    }));

    Ok((StatusCode::CREATED, body).into_response())
}

/// Reads every multipart part, writing file parts to uniquely named spool
/// files in the temp directory. Paths are pushed to `spooled` as they are
/// written so the caller can clean up on any exit path.
async fn spool_multipart(
    multipart: &mut Multipart,
    config: &UploadConfig,
    spooled: &mut Vec<PathBuf>,
) -> Result<UploadedFiles> {
    let mut input = UploadedFiles::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        if name.is_empty() {
            continue;
        }

        let client_name = match field.file_name() {
            Some(file_name) => file_name.to_string(),
            // Plain form value, not a file part.
            None => continue,
        };

        if client_name.is_empty() {
            input.push(name, UploadedFile::missing());
            continue;
        }

        let data = field.bytes().await.map_err(|e| {
            ApiError::BadRequest(format!("Failed to read file data: {}", e))
        })?;

        let spool_path = config
            .temp_directory
            .join(format!("upload-{}", Uuid::new_v4()));
        tokio::fs::write(&spool_path, &data).await?;
        spooled.push(spool_path.clone());

        tracing::debug!(
            "Spooled {} bytes for field {} to {}",
            data.len(),
            name,
            spool_path.display()
        );

        input.push(name, UploadedFile::received(spool_path, client_name));
    }

    Ok(input)
}

fn build_validator(config: &UploadConfig) -> Validator {
    let mut validator = Validator::new();

    if config.required {
        validator.add_rule(Box::new(Required));
    }
    if !config.allowed_extensions.is_empty() {
        validator.add_rule(Box::new(Extension::allow(config.allowed_extensions.clone())));
    }
    validator.add_rule(Box::new(Size::from_human(&config.max_file_size)));

    validator
}

async fn remove_spooled(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = tokio::fs::remove_file(path).await {
            tracing::warn!(
                "Failed to remove spooled file {}: {}",
                path.display(),
                err
            );
        }
    }
}
