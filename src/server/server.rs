use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::classifier::OptionSets;
use crate::sheets::{CreativePatch, LedgerError};
use crate::upload::{CreativeFile, FileOutcome, UploadLimits};
use tower_http::services::ServeDir;

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{log_requests, metrics, state::*};

const UPLOAD_PATH: &str = "/api/upload-creatives";
const UPDATE_PATH: &str = "/api/update-creative";
const FILES_FIELD: &str = "files";

/// Room for multipart boundaries and part headers on top of the file bytes.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: &'static str,
    pub schema_revision: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: String,
}

#[derive(Serialize)]
struct OkResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    results: Vec<FileOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UpdateCreativeBody {
    #[serde(default)]
    pub row_index: Option<u32>,
    #[serde(default, alias = "creativeId")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub patch: CreativePatch,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            status: "error",
            error: message.into(),
        }),
    )
        .into_response()
}

/// Refuses the request when required settings are missing.
fn check_configuration(state: &ServerState, endpoint: &str) -> Option<Response> {
    let message = state.configuration_error()?;
    error!("{}", message);
    metrics::record_error("configuration", endpoint);
    Some(error_response(StatusCode::INTERNAL_SERVER_ERROR, message))
}

fn upload_body_limit(limits: UploadLimits) -> usize {
    let bytes = limits
        .max_file_size
        .saturating_mul(limits.max_files as u64)
        .saturating_add(MULTIPART_OVERHEAD);
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION"),
        schema_revision: state.schema_revision.to_string(),
    };
    Json(stats)
}

async fn get_options() -> impl IntoResponse {
    Json(OptionSets::all())
}

/// Buffers every `files` part; other parts are skipped.
///
/// A body that fails before yielding its first part carries no files and is
/// reported as an empty batch.
async fn read_files(mut multipart: Multipart) -> Result<Vec<CreativeFile>, MultipartError> {
    let mut files = Vec::new();
    let mut any_part = false;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) if !any_part => {
                debug!("Multipart body has no parts: {}", err);
                break;
            }
            Err(err) => return Err(err),
        };
        any_part = true;
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        files.push(CreativeFile::from_part(
            name.as_deref(),
            content_type.as_deref(),
            data.to_vec(),
        ));
    }
    Ok(files)
}

async fn upload_creatives(
    State(state): State<ServerState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    if let Some(response) = check_configuration(&state, UPLOAD_PATH) {
        return response;
    }

    let files = match multipart {
        Ok(multipart) => match read_files(multipart).await {
            Ok(files) => files,
            Err(err) => {
                warn!("Failed to read multipart body: {}", err);
                return error_response(StatusCode::BAD_REQUEST, "Failed to parse form data");
            }
        },
        Err(rejection) => {
            warn!("Rejected upload body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, "Failed to parse form data");
        }
    };

    match state.uploads.process(files).await {
        Ok(report) => Json(UploadResponse {
            status: "ok",
            results: report.results,
            warnings: report.warnings,
        })
        .into_response(),
        Err(err) if err.is_rejection() => {
            warn!("Upload rejected: {}", err);
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err) => {
            error!("Upload failed: {}", err);
            metrics::record_error("upload", UPLOAD_PATH);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn update_creative(State(state): State<ServerState>, body: Bytes) -> Response {
    if let Some(response) = check_configuration(&state, UPDATE_PATH) {
        return response;
    }

    let body: UpdateCreativeBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => {
            warn!("Invalid update body: {}", err);
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid request: {}", err));
        }
    };
    let (row_index, id) = match (body.row_index, body.id) {
        (Some(row_index), Some(id)) if row_index > 0 && id > 0 => (row_index, id),
        _ => {
            return error_response(StatusCode::BAD_REQUEST, "rowIndex and id are required");
        }
    };

    match state.updater.update_creative(row_index, id, &body.patch).await {
        Ok(()) => Json(OkResponse { status: "ok" }).into_response(),
        Err(err @ LedgerError::InvalidRow(_)) => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err) => {
            error!("Update of row {} failed: {}", row_index, err);
            metrics::record_error("update", UPDATE_PATH);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router = Router::new()
        .route("/options", get(get_options))
        .route(
            "/upload-creatives",
            post(upload_creatives).layer(DefaultBodyLimit::max(upload_body_limit(
                state.uploads.limits(),
            ))),
        )
        .route("/update-creative", post(update_creative))
        .with_state(state.clone());

    let home_router: Router = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    home_router
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    metrics::init_metrics();

    let app = make_app(state);
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    tokio::try_join!(
        async { axum::serve(listener, app).await.context("Server failed") },
        async {
            axum::serve(metrics_listener, make_metrics_app())
                .await
                .context("Metrics server failed")
        },
    )?;
    Ok(())
}
