use crate::catalog::{CatalogError, CatalogService};
use crate::config::ApiConfig;
use crate::flash::{self, Notice};
use crate::image_folder::UploadedFile;
use crate::item_store::ItemStore;
use crate::qr_decode::{QrDecoder, QrOutcome};
use crate::views;
use anyhow::{Context, Result};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, FromRef, Multipart, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

const MISSING_IDENTIFIER_NOTICE: &str = "Please provide or scan a Saree ID first.";
const NO_FILE_PART: &str = "No file part 'qr_image'";
const NO_SELECTED_FILE: &str = "No selected file";
const NO_QR_FOUND: &str = "No QR code found";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub items: Arc<ItemStore>,
    pub qr_decoder: QrDecoder,
    pub upload_root: PathBuf,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Body of every `/decode-qr` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrDecodeResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QrDecodeResponse {
    pub fn decoded(payload: String) -> Self {
        Self {
            ok: true,
            results: Some(vec![payload]),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            results: None,
            error: Some(message.into()),
        }
    }
}

/// Query parameters for the listing
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub q: String,
}

/// Unexpected failure while rendering a page
#[derive(Debug)]
pub struct PageError(CatalogError);

impl From<CatalogError> for PageError {
    fn from(e: CatalogError) -> Self {
        Self(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(views::error_page(
                "The catalog could not complete this request. Please try again.",
            )),
        )
            .into_response()
    }
}

/// Create the HTTP router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    // Any stored file is downloadable by path; there is no ownership check
    let uploads = ServeDir::new(&state.upload_root);

    Router::new()
        .route("/", get(index))
        .route("/add", get(add_form).post(add_item))
        .route("/decode-qr", post(decode_qr))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "saree-catalog"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.items.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Catalog listing, optionally filtered by `q`
#[instrument(skip(state, headers, jar))]
async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: SignedCookieJar,
    Query(params): Query<CatalogQuery>,
) -> Result<(SignedCookieJar, Html<String>), PageError> {
    let query = params.q.trim();
    let entries = state.catalog.list_catalog(Some(query)).await?;

    let (jar, notice) = flash::take(jar, &headers);
    Ok((jar, Html(views::index_page(&entries, query, notice.as_ref()))))
}

/// Add form
async fn add_form(headers: HeaderMap, jar: SignedCookieJar) -> (SignedCookieJar, Html<String>) {
    let (jar, notice) = flash::take(jar, &headers);
    (jar, Html(views::add_page(notice.as_ref())))
}

/// Register a saree and store its images
#[instrument(skip_all)]
async fn add_item(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(SignedCookieJar, Redirect), PageError> {
    let (identifier, files) = match multipart {
        Ok(multipart) => match read_add_form(multipart).await {
            Ok(form) => form,
            Err(e) => {
                warn!(error = %e, "Unreadable add form");
                let notice = Notice::warning(format!("The upload could not be read: {}", e.body_text()));
                return Ok((flash::push(jar, &notice), Redirect::to("/add")));
            }
        },
        Err(rejection) => {
            warn!(error = %rejection, "Add form was not multipart");
            (String::new(), Vec::new())
        }
    };

    match state.catalog.add_item(&identifier, &files).await {
        Ok(outcome) => {
            let notice = Notice::success(format!(
                "Saree '{}' added successfully.",
                outcome.identifier
            ));
            Ok((flash::push(jar, &notice), Redirect::to("/")))
        }
        Err(CatalogError::MissingIdentifier) => {
            let notice = Notice::warning(MISSING_IDENTIFIER_NOTICE);
            Ok((flash::push(jar, &notice), Redirect::to("/add")))
        }
        Err(CatalogError::InvalidIdentifier(reason)) => {
            let notice = Notice::warning(format!("Saree ID {}.", reason));
            Ok((flash::push(jar, &notice), Redirect::to("/add")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Collect `saree_id` and the `images` parts
async fn read_add_form(
    mut multipart: Multipart,
) -> std::result::Result<(String, Vec<UploadedFile>), MultipartError> {
    let mut identifier = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("saree_id") => identifier = field.text().await?,
            Some("images") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                files.push(UploadedFile::new(file_name, data));
            }
            _ => {}
        }
    }

    Ok((identifier, files))
}

/// Decode the QR code in the `qr_image` upload
#[instrument(skip_all)]
async fn decode_qr(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<QrDecodeResponse>) {
    let Ok(mut multipart) = multipart else {
        return (StatusCode::BAD_REQUEST, Json(QrDecodeResponse::failed(NO_FILE_PART)));
    };

    let upload = match read_qr_image(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            return (StatusCode::BAD_REQUEST, Json(QrDecodeResponse::failed(NO_FILE_PART)));
        }
        Err(e) => {
            warn!(error = %e, "Unreadable QR upload");
            return (e.status(), Json(QrDecodeResponse::failed(e.body_text())));
        }
    };

    if upload.file_name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(QrDecodeResponse::failed(NO_SELECTED_FILE)),
        );
    }

    match state.qr_decoder.decode(upload.data).await {
        Ok(QrOutcome::Payload(payload)) => {
            info!(payload_len = payload.len(), "QR code decoded");
            metrics::counter!("catalog.qr.decoded").increment(1);
            (StatusCode::OK, Json(QrDecodeResponse::decoded(payload)))
        }
        Ok(QrOutcome::Absent) => {
            metrics::counter!("catalog.qr.absent").increment(1);
            (StatusCode::OK, Json(QrDecodeResponse::failed(NO_QR_FOUND)))
        }
        Err(e) => {
            error!(error = %e, file_name = %upload.file_name, "QR decode failed");
            metrics::counter!("catalog.qr.failed").increment(1);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(QrDecodeResponse::failed(e.to_string())),
            )
        }
    }
}

/// First `qr_image` file part; parts without a file name are not files
async fn read_qr_image(
    multipart: &mut Multipart,
) -> std::result::Result<Option<UploadedFile>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("qr_image") {
            continue;
        }

        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let data = field.bytes().await?;
        return Ok(Some(UploadedFile::new(file_name, data)));
    }

    Ok(None)
}

/// Serve the router until `shutdown` resolves
pub async fn start_api_server<F>(state: AppState, config: &ApiConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting catalog HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    Ok(())
}
