//! The PDF resolution endpoint.
//!
//! Resolves a record id to its PDF location for download clients:
//! `GET /functions/v1/get-pdf?id=<record-id>` (an unversioned alias is also
//! routed). Success answers 200 with the URL in BOTH the JSON body and a
//! `Location` response header; clients read the header first and the body
//! second, so both encodings are part of the contract.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::backend::{HttpBackend, RecordStore};
use crate::config::Settings;

/// Shared state for the endpoint.
///
/// The store is `None` when the backend is unconfigured; requests then
/// answer 500 the way the original deployment does on missing environment.
#[derive(Clone)]
pub struct AppState {
    pub store: Option<Arc<dyn RecordStore>>,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let store = HttpBackend::from_settings(settings)
            .map(|backend| Arc::new(backend) as Arc<dyn RecordStore>);
        Self { store }
    }
}

/// Build the router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/functions/v1/get-pdf", get(get_pdf).options(preflight))
        .route("/functions/get-pdf", get(get_pdf).options(preflight))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings);
    if state.store.is_none() {
        tracing::warn!("backend not configured; get-pdf will answer 500");
    }
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct GetPdfParams {
    id: Option<String>,
}

async fn get_pdf(
    State(state): State<AppState>,
    Query(params): Query<GetPdfParams>,
    headers: axum::http::HeaderMap,
) -> Response {
    let Some(id) = params.id.filter(|id| !id.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing ID parameter");
    };

    if !headers.contains_key(header::AUTHORIZATION) {
        return error_response(StatusCode::UNAUTHORIZED, "Missing authorization header");
    }

    let Some(store) = &state.store else {
        tracing::error!("PDF resolution requested without a configured backend");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error");
    };

    let norma = match store.get(&id).await {
        Ok(norma) => norma,
        Err(err) => {
            tracing::error!(%err, id, "record store query failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database query failed");
        }
    };

    let Some(pdf_url) = norma
        .map(|norma| norma.pdf_url)
        .filter(|url| !url.is_empty())
    else {
        return error_response(StatusCode::NOT_FOUND, "PDF not found");
    };

    let mut response = (StatusCode::OK, Json(json!({ "url": pdf_url }))).into_response();
    if let Ok(value) = HeaderValue::from_str(&pdf_url) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    with_cors(response)
}

/// Preflights answer 204 with the CORS headers only.
async fn preflight() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    with_cors((status, Json(json!({ "error": message }))).into_response())
}

/// Every response carries the same permissive CORS header set, exposing
/// `Location` so download clients can read it.
fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, Accept"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Location"),
    );
    response
}
